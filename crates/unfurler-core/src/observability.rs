//! Observability - broker の状態集計
//!
//! ストア上の job レコードを状態ごとに数えたもの。
//! 終端状態は同じ consume_job の中で削除されるので、通常 `done` / `failed` は 0 です。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub waiting: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
    /// scheduler 上の未発火 trigger
    pub triggers: usize,
}

impl JobCounts {
    pub fn outstanding(&self) -> usize {
        self.waiting + self.running
    }
}
