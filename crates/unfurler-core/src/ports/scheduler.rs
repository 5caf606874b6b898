//! Scheduler port - 予約実行（trigger）の抽象化
//!
//! trigger が発火すると、プラットフォームは handler 名のエントリポイントから
//! プロセスに再入します。呼び出しスタックは引き継がれません。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{FireAt, HandlerName, TriggerId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// プラットフォームの未発火 trigger 数の上限。内部でリトライしない
    #[error("too many outstanding triggers (limit={limit})")]
    Exhausted { limit: usize },

    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
}

/// 予約済みの trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub handler: HandlerName,
    pub due_at: DateTime<Utc>,
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn create(&self, handler: &HandlerName, fire_at: FireAt)
    -> Result<Trigger, SchedulerError>;

    /// 既に消えている trigger の削除は成功扱い
    async fn delete(&self, id: TriggerId) -> Result<(), SchedulerError>;

    async fn list(&self) -> Result<Vec<Trigger>, SchedulerError>;

    async fn list_for(&self, handler: &HandlerName) -> Result<Vec<Trigger>, SchedulerError> {
        let triggers = self.list().await?;
        Ok(triggers
            .into_iter()
            .filter(|t| &t.handler == handler)
            .collect())
    }
}
