//! FireAt - 発火タイミングの戦略
//!
//! 即時発火と時刻指定発火の違いはここだけに閉じ込め、
//! レコード構築や consume の処理は `JobBroker` で共通化します。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// FireAt は scheduler に trigger を作るときの「いつ発火するか」
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum FireAt {
    /// プラットフォームが許す限り早く
    #[default]
    Immediate,
    /// 指定時刻以降
    At(DateTime<Utc>),
}

impl FireAt {
    /// JobRecord に記録する `scheduled_at`（即時なら None）
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        match self {
            FireAt::Immediate => None,
            FireAt::At(at) => Some(*at),
        }
    }

    /// 実際に発火可能になる時刻
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            FireAt::Immediate => now,
            FireAt::At(at) => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn immediate_resolves_to_now_and_has_no_scheduled_at() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(FireAt::Immediate.resolve(now), now);
        assert_eq!(FireAt::Immediate.scheduled_at(), None);
    }

    #[test]
    fn at_keeps_explicit_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let later = now + Duration::minutes(10);
        assert_eq!(FireAt::At(later).resolve(now), later);
        assert_eq!(FireAt::At(later).scheduled_at(), Some(later));
    }
}
