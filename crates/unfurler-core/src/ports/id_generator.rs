//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{ClaimToken, TriggerId};
use crate::ports::Clock;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use ulid::{Generator, Ulid};

/// IdGenerator は trigger ID と claim トークンを生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（Arc<dyn IdGenerator> で共有する）
pub trait IdGenerator: Send + Sync {
    fn generate_trigger_id(&self) -> TriggerId;

    fn generate_claim_token(&self) -> ClaimToken;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// FixedClock を渡すと timestamp 部分が固定されます。
///
/// 同じミリ秒内では単調増加（`ulid::Generator`）なので、
/// 同時刻に作られた trigger も生成順でソートできます。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
    generator: Mutex<Generator>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            generator: Mutex::new(Generator::new()),
        }
    }

    fn next_ulid(&self) -> Ulid {
        let now = self.clock.now();
        let mut generator = self
            .generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // 80-bit のランダム部分が溢れたときだけ単調性を諦める
        generator
            .generate_from_datetime(SystemTime::from(now))
            .unwrap_or_else(|_| Ulid::from_parts(now.timestamp_millis() as u64, rand::random()))
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_trigger_id(&self) -> TriggerId {
        TriggerId::from(self.next_ulid())
    }

    fn generate_claim_token(&self) -> ClaimToken {
        ClaimToken::from(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(Arc::new(SystemClock));

        let id1 = id_gen.generate_trigger_id();
        let id2 = id_gen.generate_trigger_id();
        let id3 = id_gen.generate_trigger_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(Arc::new(FixedClock::new(fixed_time)));

        let id1 = id_gen.generate_trigger_id();
        let id2 = id_gen.generate_trigger_id();

        // 同じミリ秒内でも単調増加
        assert!(id1 < id2);

        // timestamp 部分は同じ
        assert_eq!(id1.as_ulid().timestamp_ms(), id2.as_ulid().timestamp_ms());
        assert_eq!(
            id1.as_ulid().timestamp_ms(),
            fixed_time.timestamp_millis() as u64
        );
    }

    #[test]
    fn claim_tokens_use_their_own_prefix() {
        let id_gen = UlidGenerator::new(Arc::new(SystemClock));
        assert!(id_gen.generate_trigger_id().to_string().starts_with("trg-"));
        assert!(id_gen.generate_claim_token().to_string().starts_with("claim-"));
    }
}
