//! Broker - 非同期 job の永続化と実行
//!
//! # 構成
//! - **JobBroker**: enqueue → 発火 → consume_job → 後片付け
//! - **DuplicateEventGuard**: 受信イベントの重複処理を防ぐマーカー
//!
//! # 設計原則
//! - property store が唯一の共有可変状態。排他は compare_and_swap だけで行う
//! - 即時発火と時刻指定発火の違いは `FireAt` に閉じ込める（継承しない）
//! - broker はリトライしない。リトライしたい handler は自分で再 enqueue する

pub mod guard;
pub mod job_broker;

pub use self::guard::{DuplicateEventGuard, EVENT_PREFIX};
pub use self::job_broker::JobBroker;

use thiserror::Error;

use crate::domain::{ErrorKind, HandlerName, JobError, TriggerId};
use crate::ports::{SchedulerError, StoreError};
use crate::typed::CodecError;

/// BrokerError は JobBroker の操作エラー
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// 登録されていない handler 名での consume。設定ミスなのでリトライしない
    #[error("no handler registered for '{0}'")]
    UnknownHandler(HandlerName),

    /// handler が Err を返した。レコードは failed を経て削除済み
    #[error("job {id} ({handler}) failed: {source}")]
    HandlerFailed {
        id: TriggerId,
        handler: HandlerName,
        #[source]
        source: JobError,
    },
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::Store(_) => ErrorKind::Transient,
            BrokerError::Scheduler(SchedulerError::Exhausted { .. }) => ErrorKind::Permanent,
            BrokerError::Scheduler(SchedulerError::Unavailable(_)) => ErrorKind::Transient,
            BrokerError::Codec(_) => ErrorKind::Permanent,
            BrokerError::UnknownHandler(_) => ErrorKind::Configuration,
            BrokerError::HandlerFailed { source, .. } => source.kind(),
        }
    }
}
