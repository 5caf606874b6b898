//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryPropertyStore**: アトミックな compare_and_swap を持つ property store
//! - **InMemoryScheduler**: 発火をテストから起こせる scheduler
//! - **InMemoryOAuth2Provider / InMemoryKnowledgeBase / RecordingChatClient**: 下流コラボレータの代役
//!
//! 実プラットフォーム・実 HTTP の実装はこのクレートには含めません。

pub mod inmem_knowledge_base;
pub mod inmem_oauth;
pub mod inmem_scheduler;
pub mod inmem_store;
pub mod recording_chat;

pub use self::inmem_knowledge_base::InMemoryKnowledgeBase;
pub use self::inmem_oauth::InMemoryOAuth2Provider;
pub use self::inmem_scheduler::{DEFAULT_MAX_TRIGGERS, InMemoryScheduler};
pub use self::inmem_store::InMemoryPropertyStore;
pub use self::recording_chat::{ChatCall, RecordingChatClient};
