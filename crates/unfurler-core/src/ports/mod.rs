//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（プラットフォームの property store / trigger、
//! chat API、ナレッジベース API、OAuth2）へのインターフェースを提供します。
//!
//! # 設計原則
//! - property store が唯一の共有可変状態（source of truth）
//! - scheduler は「いつ再入するか」だけを知っている（payload は持たない）

pub mod chat;
pub mod clock;
pub mod id_generator;
pub mod knowledge_base;
pub mod oauth;
pub mod property_store;
pub mod scheduler;

pub use self::chat::{ChatClient, Unfurls};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::knowledge_base::{
    Comment, KnowledgeBaseClient, KnowledgeBaseConnector, Member, Post,
};
pub use self::oauth::{OAuth2Provider, OAuth2Service};
pub use self::property_store::{PropertyStore, StoreError};
pub use self::scheduler::{Scheduler, SchedulerError, Trigger};
