//! Typed - 型付き Job API
//!
//! handler 名の typo を型で排除し、Job 型と handler の対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Job` trait, `JobHandler<J>` trait - 型安全
//! - **内部（Dyn）**: `DynJobHandler` trait - object-safe, type erasure

pub mod codec;
pub mod handler;
pub mod job;
pub mod registry;

pub use self::codec::{CodecError, JobCodec, RECORD_PREFIX};
pub use self::handler::{DynJobHandler, JobHandler, TypedJobHandler};
pub use self::job::Job;
pub use self::registry::{JobRegistry, RegistryError};
