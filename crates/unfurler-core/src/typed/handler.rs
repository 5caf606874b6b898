//! JobHandler trait - Job を実行する handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (JobHandler<J>)
//! - Object-safe trait (DynJobHandler)
//! - Type erasure パターン (TypedJobHandler<J, H> → DynJobHandler)

use super::job::Job;
use crate::domain::JobError;
use async_trait::async_trait;
use std::marker::PhantomData;

/// JobHandler は Job を受け取って副作用を実行する
///
/// # ジェネリクスによる型安全性
/// - `JobHandler<ChatUnfurlJob>` は `ChatUnfurlJob` しか受け取れない
/// - コンパイル時に Job と handler の対応が保証される
#[async_trait]
pub trait JobHandler<J: Job>: Send + Sync {
    async fn handle(&self, job: J) -> Result<(), JobError>;
}

/// DynJobHandler は object-safe な handler の抽象化
///
/// HashMap<String, Arc<dyn DynJobHandler>> に格納するために使います。
#[async_trait]
pub trait DynJobHandler: Send + Sync {
    async fn handle_dyn(&self, parameter: serde_json::Value) -> Result<(), JobError>;
    fn handler_name(&self) -> &str;
}

pub struct TypedJobHandler<J: Job, H: JobHandler<J>> {
    handler: H,
    _marker: PhantomData<J>,
}

impl<J: Job, H: JobHandler<J>> TypedJobHandler<J, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<J: Job, H: JobHandler<J>> DynJobHandler for TypedJobHandler<J, H> {
    async fn handle_dyn(&self, parameter: serde_json::Value) -> Result<(), JobError> {
        let job: J = serde_json::from_value(parameter)
            .map_err(|e| JobError::permanent(format!("json decode: {e}")))?;
        self.handler.handle(job).await
    }

    fn handler_name(&self) -> &str {
        J::HANDLER
    }
}
