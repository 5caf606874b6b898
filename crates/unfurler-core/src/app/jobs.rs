//! Jobs - 発火時に実行される job と handler
//!
//! | job | handler 名 | 内容 |
//! |---|---|---|
//! | `ChatUnfurlJob` | `chat_unfurl` | 複数リンクを 1 件ずつ展開 |
//! | `AsyncLogJob` | `async_logging` | エラー内容をログに出す（リトライなし） |
//! | `ExpireAuthPromptJob` | `expire_auth_prompt` | 放置された認可プロンプトを消す |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::builder::RegistryBuilder;
use super::context::RequestContext;
use super::error::AppError;
use super::events::{do_unfurls, load_pending, pending_auth_key};
use crate::domain::{HandlerName, JobError, TriggerId};
use crate::ports::{ChatClient, PropertyStore};
use crate::typed::{Job, JobHandler, JobRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUnfurlJob {
    pub channel: String,
    pub user: String,
    pub message_ts: String,
    pub url: String,
}

impl Job for ChatUnfurlJob {
    const HANDLER: &'static str = "chat_unfurl";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncLogJob {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Job for AsyncLogJob {
    const HANDLER: &'static str = "async_logging";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireAuthPromptJob {
    pub team: String,
    pub user: String,
    pub response_url: String,
}

impl Job for ExpireAuthPromptJob {
    const HANDLER: &'static str = "expire_auth_prompt";
}

pub struct ChatUnfurlHandler {
    ctx: RequestContext,
}

impl ChatUnfurlHandler {
    pub fn new(ctx: RequestContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl JobHandler<ChatUnfurlJob> for ChatUnfurlHandler {
    async fn handle(&self, job: ChatUnfurlJob) -> Result<(), JobError> {
        do_unfurls(&self.ctx, &job.channel, &job.user, &job.message_ts, &job.url)
            .await
            .map_err(JobError::from)
    }
}

pub struct AsyncLogHandler;

#[async_trait]
impl JobHandler<AsyncLogJob> for AsyncLogHandler {
    async fn handle(&self, job: AsyncLogJob) -> Result<(), JobError> {
        info!(
            message = %job.message,
            stack = job.stack.as_deref().unwrap_or_default(),
            "async log"
        );
        Ok(())
    }
}

pub struct ExpireAuthPromptHandler {
    ctx: RequestContext,
}

impl ExpireAuthPromptHandler {
    pub fn new(ctx: RequestContext) -> Self {
        Self { ctx }
    }

    async fn expire(&self, job: &ExpireAuthPromptJob) -> Result<(), AppError> {
        self.ctx
            .chat
            .respond(&job.response_url, &json!({ "delete_original": true }))
            .await?;

        // 同じプロンプトに対するフォームだけを消す（押し直し後のものは残す）
        let key = pending_auth_key(&job.team, &job.user);
        let pending = load_pending(&self.ctx, &key).await?;
        if pending.is_some_and(|p| p.response_url == job.response_url) {
            self.ctx.script_properties.delete(&key).await?;
        }
        info!(team = %job.team, user = %job.user, "authorization prompt expired");
        Ok(())
    }
}

#[async_trait]
impl JobHandler<ExpireAuthPromptJob> for ExpireAuthPromptHandler {
    async fn handle(&self, job: ExpireAuthPromptJob) -> Result<(), JobError> {
        self.expire(&job).await.map_err(JobError::from)
    }
}

/// 発火エントリポイントの dispatch table
pub fn build_registry(ctx: &RequestContext) -> Result<JobRegistry, AppError> {
    let registry = RegistryBuilder::new()
        .register::<ChatUnfurlJob, _>(ChatUnfurlHandler::new(ctx.clone()))?
        .register::<AsyncLogJob, _>(AsyncLogHandler)?
        .register::<ExpireAuthPromptJob, _>(ExpireAuthPromptHandler::new(ctx.clone()))?
        .expect_handlers(&[
            ChatUnfurlJob::HANDLER,
            AsyncLogJob::HANDLER,
            ExpireAuthPromptJob::HANDLER,
        ])
        .build()?;
    Ok(registry)
}

/// `handler` の trigger が発火したときのエントリポイント
///
/// 失敗は AsyncLogJob で記録してから返します。
/// AsyncLogJob 自身の失敗はログ job を作らない（連鎖させない）。
pub async fn run_job(
    ctx: &RequestContext,
    registry: &JobRegistry,
    handler: &HandlerName,
) -> Result<Option<TriggerId>, AppError> {
    let broker = ctx.broker();
    let err = match broker.consume_job(registry, handler).await {
        Ok(consumed) => return Ok(consumed),
        Err(err) => AppError::Broker(err),
    };

    if handler.as_str() != AsyncLogJob::HANDLER {
        let job = AsyncLogJob {
            message: err.to_string(),
            stack: err.chain(),
        };
        if let Err(log_err) = broker.enqueue(&job).await {
            warn!(error = %log_err, "failed to enqueue async log");
        }
    }
    Err(err)
}
