//! RecordingChatClient - 送信内容を記録するだけの ChatClient
//!
//! テストでは「何回投稿したか」「どの URL を展開したか」を検証するのに使います。

use crate::domain::ClientError;
use crate::ports::{ChatClient, Unfurls};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCall {
    Ephemeral {
        channel: String,
        user: String,
        text: String,
        blocks: Option<Value>,
    },
    Unfurl {
        channel: String,
        message_ts: String,
        unfurls: Unfurls,
    },
    Respond {
        response_url: String,
        body: Value,
    },
}

#[derive(Default)]
pub struct RecordingChatClient {
    calls: Arc<Mutex<Vec<ChatCall>>>,
    /// 設定されている間、呼び出しは記録されずにこのエラーで失敗する
    failure: Arc<Mutex<Option<ClientError>>>,
}

impl RecordingChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().await.clone()
    }

    /// API 障害をシミュレート（`None` で復旧）
    pub async fn fail_with(&self, failure: Option<ClientError>) {
        *self.failure.lock().await = failure;
    }

    async fn record(&self, call: ChatCall) -> Result<(), ClientError> {
        if let Some(err) = self.failure.lock().await.clone() {
            return Err(err);
        }
        self.calls.lock().await.push(call);
        Ok(())
    }
}

#[async_trait]
impl ChatClient for RecordingChatClient {
    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<(), ClientError> {
        self.record(ChatCall::Ephemeral {
            channel: channel.to_string(),
            user: user.to_string(),
            text: text.to_string(),
            blocks,
        })
        .await
    }

    async fn chat_unfurl(
        &self,
        channel: &str,
        message_ts: &str,
        unfurls: &Unfurls,
    ) -> Result<(), ClientError> {
        self.record(ChatCall::Unfurl {
            channel: channel.to_string(),
            message_ts: message_ts.to_string(),
            unfurls: unfurls.clone(),
        })
        .await
    }

    async fn respond(&self, response_url: &str, body: &Value) -> Result<(), ClientError> {
        self.record(ChatCall::Respond {
            response_url: response_url.to_string(),
            body: body.clone(),
        })
        .await
    }
}
