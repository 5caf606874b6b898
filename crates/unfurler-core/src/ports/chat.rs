//! ChatClient port - chat プラットフォーム API
//!
//! 実 HTTP 実装はこのクレートの外に置きます。

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::ClientError;

/// 元の URL 文字列 → 展開済みメッセージ payload
pub type Unfurls = BTreeMap<String, Value>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// 1 人の利用者にだけ見えるメッセージを投稿
    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<(), ClientError>;

    async fn chat_unfurl(
        &self,
        channel: &str,
        message_ts: &str,
        unfurls: &Unfurls,
    ) -> Result<(), ClientError>;

    /// interactive message の response URL に応答（`delete_original` など）
    async fn respond(&self, response_url: &str, body: &Value) -> Result<(), ClientError>;
}
