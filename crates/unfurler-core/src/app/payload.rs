//! chat プラットフォームからの受信 payload
//!
//! `type` タグで振り分けます。未対応のイベント種別は `CallbackEvent::Unsupported`。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Events API の URL 検証
    UrlVerification { token: String, challenge: String },

    EventCallback {
        token: String,
        event_id: String,
        event: CallbackEvent,
    },

    /// interactive message のボタン押下
    BlockActions(BlockActions),
}

impl Inbound {
    pub fn token(&self) -> &str {
        match self {
            Inbound::UrlVerification { token, .. } | Inbound::EventCallback { token, .. } => token,
            Inbound::BlockActions(actions) => &actions.token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackEvent {
    LinkShared(LinkSharedEvent),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSharedEvent {
    pub channel: String,
    pub user: String,
    pub message_ts: String,
    pub links: Vec<SharedLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockActions {
    pub token: String,
    pub user: IdRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<IdRef>,
    pub response_url: String,
    pub actions: Vec<ButtonAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonAction {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// 認可プロンプトの「Yes」ボタンに載せる値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthForm {
    pub message_ts: String,
    pub url: String,
}
