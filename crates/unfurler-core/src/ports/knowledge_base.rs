//! KnowledgeBaseClient port - ナレッジベース（記事・コメント）取得
//!
//! 存在しないリソースは `Ok(None)`。エラーにはしません。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub screen_name: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub number: u64,
    pub name: String,
    pub full_name: String,
    pub wip: bool,
    pub body_md: String,
    pub body_html: String,
    pub created_at: String,
    #[serde(default)]
    pub message: String,
    pub url: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub revision_number: u32,
    pub created_by: Member,
    #[serde(default)]
    pub updated_by: Option<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub body_md: String,
    pub body_html: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub url: String,
    pub created_by: Member,
}

/// チーム単位の API クライアント
#[async_trait]
pub trait KnowledgeBaseClient: Send + Sync {
    fn team(&self) -> &str;

    async fn get_post(&self, number: u64) -> Result<Option<Post>, ClientError>;

    async fn get_comment(&self, id: u64) -> Result<Option<Comment>, ClientError>;
}

/// チーム名とアクセストークンから KnowledgeBaseClient を作る
pub trait KnowledgeBaseConnector: Send + Sync {
    fn connect(&self, team: &str, access_token: &str) -> Arc<dyn KnowledgeBaseClient>;
}
