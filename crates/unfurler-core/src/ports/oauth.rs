//! OAuth2 port - 認可コードフローのラッパー
//!
//! トークン交換やコールバック処理そのものは外部コラボレータ側の責務です。
//! このクレートが必要とするのは「認可済みか」「トークン」「認可 URL」「リセット」だけ。

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::ClientError;

#[async_trait]
pub trait OAuth2Service: Send + Sync {
    async fn has_access(&self) -> Result<bool, ClientError>;

    /// 未認可なら `None`
    async fn access_token(&self) -> Result<Option<String>, ClientError>;

    fn authorization_url(&self) -> String;

    /// トークンを revoke して保存済みの認可状態を消す
    async fn reset(&self) -> Result<(), ClientError>;
}

/// (team, user) ごとの OAuth2Service を返す
pub trait OAuth2Provider: Send + Sync {
    fn knowledge_base(&self, team: &str, user: &str) -> Arc<dyn OAuth2Service>;
}
