//! InMemoryOAuth2Provider - 開発用の OAuth2 状態管理
//!
//! トークンは利用者スコープの PropertyStore に `oauth2.esa#<team>#<user>` で保存します。
//! 認可コードの交換は行わず、`authorize` で「コールバックが成功した」状態を作ります。

use crate::domain::ClientError;
use crate::ports::{OAuth2Provider, OAuth2Service, PropertyStore};
use async_trait::async_trait;
use std::sync::Arc;

pub struct InMemoryOAuth2Provider {
    user_properties: Arc<dyn PropertyStore>,
    authorization_base_url: String,
}

impl InMemoryOAuth2Provider {
    pub fn new(user_properties: Arc<dyn PropertyStore>) -> Self {
        Self {
            user_properties,
            authorization_base_url: "https://api.esa.io/oauth/authorize".to_string(),
        }
    }

    fn token_key(team: &str, user: &str) -> String {
        format!("oauth2.esa#{team}#{user}")
    }

    /// 認可コールバック成功をシミュレート
    pub async fn authorize(&self, team: &str, user: &str, token: &str) -> Result<(), ClientError> {
        self.user_properties
            .set(&Self::token_key(team, user), token)
            .await
            .map_err(|e| ClientError::Rejected(e.to_string()))
    }
}

impl OAuth2Provider for InMemoryOAuth2Provider {
    fn knowledge_base(&self, team: &str, user: &str) -> Arc<dyn OAuth2Service> {
        Arc::new(InMemoryOAuth2Service {
            user_properties: self.user_properties.clone(),
            key: Self::token_key(team, user),
            authorization_url: format!(
                "{}?response_type=code&scope=read&state={}",
                self.authorization_base_url,
                Self::token_key(team, user)
            ),
        })
    }
}

struct InMemoryOAuth2Service {
    user_properties: Arc<dyn PropertyStore>,
    key: String,
    authorization_url: String,
}

#[async_trait]
impl OAuth2Service for InMemoryOAuth2Service {
    async fn has_access(&self) -> Result<bool, ClientError> {
        Ok(self.access_token().await?.is_some())
    }

    async fn access_token(&self) -> Result<Option<String>, ClientError> {
        self.user_properties
            .get(&self.key)
            .await
            .map_err(|e| ClientError::Rejected(e.to_string()))
    }

    fn authorization_url(&self) -> String {
        self.authorization_url.clone()
    }

    async fn reset(&self) -> Result<(), ClientError> {
        self.user_properties
            .delete(&self.key)
            .await
            .map_err(|e| ClientError::Rejected(e.to_string()))
    }
}
