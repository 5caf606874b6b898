//! Config - 環境変数からの設定読み込み
//!
//! 必須の認証情報が欠けている場合は起動時に `ConfigError` を返します（リトライ無意味）。

use std::env;
use std::fmt;

use chrono::Duration;
use thiserror::Error;

use crate::impls::DEFAULT_MAX_TRIGGERS;

/// 認可プロンプトを自動で消すまでの既定秒数
pub const DEFAULT_AUTH_PROMPT_TTL_SECS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be a positive number, got {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// OAuth2 クライアントの認証情報
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// chat プラットフォームが全リクエストに付ける検証トークン
    pub verification_token: String,
    pub slack: OAuthCredentials,
    pub esa: OAuthCredentials,
    /// プラットフォームの未発火 trigger 数の上限
    pub max_triggers: usize,
    /// 認可プロンプト（ephemeral message）の寿命
    pub auth_prompt_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// `lookup` で値を引く（テストでは HashMap などを渡す）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let positive = |name: &'static str, default: i64| -> Result<i64, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(ConfigError::Invalid { name, value }),
            }
        };

        Ok(Self {
            verification_token: required("VERIFICATION_TOKEN")?,
            slack: OAuthCredentials {
                client_id: required("SLACK_CLIENT_ID")?,
                client_secret: required("SLACK_CLIENT_SECRET")?,
            },
            esa: OAuthCredentials {
                client_id: required("ESA_CLIENT_ID")?,
                client_secret: required("ESA_CLIENT_SECRET")?,
            },
            max_triggers: positive("UNFURLER_MAX_TRIGGERS", DEFAULT_MAX_TRIGGERS as i64)? as usize,
            auth_prompt_ttl: Duration::seconds(positive(
                "UNFURLER_AUTH_PROMPT_TTL_SECS",
                DEFAULT_AUTH_PROMPT_TTL_SECS,
            )?),
        })
    }
}
