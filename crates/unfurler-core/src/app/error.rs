//! AppError - リクエスト処理（エントリポイント）のエラー
//!
//! 重複イベントはエラーではなく `Dispatch::Duplicate` として返します。

use thiserror::Error;

use super::builder::BuildError;
use crate::broker::BrokerError;
use crate::config::ConfigError;
use crate::domain::{ClientError, ErrorKind, JobError};
use crate::ports::StoreError;
use crate::typed::RegistryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// 下流サービスのエラー（ネットワークエラーは status と body を保持）
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// 検証トークン不一致
    #[error("verification token mismatch")]
    Unauthorized,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_) | AppError::Registry(_) | AppError::Build(_) => {
                ErrorKind::Configuration
            }
            AppError::Client(err) => err.kind(),
            AppError::Broker(err) => err.kind(),
            AppError::Store(_) => ErrorKind::Transient,
            AppError::Unauthorized | AppError::InvalidPayload(_) => ErrorKind::Permanent,
        }
    }

    /// `source()` を辿ったエラーの連鎖（async log の stack 欄に使う）
    pub fn chain(&self) -> Option<String> {
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            causes.push(format!("caused by: {err}"));
            source = err.source();
        }
        (!causes.is_empty()).then(|| causes.join("\n"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidPayload(err.to_string())
    }
}

impl From<AppError> for JobError {
    fn from(err: AppError) -> Self {
        JobError::new(err.kind(), err.to_string())
    }
}
