//! Errors - エラー型と分類
//!
//! # 分類
//! - Configuration: 設定ミス（未登録 handler、認証情報の欠落）。リトライ無意味
//! - Transient: 一時的なエラー（下流 API のネットワーク障害など）
//! - Permanent: 恒久的なエラー（不正な payload など）

use thiserror::Error;

/// ErrorKind は実行エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transient,
    Permanent,
}

/// JobError は job handler が返すエラー
///
/// broker はこの中身を解釈せず、`failed` への遷移と呼び出し元への伝播だけを行います。
/// リトライしたい handler は自分で再度 enqueue します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobError {
    kind: ErrorKind,
    message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JobError (kind: {:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for JobError {}

/// ClientError は下流サービス（chat / knowledge base / OAuth2）呼び出しのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// 上流の status と body をそのまま保持する
    #[error("network error: status={status}, body={body}")]
    Network { status: u16, body: String },

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Network { .. } => ErrorKind::Transient,
            ClientError::Rejected(_) => ErrorKind::Permanent,
        }
    }
}

impl From<ClientError> for JobError {
    fn from(err: ClientError) -> Self {
        JobError::new(err.kind(), err.to_string())
    }
}
