//! RegistryBuilder - handler 登録と起動時検証
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use crate::typed::{Job, JobHandler, JobRegistry, RegistryError};

/// RegistryBuilder は dispatch table を構築
///
/// # 使用例
/// ```ignore
/// let registry = RegistryBuilder::new()
///     .register::<ChatUnfurlJob, _>(ChatUnfurlHandler::new(ctx.clone()))?
///     .expect_handlers(&[ChatUnfurlJob::HANDLER])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_handlers() で期待される handler 名を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば発火時ではなく起動時に BuildError を返す
pub struct RegistryBuilder {
    registry: JobRegistry,
    expected_handlers: Option<Vec<String>>,
}

/// BuildError は dispatch table 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing handlers: {0:?}. These handlers were expected but not registered.")]
    MissingHandlers(Vec<String>),
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: JobRegistry::new(),
            expected_handlers: None,
        }
    }

    pub fn register<J: Job, H: JobHandler<J> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<J, H>(handler)?;
        Ok(self)
    }

    /// 期待される handler 名のリストを設定
    pub fn expect_handlers(mut self, handlers: &[&str]) -> Self {
        self.expected_handlers = Some(handlers.iter().map(|h| h.to_string()).collect());
        self
    }

    /// # 検証
    /// - expect_handlers() で設定された handler が全て登録されているかチェック
    /// - 不足があれば BuildError::MissingHandlers を返す
    pub fn build(self) -> Result<JobRegistry, BuildError> {
        if let Some(expected) = &self.expected_handlers {
            let missing: Vec<String> = expected
                .iter()
                .filter(|h| !self.registry.contains(h))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingHandlers(missing));
            }
        }
        Ok(self.registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::fixtures::{LogJob, NotifyJob, Recorder};

    #[test]
    fn test_build_success() {
        let registry = RegistryBuilder::new()
            .register::<LogJob, _>(Recorder::<LogJob>::default())
            .unwrap()
            .expect_handlers(&[LogJob::HANDLER])
            .build();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_build_missing_handlers() {
        let registry = RegistryBuilder::new()
            .register::<LogJob, _>(Recorder::<LogJob>::default())
            .unwrap()
            .expect_handlers(&[LogJob::HANDLER, NotifyJob::HANDLER])
            .build();
        assert!(matches!(
            registry,
            Err(BuildError::MissingHandlers(missing)) if missing == vec![NotifyJob::HANDLER.to_string()]
        ));
    }

    #[test]
    fn test_build_no_expect_handlers() {
        let registry = RegistryBuilder::new()
            .register::<LogJob, _>(Recorder::<LogJob>::default())
            .unwrap()
            .build();
        assert!(registry.is_ok());
    }
}
