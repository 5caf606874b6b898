//! JobRegistry - handler の登録と管理（dispatch table）
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権

use super::handler::{DynJobHandler, JobHandler, TypedJobHandler};
use super::job::Job;
use std::collections::HashMap;
use std::sync::Arc;

/// JobRegistry は handler 名 → handler の対応表
///
/// # 使用例
/// ```ignore
/// let mut registry = JobRegistry::new();
/// registry.register::<ChatUnfurlJob, _>(ChatUnfurlHandler::new(ctx))?;
///
/// let handler = registry.get("chat_unfurl");
/// ```
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn DynJobHandler>>,
}

/// RegistryError は JobRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<J: Job, H: JobHandler<J> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let name = J::HANDLER.to_string();
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.handlers
            .insert(name, Arc::new(TypedJobHandler::new(handler)));
        Ok(())
    }

    pub fn get(&self, handler: &str) -> Option<Arc<dyn DynJobHandler>> {
        self.handlers.get(handler).cloned()
    }

    pub fn contains(&self, handler: &str) -> bool {
        self.handlers.contains_key(handler)
    }

    /// 登録済みの handler 名（ソート済み）
    pub fn registered_handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::fixtures::{LogJob, NotifyJob, Recorder};

    #[test]
    fn test_register_and_get() {
        let mut registry = JobRegistry::new();
        registry
            .register::<LogJob, _>(Recorder::<LogJob>::default())
            .unwrap();

        assert!(registry.get(LogJob::HANDLER).is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_double_registration() {
        let mut registry = JobRegistry::new();
        registry
            .register::<LogJob, _>(Recorder::<LogJob>::default())
            .unwrap();
        let result = registry.register::<LogJob, _>(Recorder::<LogJob>::default());
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(name)) if name == "log"));
    }

    #[test]
    fn test_registered_handlers_are_sorted() {
        let mut registry = JobRegistry::new();
        registry
            .register::<NotifyJob, _>(Recorder::<NotifyJob>::default())
            .unwrap();
        registry
            .register::<LogJob, _>(Recorder::<LogJob>::default())
            .unwrap();

        assert_eq!(
            registry.registered_handlers(),
            vec!["log".to_string(), "notify".to_string()]
        );
    }
}
