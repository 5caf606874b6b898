//! RequestContext - 1 invocation 分の依存関係
//!
//! プロセス全体のシングルトンを遅延初期化する代わりに、
//! エントリポイントで明示的に組み立てて各処理へ渡します。

use std::sync::Arc;

use crate::broker::{DuplicateEventGuard, JobBroker};
use crate::config::Config;
use crate::ports::{
    ChatClient, Clock, IdGenerator, KnowledgeBaseConnector, OAuth2Provider, OAuth2Service,
    PropertyStore, Scheduler,
};

#[derive(Clone)]
pub struct RequestContext {
    pub config: Config,
    /// スクリプト全体のスコープ（job レコード、重複マーカー、保留中の認可フォーム）
    pub script_properties: Arc<dyn PropertyStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub chat: Arc<dyn ChatClient>,
    pub knowledge_base: Arc<dyn KnowledgeBaseConnector>,
    pub oauth: Arc<dyn OAuth2Provider>,
}

impl RequestContext {
    pub fn broker(&self) -> JobBroker {
        JobBroker::new(
            self.script_properties.clone(),
            self.scheduler.clone(),
            self.clock.clone(),
            self.ids.clone(),
        )
    }

    pub fn guard(&self) -> DuplicateEventGuard {
        DuplicateEventGuard::new(self.script_properties.clone(), self.clock.clone())
    }

    /// (team, user) のナレッジベース OAuth2
    pub fn esa_oauth(&self, team: &str, user: &str) -> Arc<dyn OAuth2Service> {
        self.oauth.knowledge_base(team, user)
    }
}
