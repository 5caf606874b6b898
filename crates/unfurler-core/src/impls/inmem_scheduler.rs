//! InMemoryScheduler - 開発用の trigger 管理
//!
//! # 学習ポイント
//! - プラットフォームの「発火」をテストから明示的に起こす（`fire` / `fire_due`）
//! - 発火した trigger はプラットフォーム側で消費される、という挙動を再現する
//! - 未発火 trigger 数の上限（`max_triggers`）で枯渇を再現する

use crate::domain::{FireAt, HandlerName, TriggerId};
use crate::ports::{Clock, IdGenerator, Scheduler, SchedulerError, Trigger};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// プラットフォームの未発火 trigger 数の既定上限
pub const DEFAULT_MAX_TRIGGERS: usize = 20;

pub struct InMemoryScheduler {
    triggers: Arc<Mutex<Vec<Trigger>>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    max_triggers: usize,
}

impl InMemoryScheduler {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            triggers: Arc::new(Mutex::new(Vec::new())),
            ids,
            clock,
            max_triggers: DEFAULT_MAX_TRIGGERS,
        }
    }

    pub fn with_max_triggers(mut self, max_triggers: usize) -> Self {
        self.max_triggers = max_triggers;
        self
    }

    /// 指定 trigger を発火させる（trigger は消費される）
    pub async fn fire(&self, id: TriggerId) -> Option<Trigger> {
        let mut triggers = self.triggers.lock().await;
        let pos = triggers.iter().position(|t| t.id == id)?;
        Some(triggers.remove(pos))
    }

    /// 発火時刻に達した trigger をすべて発火させる（due_at 順）
    pub async fn fire_due(&self) -> Vec<Trigger> {
        let now = self.clock.now();
        let mut triggers = self.triggers.lock().await;
        let (mut due, pending): (Vec<Trigger>, Vec<Trigger>) =
            triggers.drain(..).partition(|t| t.due_at <= now);
        *triggers = pending;
        due.sort_by_key(|t| (t.due_at, t.id));
        due
    }
}

#[async_trait]
impl Scheduler for InMemoryScheduler {
    async fn create(
        &self,
        handler: &HandlerName,
        fire_at: FireAt,
    ) -> Result<Trigger, SchedulerError> {
        let mut triggers = self.triggers.lock().await;
        if triggers.len() >= self.max_triggers {
            return Err(SchedulerError::Exhausted {
                limit: self.max_triggers,
            });
        }
        let trigger = Trigger {
            id: self.ids.generate_trigger_id(),
            handler: handler.clone(),
            due_at: fire_at.resolve(self.clock.now()),
        };
        triggers.push(trigger.clone());
        Ok(trigger)
    }

    async fn delete(&self, id: TriggerId) -> Result<(), SchedulerError> {
        self.triggers.lock().await.retain(|t| t.id != id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Trigger>, SchedulerError> {
        Ok(self.triggers.lock().await.clone())
    }
}
