//! 結合テスト用の共通部品
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use unfurler_core::broker::JobBroker;
use unfurler_core::domain::JobError;
use unfurler_core::impls::{InMemoryPropertyStore, InMemoryScheduler};
use unfurler_core::ports::{FixedClock, UlidGenerator};
use unfurler_core::typed::{Job, JobHandler};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub store: Arc<InMemoryPropertyStore>,
    pub scheduler: Arc<InMemoryScheduler>,
    pub clock: Arc<FixedClock>,
    pub ids: Arc<UlidGenerator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_max_triggers(20)
    }

    pub fn with_max_triggers(max_triggers: usize) -> Self {
        let clock = Arc::new(FixedClock::new(start_time()));
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        let scheduler = Arc::new(
            InMemoryScheduler::new(ids.clone(), clock.clone()).with_max_triggers(max_triggers),
        );
        Self {
            store: Arc::new(InMemoryPropertyStore::new()),
            scheduler,
            clock,
            ids,
        }
    }

    /// 同じストアと scheduler を共有する broker（invocation ごとに作る想定）
    pub fn broker(&self) -> JobBroker {
        JobBroker::new(
            self.store.clone(),
            self.scheduler.clone(),
            self.clock.clone(),
            self.ids.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogJob {
    pub msg: String,
}

impl Job for LogJob {
    const HANDLER: &'static str = "log";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyJob {
    pub payload: String,
}

impl Job for NotifyJob {
    const HANDLER: &'static str = "notify";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoJob {
    pub payload: Value,
}

impl Job for EchoJob {
    const HANDLER: &'static str = "echo";
}

/// 受け取った job を JSON で記録する handler
#[derive(Clone, Default)]
pub struct Recorder {
    pub seen: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    pub async fn seen(&self) -> Vec<Value> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl<J: Job> JobHandler<J> for Recorder {
    async fn handle(&self, job: J) -> Result<(), JobError> {
        let value = serde_json::to_value(&job).map_err(|e| JobError::permanent(e.to_string()))?;
        self.seen.lock().await.push(value);
        Ok(())
    }
}

/// 常にネットワークエラーで失敗する handler
pub struct Unavailable;

#[async_trait]
impl<J: Job> JobHandler<J> for Unavailable {
    async fn handle(&self, _job: J) -> Result<(), JobError> {
        Err(JobError::transient("network error: status=503, body=unavailable"))
    }
}
