//! JobBroker - enqueue / consume_job / cancel
//!
//! # 学習ポイント
//! - trait object (`Arc<dyn PropertyStore>`) 越しのステートレスな再入処理
//! - compare_and_swap + read-back による at-most-once の claim
//! - 戦略値（`FireAt`）による即時 / 遅延の切り替え（継承の代わりの合成）
//!
//! # ライフサイクル
//! ```text
//! enqueue ──▶ waiting ──consume_job──▶ running ──▶ done   ──▶ (削除)
//!                │                        └──────▶ failed ──▶ (削除)
//!                └──cancel──▶ (削除)
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::BrokerError;
use crate::domain::{FireAt, HandlerName, JobError, JobRecord, JobState, TriggerId};
use crate::observability::JobCounts;
use crate::ports::{Clock, IdGenerator, PropertyStore, Scheduler};
use crate::typed::{Job, JobCodec, JobRegistry, RECORD_PREFIX};

/// ストアから読んだレコードと、その生の値
///
/// compare_and_swap の期待値には再エンコードした値ではなく生の値を使います。
struct StoredRecord {
    key: String,
    raw: String,
    record: JobRecord,
}

/// JobBroker は job レコードと scheduler の trigger を一対一で管理する
///
/// # 使用例
/// ```ignore
/// let broker = JobBroker::new(store, scheduler, clock, ids);
/// broker.enqueue(&ChatUnfurlJob { .. }).await?;
///
/// // 発火した invocation の中で
/// broker.consume_job(&registry, &ChatUnfurlJob::handler_name()).await?;
///
/// // 時刻指定
/// broker.delayed(at).enqueue(&ExpireAuthPromptJob { .. }).await?;
/// ```
#[derive(Clone)]
pub struct JobBroker {
    store: Arc<dyn PropertyStore>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    fire_at: FireAt,
}

impl JobBroker {
    pub fn new(
        store: Arc<dyn PropertyStore>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            scheduler,
            clock,
            ids,
            fire_at: FireAt::Immediate,
        }
    }

    pub fn with_fire_at(mut self, fire_at: FireAt) -> Self {
        self.fire_at = fire_at;
        self
    }

    /// 同じストアと scheduler を共有し、`at` に発火する broker
    pub fn delayed(&self, at: DateTime<Utc>) -> Self {
        self.clone().with_fire_at(FireAt::At(at))
    }

    pub fn fire_at(&self) -> FireAt {
        self.fire_at
    }

    /// trigger を予約し、waiting のレコードを書き込む
    ///
    /// handler はここでは実行しません。scheduler の枯渇はリトライせずに返します。
    pub async fn enqueue<J: Job>(&self, job: &J) -> Result<TriggerId, BrokerError> {
        let handler = J::handler_name();
        let parameter = JobCodec::encode_parameter(job)?;

        let trigger = self
            .scheduler
            .create(&handler, self.fire_at)
            .await
            .inspect_err(|err| warn!(handler = %handler, error = %err, "failed to create trigger"))?;

        let record = JobRecord::waiting(
            trigger.id,
            handler.clone(),
            parameter,
            self.clock.now(),
            self.fire_at.scheduled_at(),
        );
        let key = JobCodec::record_key(record.id);
        let write = match JobCodec::encode_record(&record) {
            Ok(encoded) => self.store.set(&key, &encoded).await.map_err(BrokerError::from),
            Err(err) => Err(BrokerError::from(err)),
        };
        if let Err(err) = write {
            // レコードの無い trigger は発火しても no-op だが、上限枠を消費し続ける
            if let Err(cleanup) = self.scheduler.delete(trigger.id).await {
                warn!(trigger_id = %trigger.id, error = %cleanup, "failed to delete orphan trigger");
            }
            return Err(err);
        }

        info!(
            trigger_id = %record.id,
            handler = %handler,
            due_at = %trigger.due_at,
            "job enqueued"
        );
        Ok(record.id)
    }

    /// `at` に発火する job を enqueue する
    pub async fn perform_later<J: Job>(
        &self,
        job: &J,
        at: DateTime<Utc>,
    ) -> Result<TriggerId, BrokerError> {
        self.delayed(at).enqueue(job).await
    }

    /// 発火した invocation から呼ばれ、`handler` の waiting job を一つ実行する
    ///
    /// 1. registry から handler を引く（未登録は設定エラー）
    /// 2. 期限に達した waiting レコードを `dispatch_order` 順に並べる
    /// 3. 先頭から compare_and_swap で running へ。read-back で自分の claim か確かめる
    /// 4. 不要になった trigger を削除してから handler を実行（`release_trigger`）
    /// 5. done / failed を書いてからレコードを削除
    ///
    /// 実行した job の ID を返します。候補が無ければ `Ok(None)`（二度目の consume は no-op）。
    pub async fn consume_job(
        &self,
        registry: &JobRegistry,
        handler: &HandlerName,
    ) -> Result<Option<TriggerId>, BrokerError> {
        let dyn_handler = registry
            .get(handler.as_str())
            .ok_or_else(|| BrokerError::UnknownHandler(handler.clone()))?;

        let now = self.clock.now();
        let mut candidates: Vec<StoredRecord> = self
            .load_records()
            .await?
            .into_iter()
            .filter(|stored| {
                stored.record.handler == *handler
                    && stored.record.state.is_claimable()
                    && stored.record.is_due(now)
            })
            .collect();
        candidates.sort_by_key(|stored| stored.record.dispatch_order());

        for stored in candidates {
            let Some(mut running) = self.claim(&stored).await? else {
                debug!(trigger_id = %stored.record.id, "claim lost to another firing");
                continue;
            };
            let id = running.id;

            // trigger の後始末に失敗しても handler は実行する
            if let Err(err) = self.release_trigger(handler, id).await {
                warn!(trigger_id = %id, error = %err, "failed to delete trigger");
            }

            info!(trigger_id = %id, handler = %handler, "job started");
            let result = match JobCodec::decode_parameter(&running.parameter) {
                Ok(parameter) => dyn_handler.handle_dyn(parameter).await,
                Err(err) => Err(JobError::permanent(err.to_string())),
            };

            match &result {
                Ok(()) => running.mark_done(),
                Err(err) => running.mark_failed(err.to_string()),
            }
            self.finish(&stored.key, &running).await?;

            return match result {
                Ok(()) => {
                    info!(trigger_id = %id, handler = %handler, "job done");
                    Ok(Some(id))
                }
                Err(source) => Err(BrokerError::HandlerFailed {
                    id,
                    handler: handler.clone(),
                    source,
                }),
            };
        }

        debug!(handler = %handler, "no waiting job for firing");
        Ok(None)
    }

    /// 発火前の job を取り消す（trigger とレコードを両方削除）
    ///
    /// 既に claim された job や存在しない job は取り消せず、false を返します。
    pub async fn cancel(&self, id: TriggerId) -> Result<bool, BrokerError> {
        let key = JobCodec::record_key(id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(false);
        };
        let record = JobCodec::decode_record(&raw)?;
        if !record.state.is_claimable() {
            return Ok(false);
        }

        // 削除の前に running へ遷移させ、同時に発火した consume_job と競合させない
        let stored = StoredRecord { key, raw, record };
        if self.claim(&stored).await?.is_none() {
            return Ok(false);
        }
        self.release_trigger(&stored.record.handler, id).await?;
        self.store.delete(&stored.key).await?;

        info!(trigger_id = %id, handler = %stored.record.handler, "job cancelled");
        Ok(true)
    }

    /// `handler` の waiting job（dispatch 順）
    pub async fn pending(&self, handler: &HandlerName) -> Result<Vec<JobRecord>, BrokerError> {
        let mut records: Vec<JobRecord> = self
            .load_records()
            .await?
            .into_iter()
            .map(|stored| stored.record)
            .filter(|record| record.handler == *handler && record.state.is_claimable())
            .collect();
        records.sort_by_key(JobRecord::dispatch_order);
        Ok(records)
    }

    pub async fn counts(&self) -> Result<JobCounts, BrokerError> {
        let mut counts = JobCounts {
            triggers: self.scheduler.list().await?.len(),
            ..JobCounts::default()
        };
        for stored in self.load_records().await? {
            match stored.record.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Running => counts.running += 1,
                JobState::Done => counts.done += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    /// `job#` のレコードをすべて読む
    ///
    /// 壊れたレコードは読み飛ばします。
    /// 終端状態のまま残っているレコード（削除前に invocation が落ちた場合）はここで掃除します。
    async fn load_records(&self) -> Result<Vec<StoredRecord>, BrokerError> {
        let mut records = Vec::new();
        for key in self.store.keys_with_prefix(RECORD_PREFIX).await? {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            let record = match JobCodec::decode_record(&raw) {
                Ok(record) => record,
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping unreadable job record");
                    continue;
                }
            };
            if record.state.is_terminal() {
                warn!(
                    trigger_id = %record.id,
                    state = ?record.state,
                    "sweeping terminal job record"
                );
                self.scheduler.delete(record.id).await?;
                self.store.delete(&key).await?;
                continue;
            }
            records.push(StoredRecord { key, raw, record });
        }
        Ok(records)
    }

    /// waiting → running を compare_and_swap で書き、read-back で確かめる
    ///
    /// ストアの compare_and_swap がアトミックでない場合、read-back の後にも
    /// 狭い競合の窓が残ります。
    async fn claim(&self, stored: &StoredRecord) -> Result<Option<JobRecord>, BrokerError> {
        let claim = self.ids.generate_claim_token();
        let mut running = stored.record.clone();
        running.start(claim);
        let encoded = JobCodec::encode_record(&running)?;

        let swapped = self
            .store
            .compare_and_swap(&stored.key, Some(&stored.raw), &encoded)
            .await?;
        if !swapped {
            return Ok(None);
        }

        let confirmed = self
            .store
            .get(&stored.key)
            .await?
            .and_then(|raw| JobCodec::decode_record(&raw).ok())
            .is_some_and(|record| record.is_claimed_by(claim));
        Ok(confirmed.then_some(running))
    }

    /// claim した job の trigger を削除する
    ///
    /// 発火した trigger が claim した job のものとは限りません（FIFO で先頭を取るため）。
    /// 未発火の trigger が残りの waiting job の数を超えないときは、
    /// 発火を消費された waiting job の handle として残します。
    async fn release_trigger(&self, handler: &HandlerName, id: TriggerId) -> Result<(), BrokerError> {
        let outstanding = self.scheduler.list_for(handler).await?;
        if !outstanding.iter().any(|trigger| trigger.id == id) {
            // 発火済み（プラットフォームが消費済み）
            return Ok(());
        }

        let waiting = self
            .load_records()
            .await?
            .iter()
            .filter(|stored| stored.record.handler == *handler && stored.record.state.is_claimable())
            .count();
        if outstanding.len() > waiting {
            self.scheduler.delete(id).await?;
        } else {
            debug!(
                trigger_id = %id,
                handler = %handler,
                waiting,
                "keeping trigger for a waiting job whose firing was consumed"
            );
        }
        Ok(())
    }

    /// 終端状態を書き、同じ呼び出しの中でレコードを削除する
    async fn finish(&self, key: &str, record: &JobRecord) -> Result<(), BrokerError> {
        self.store.set(key, &JobCodec::encode_record(record)?).await?;
        if record.state == JobState::Failed {
            error!(
                trigger_id = %record.id,
                handler = %record.handler,
                parameter = %record.parameter,
                error = record.last_error.as_deref().unwrap_or_default(),
                "job failed"
            );
        }
        self.store.delete(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClaimToken;
    use crate::impls::{InMemoryPropertyStore, InMemoryScheduler};
    use crate::ports::{FixedClock, StoreError, UlidGenerator};
    use crate::typed::handler::fixtures::{LogJob, Recorder};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use ulid::Ulid;

    struct Fixture {
        broker: JobBroker,
        store: Arc<dyn PropertyStore>,
        scheduler: Arc<InMemoryScheduler>,
    }

    fn fixture_with_store(store: Arc<dyn PropertyStore>) -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        let scheduler = Arc::new(InMemoryScheduler::new(ids.clone(), clock.clone()));
        let broker = JobBroker::new(store.clone(), scheduler.clone(), clock, ids);
        Fixture {
            broker,
            store,
            scheduler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_store(Arc::new(InMemoryPropertyStore::new()))
    }

    fn registry_with(recorder: &Recorder<LogJob>) -> JobRegistry {
        let mut registry = JobRegistry::new();
        registry.register::<LogJob, _>(recorder.clone()).unwrap();
        registry
    }

    /// running を書いた直後に、別の firing の claim で上書きされるストア
    ///
    /// compare_and_swap はデフォルト（非アトミック）実装を使う。
    struct RacingStore {
        inner: InMemoryPropertyStore,
    }

    #[async_trait]
    impl PropertyStore for RacingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            let mut record = JobCodec::decode_record(value).unwrap();
            if record.state == JobState::Running {
                record.start(ClaimToken::from_ulid(Ulid::new()));
            }
            let value = JobCodec::encode_record(&record).unwrap();
            self.inner.set(key, &value).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }

        async fn keys(&self) -> Result<Vec<String>, StoreError> {
            self.inner.keys().await
        }
    }

    #[tokio::test]
    async fn test_enqueue_writes_waiting_record_keyed_by_trigger() {
        let f = fixture();
        let id = f
            .broker
            .enqueue(&LogJob { msg: "x".into() })
            .await
            .unwrap();

        let triggers = f.scheduler.list().await.unwrap();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].id, id);

        let raw = f.store.get(&JobCodec::record_key(id)).await.unwrap().unwrap();
        let record = JobCodec::decode_record(&raw).unwrap();
        assert_eq!(record.state, JobState::Waiting);
        assert_eq!(record.handler.as_str(), "log");
        assert_eq!(record.scheduled_at, None);
    }

    #[tokio::test]
    async fn test_unknown_handler_is_configuration_error() {
        let f = fixture();
        f.broker.enqueue(&LogJob { msg: "x".into() }).await.unwrap();

        let err = f
            .broker
            .consume_job(&JobRegistry::new(), &LogJob::handler_name())
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::UnknownHandler(ref name) if name.as_str() == "log"));
        // レコードには触れない
        assert_eq!(f.broker.pending(&LogJob::handler_name()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_record_is_skipped() {
        let f = fixture();
        f.store.set("job#garbage", "{not json").await.unwrap();
        f.broker.enqueue(&LogJob { msg: "x".into() }).await.unwrap();

        let recorder = Recorder::<LogJob>::default();
        let consumed = f
            .broker
            .consume_job(&registry_with(&recorder), &LogJob::handler_name())
            .await
            .unwrap();

        assert!(consumed.is_some());
        assert_eq!(recorder.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_terminal_record_is_swept() {
        let f = fixture();
        let id = f.broker.enqueue(&LogJob { msg: "x".into() }).await.unwrap();

        // 削除前に invocation が落ちた状態を作る
        let key = JobCodec::record_key(id);
        let mut record = JobCodec::decode_record(&f.store.get(&key).await.unwrap().unwrap()).unwrap();
        record.start(ClaimToken::from_ulid(Ulid::new()));
        record.mark_done();
        f.store.set(&key, &JobCodec::encode_record(&record).unwrap()).await.unwrap();

        let counts = f.broker.counts().await.unwrap();

        assert_eq!(counts, JobCounts::default());
        assert!(f.store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lost_read_back_does_not_dispatch() {
        let f = fixture_with_store(Arc::new(RacingStore {
            inner: InMemoryPropertyStore::new(),
        }));
        f.broker.enqueue(&LogJob { msg: "x".into() }).await.unwrap();

        let recorder = Recorder::<LogJob>::default();
        let consumed = f
            .broker
            .consume_job(&registry_with(&recorder), &LogJob::handler_name())
            .await
            .unwrap();

        assert_eq!(consumed, None);
        assert!(recorder.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_delayed_broker_shares_storage() {
        let f = fixture();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 10, 0).unwrap();
        let delayed = f.broker.delayed(at);

        assert_eq!(delayed.fire_at(), FireAt::At(at));
        assert_eq!(f.broker.fire_at(), FireAt::Immediate);

        delayed.enqueue(&LogJob { msg: "later".into() }).await.unwrap();
        let pending = f.broker.pending(&LogJob::handler_name()).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].scheduled_at, Some(at));
    }
}
