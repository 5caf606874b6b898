mod common;

use chrono::Duration;
use rstest::rstest;
use serde_json::{Value, json};

use common::{EchoJob, Harness, LogJob, NotifyJob, Recorder, Unavailable, start_time};
use unfurler_core::broker::{BrokerError, DuplicateEventGuard};
use unfurler_core::domain::{ErrorKind, EventId, JobState};
use unfurler_core::observability::JobCounts;
use unfurler_core::ports::{PropertyStore, Scheduler, SchedulerError};
use unfurler_core::typed::{Job, JobCodec, JobRegistry, RECORD_PREFIX};

fn registry_with<J: Job>(recorder: &Recorder) -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register::<J, _>(recorder.clone()).unwrap();
    registry
}

async fn job_keys(h: &Harness) -> Vec<String> {
    h.store.keys_with_prefix(RECORD_PREFIX).await.unwrap()
}

#[tokio::test]
async fn log_job_runs_once_and_leaves_nothing_behind() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<LogJob>(&recorder);

    let id = h
        .broker()
        .enqueue(&LogJob { msg: "x".into() })
        .await
        .unwrap();
    assert!(recorder.seen().await.is_empty(), "nothing runs synchronously");

    // 発火: プラットフォームが trigger を消費して再入する
    let fired = h.scheduler.fire(id).await.unwrap();
    let consumed = h
        .broker()
        .consume_job(&registry, &fired.handler)
        .await
        .unwrap();

    assert_eq!(consumed, Some(id));
    assert_eq!(recorder.seen().await, vec![json!({ "msg": "x" })]);
    assert!(h.store.get(&JobCodec::record_key(id)).await.unwrap().is_none());
    assert!(job_keys(&h).await.is_empty());
}

#[tokio::test]
async fn second_consume_for_the_same_firing_is_a_no_op() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<LogJob>(&recorder);
    h.broker().enqueue(&LogJob { msg: "x".into() }).await.unwrap();

    let first = h.broker().consume_job(&registry, &LogJob::handler_name()).await.unwrap();
    let second = h.broker().consume_job(&registry, &LogJob::handler_name()).await.unwrap();

    assert!(first.is_some());
    assert_eq!(second, None);
    assert_eq!(recorder.seen().await.len(), 1);
}

#[tokio::test]
async fn firings_out_of_order_still_resolve_first_enqueued_job_first() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<NotifyJob>(&recorder);
    let broker = h.broker();

    let a = broker.enqueue(&NotifyJob { payload: "A".into() }).await.unwrap();
    let b = broker.enqueue(&NotifyJob { payload: "B".into() }).await.unwrap();

    // B の trigger が先に発火
    let fired = h.scheduler.fire(b).await.unwrap();
    let first = h.broker().consume_job(&registry, &fired.handler).await.unwrap();
    // A の trigger は B の handle として残っている
    let fired = h.scheduler.fire(a).await.expect("trigger left for the waiting job");
    let second = h.broker().consume_job(&registry, &fired.handler).await.unwrap();

    assert_eq!(first, Some(a));
    assert_eq!(second, Some(b));
    assert_eq!(
        recorder.seen().await,
        vec![json!({ "payload": "A" }), json!({ "payload": "B" })]
    );
    assert_eq!(h.broker().counts().await.unwrap(), JobCounts::default());
}

#[rstest]
#[case::first_fires_first(vec![0, 1, 2])]
#[case::last_fires_first(vec![2, 1, 0])]
#[case::middle_fires_first(vec![1, 2, 0])]
#[tokio::test]
async fn every_waiting_job_keeps_a_trigger(#[case] firing_order: Vec<usize>) {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<NotifyJob>(&recorder);
    let handler = NotifyJob::handler_name();

    let mut ids = Vec::new();
    for payload in ["A", "B", "C"] {
        let id = h
            .broker()
            .enqueue(&NotifyJob { payload: payload.into() })
            .await
            .unwrap();
        ids.push(id);
    }

    for index in firing_order {
        // 残っている trigger のうち、指定の job のものが無ければ最古のものを発火
        let remaining = h.scheduler.list_for(&handler).await.unwrap();
        let target = remaining
            .iter()
            .find(|t| t.id == ids[index])
            .or_else(|| remaining.first())
            .map(|t| t.id)
            .expect("a trigger per waiting job");
        let fired = h.scheduler.fire(target).await.unwrap();
        h.broker().consume_job(&registry, &fired.handler).await.unwrap();

        let counts = h.broker().counts().await.unwrap();
        assert_eq!(counts.waiting, counts.triggers);
    }

    assert_eq!(
        recorder.seen().await,
        vec![
            json!({ "payload": "A" }),
            json!({ "payload": "B" }),
            json!({ "payload": "C" }),
        ]
    );
}

#[tokio::test]
async fn consuming_deletes_the_trigger_even_if_it_never_fired() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<LogJob>(&recorder);
    let id = h.broker().enqueue(&LogJob { msg: "x".into() }).await.unwrap();

    h.broker().consume_job(&registry, &LogJob::handler_name()).await.unwrap();

    let remaining = h.scheduler.list().await.unwrap();
    assert!(remaining.iter().all(|t| t.id != id));
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn consume_only_touches_jobs_of_the_firing_handler() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<LogJob>(&recorder);
    let broker = h.broker();
    broker.enqueue(&NotifyJob { payload: "A".into() }).await.unwrap();
    let log = broker.enqueue(&LogJob { msg: "x".into() }).await.unwrap();

    let consumed = broker.consume_job(&registry, &LogJob::handler_name()).await.unwrap();

    assert_eq!(consumed, Some(log));
    assert_eq!(broker.pending(&NotifyJob::handler_name()).await.unwrap().len(), 1);
    assert_eq!(h.scheduler.list_for(&NotifyJob::handler_name()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_handler_propagates_and_still_cleans_up() {
    let h = Harness::new();
    let mut registry = JobRegistry::new();
    registry.register::<LogJob, _>(Unavailable).unwrap();
    let id = h.broker().enqueue(&LogJob { msg: "x".into() }).await.unwrap();

    let err = h
        .broker()
        .consume_job(&registry, &LogJob::handler_name())
        .await
        .unwrap_err();

    let BrokerError::HandlerFailed {
        id: failed,
        handler,
        source,
    } = &err
    else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(*failed, id);
    assert_eq!(handler.as_str(), "log");
    assert_eq!(source.kind(), ErrorKind::Transient);
    assert!(source.message().contains("status=503"));
    assert_eq!(err.kind(), ErrorKind::Transient);

    assert_eq!(h.broker().counts().await.unwrap(), JobCounts::default());
    // broker はリトライしない
    assert_eq!(
        h.broker().consume_job(&registry, &LogJob::handler_name()).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn undecodable_parameter_fails_the_job() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<LogJob>(&recorder);
    // 同じ handler 名で別の形のパラメータを積む
    h.broker().enqueue(&EchoLogShape { wrong: 1 }).await.unwrap();

    let err = h
        .broker()
        .consume_job(&registry, &LogJob::handler_name())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Permanent);
    assert!(recorder.seen().await.is_empty());
    assert!(job_keys(&h).await.is_empty());
}

#[derive(serde::Serialize, serde::Deserialize)]
struct EchoLogShape {
    wrong: u32,
}

impl Job for EchoLogShape {
    const HANDLER: &'static str = "log";
}

#[tokio::test]
async fn exhausted_scheduler_propagates_without_writing_a_record() {
    let h = Harness::with_max_triggers(2);
    let broker = h.broker();
    broker.enqueue(&LogJob { msg: "1".into() }).await.unwrap();
    broker.enqueue(&LogJob { msg: "2".into() }).await.unwrap();

    let err = broker.enqueue(&LogJob { msg: "3".into() }).await.unwrap_err();

    assert!(matches!(
        err,
        BrokerError::Scheduler(SchedulerError::Exhausted { limit: 2 })
    ));
    assert_eq!(job_keys(&h).await.len(), 2);
}

#[tokio::test]
async fn delayed_job_waits_for_its_time() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<LogJob>(&recorder);
    let at = start_time() + Duration::minutes(10);

    let id = h
        .broker()
        .perform_later(&LogJob { msg: "later".into() }, at)
        .await
        .unwrap();

    let pending = h.broker().pending(&LogJob::handler_name()).await.unwrap();
    assert_eq!(pending[0].scheduled_at, Some(at));
    assert_eq!(pending[0].state, JobState::Waiting);
    assert!(h.scheduler.fire_due().await.is_empty());
    assert_eq!(
        h.broker().consume_job(&registry, &LogJob::handler_name()).await.unwrap(),
        None
    );

    h.clock.advance(Duration::minutes(10));
    let fired = h.scheduler.fire_due().await;
    assert_eq!(fired.len(), 1);
    assert_eq!(
        h.broker().consume_job(&registry, &fired[0].handler).await.unwrap(),
        Some(id)
    );
    assert_eq!(recorder.seen().await, vec![json!({ "msg": "later" })]);
}

#[tokio::test]
async fn racing_firings_dispatch_the_handler_once() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<LogJob>(&recorder);
    h.broker().enqueue(&LogJob { msg: "x".into() }).await.unwrap();

    let (b1, b2) = (h.broker(), h.broker());
    let handler = LogJob::handler_name();
    let (r1, r2) = tokio::join!(
        b1.consume_job(&registry, &handler),
        b2.consume_job(&registry, &handler),
    );

    let dispatched = [r1.unwrap(), r2.unwrap()]
        .into_iter()
        .filter(Option::is_some)
        .count();
    assert_eq!(dispatched, 1);
    assert_eq!(recorder.seen().await.len(), 1);
}

#[tokio::test]
async fn cancel_removes_a_waiting_job() {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<LogJob>(&recorder);
    let broker = h.broker();
    let id = broker.enqueue(&LogJob { msg: "x".into() }).await.unwrap();

    assert!(broker.cancel(id).await.unwrap());
    assert!(h.scheduler.list().await.unwrap().is_empty());
    assert!(job_keys(&h).await.is_empty());

    assert!(!broker.cancel(id).await.unwrap());
    assert_eq!(
        broker.consume_job(&registry, &LogJob::handler_name()).await.unwrap(),
        None
    );
    assert!(recorder.seen().await.is_empty());
}

#[rstest]
#[case::string(json!("plain"))]
#[case::nested(json!({ "channel": "C1", "links": [{ "url": "https://team.esa.io/posts/1" }] }))]
#[case::unicode(json!({ "text": "日報/2015/05/09/hi! #api #dev\n* 1" }))]
#[case::numbers(json!([0, -1, 1.5, null, true]))]
#[tokio::test]
async fn parameter_survives_the_invocation_boundary(#[case] payload: Value) {
    let h = Harness::new();
    let recorder = Recorder::default();
    let registry = registry_with::<EchoJob>(&recorder);

    h.broker()
        .enqueue(&EchoJob {
            payload: payload.clone(),
        })
        .await
        .unwrap();
    h.broker().consume_job(&registry, &EchoJob::handler_name()).await.unwrap();

    assert_eq!(recorder.seen().await, vec![json!({ "payload": payload })]);
}

#[tokio::test]
async fn duplicate_guard_reports_marked_events() {
    let h = Harness::new();
    let guard = DuplicateEventGuard::new(h.store.clone(), h.clock.clone());
    let event = EventId::new("evt-1");

    assert!(!guard.check(&event).await.unwrap());
    guard.mark_processed(&event).await.unwrap();
    assert!(guard.check(&event).await.unwrap());
}
