#![allow(clippy::disallowed_methods)]

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{
    CacheChange, ChannelSink, Coordinator, CoordinatorConfig, CoordinatorError,
    FileSnapshotStore, LiveSink, MemorySnapshotStore, PersistFuture, PersistenceError,
    SinkError, SinkFuture, SnapshotStore, start_coordinator,
};
use pigmap_core::{Category, Comment, DomainEvent, LiveMessage, Report, ReportId};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;

type TestResult = Result<(), Box<dyn Error>>;

/// Records every frame; fails the `fail_at`-th send attempt and every one after it.
struct RecordingSink {
    frames: Arc<Mutex<Vec<String>>>,
    attempts: usize,
    fail_at: Option<usize>,
}

impl RecordingSink {
    fn new(fail_at: Option<usize>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            frames: frames.clone(),
            attempts: 0,
            fail_at,
        };
        (sink, frames)
    }
}

impl LiveSink for RecordingSink {
    fn send<'a>(&'a mut self, frame: &'a str) -> SinkFuture<'a> {
        self.attempts += 1;
        let result = match self.fail_at {
            Some(k) if self.attempts >= k => Err(SinkError("connection reset".into())),
            _ => {
                self.frames.lock().unwrap().push(frame.to_string());
                Ok(())
            }
        };
        Box::pin(async move { result })
    }
}

/// A client that stopped reading: every send hangs.
struct StalledSink;

impl LiveSink for StalledSink {
    fn send<'a>(&'a mut self, _frame: &'a str) -> SinkFuture<'a> {
        Box::pin(std::future::pending())
    }
}

/// Reads fine, never writes.
struct FailingStore;

impl SnapshotStore for FailingStore {
    fn get<'a>(&'a self, _key: &'a str) -> PersistFuture<'a, Option<Value>> {
        Box::pin(async { Ok(None) })
    }

    fn put<'a>(&'a self, _key: &'a str, _value: Value) -> PersistFuture<'a, ()> {
        Box::pin(async { Err(PersistenceError::Unavailable("disk full".into())) })
    }
}

async fn start(store: Arc<dyn SnapshotStore>) -> Result<(Coordinator, JoinHandle<()>), CoordinatorError> {
    start_coordinator(&CoordinatorConfig::ephemeral(), store).await
}

async fn start_empty() -> Result<(Coordinator, JoinHandle<()>), CoordinatorError> {
    start(Arc::new(MemorySnapshotStore::new())).await
}

fn new_report(id: &str, timestamp: i64) -> DomainEvent {
    DomainEvent::NewReport(Report::new(id, Category::Cow, 39.1, -94.5, timestamp))
}

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<LiveMessage> {
    let mut messages = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        messages.push(serde_json::from_str(&frame).unwrap());
    }
    messages
}

fn decode(frames: &Arc<Mutex<Vec<String>>>) -> Vec<LiveMessage> {
    frames
        .lock()
        .unwrap()
        .iter()
        .map(|frame| serde_json::from_str(frame).unwrap())
        .collect()
}

fn report_ids(messages: &[LiveMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            LiveMessage::New { report } | LiveMessage::Update { report } => {
                Some(report.id.to_string())
            }
            _ => None,
        })
        .collect()
}

async fn stop(coordinator: Coordinator, handle: JoinHandle<()>) -> TestResult {
    coordinator.shutdown().await?;
    handle.await?;
    Ok(())
}

#[tokio::test]
async fn test_new_report_then_subscribe_gets_initial_snapshot() -> TestResult {
    let (coordinator, handle) = start_empty().await?;

    let report = coordinator.publish(new_report("r1", 1000)).await?;
    assert_eq!(report.kind, "new_report");
    assert_eq!(report.change, CacheChange::ReportAdded { evicted: false });

    let cached = coordinator.recent_reports().await?;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id.as_str(), "r1");

    let (sink, mut rx) = ChannelSink::new();
    let subscription = coordinator.subscribe(sink).await?;
    assert!(subscription.snapshot_sent);

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        LiveMessage::Initial { reports, comments } => {
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].id.as_str(), "r1");
            assert_eq!(reports[0].category, Category::Cow);
            assert!(comments.is_empty());
        }
        other => panic!("expected initial, got {}", other.type_name()),
    }

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_cache_keeps_the_hundred_most_recent_reports() -> TestResult {
    let (coordinator, handle) = start_empty().await?;

    for i in 1..=101 {
        coordinator
            .publish(new_report(&format!("r{i}"), 1000 + i))
            .await?;
    }

    let cached = coordinator.recent_reports().await?;
    assert_eq!(cached.len(), 100);
    let ids: Vec<String> = cached.iter().map(|r| r.id.to_string()).collect();
    let expected: Vec<String> = (2..=101).rev().map(|i| format!("r{i}")).collect();
    assert_eq!(ids, expected);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_comment_reaches_every_subscriber() -> TestResult {
    let (coordinator, handle) = start_empty().await?;
    coordinator.publish(new_report("r1", 1000)).await?;

    let (a, mut a_rx) = ChannelSink::new();
    let (b, mut b_rx) = ChannelSink::new();
    coordinator.subscribe(a).await?;
    coordinator.subscribe(b).await?;
    drain(&mut a_rx);
    drain(&mut b_rx);

    let comment = Comment::new("c1", "r1", "seen near barn", 2000);
    let report = coordinator
        .publish(DomainEvent::NewComment(comment))
        .await?;
    assert_eq!(report.delivered, 2);
    assert_eq!(report.change, CacheChange::CommentAdded { evicted: false });

    for rx in [&mut a_rx, &mut b_rx] {
        let messages = drain(rx);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            LiveMessage::Comment { report_id, comment } => {
                assert_eq!(report_id.as_str(), "r1");
                assert_eq!(comment.content, "seen near barn");
            }
            other => panic!("expected comment, got {}", other.type_name()),
        }
    }

    let cached = coordinator.comments_for(ReportId::from("r1")).await?;
    assert_eq!(cached.len(), 1);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_failed_connection_is_dropped_and_others_continue() -> TestResult {
    let (coordinator, handle) = start_empty().await?;

    let (a, a_frames) = RecordingSink::new(Some(1));
    let (b, b_frames) = RecordingSink::new(None);
    let a_sub = coordinator.subscribe(a).await?;
    coordinator.subscribe(b).await?;
    assert!(!a_sub.snapshot_sent);
    assert_eq!(coordinator.connection_count().await?, 2);

    let e1 = coordinator.publish(new_report("e1", 1)).await?;
    assert_eq!(e1.delivered, 1);
    assert_eq!(e1.dropped, vec![a_sub.id]);
    assert_eq!(coordinator.connection_count().await?, 1);

    let e2 = coordinator.publish(new_report("e2", 2)).await?;
    assert_eq!(e2.delivered, 1);
    assert!(e2.dropped.is_empty());

    assert!(a_frames.lock().unwrap().is_empty());
    assert_eq!(report_ids(&decode(&b_frames)), vec!["e1", "e2"]);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_connection_failing_on_kth_attempt() -> TestResult {
    let (coordinator, handle) = start_empty().await?;

    let (flaky, frames) = RecordingSink::new(Some(3));
    let sub = coordinator.subscribe(flaky).await?;

    for i in 1..=5 {
        let report = coordinator.publish(new_report(&format!("r{i}"), i)).await?;
        let dropped_now = report.dropped.contains(&sub.id);
        assert_eq!(dropped_now, i == 3);
        assert_eq!(coordinator.connection_count().await?, if i < 3 { 1 } else { 0 });
    }

    assert_eq!(report_ids(&decode(&frames)), vec!["r1", "r2"]);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_failed_initial_send_removes_connection() -> TestResult {
    let (coordinator, handle) = start_empty().await?;
    coordinator.publish(new_report("r1", 1)).await?;

    let (sink, _frames) = RecordingSink::new(Some(1));
    let sub = coordinator.subscribe(sink).await?;
    assert!(!sub.snapshot_sent);
    assert_eq!(coordinator.connection_count().await?, 0);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_initial_snapshot_precedes_later_events() -> TestResult {
    let (coordinator, handle) = start_empty().await?;

    let (early, mut early_rx) = ChannelSink::new();
    let early_sub = coordinator.subscribe(early).await?;
    assert!(!early_sub.snapshot_sent);
    assert!(drain(&mut early_rx).is_empty());

    coordinator
        .publish(DomainEvent::NewComment(Comment::new("c1", "r9", "only a comment", 1)))
        .await?;

    let (late, mut late_rx) = ChannelSink::new();
    let late_sub = coordinator.subscribe(late).await?;
    assert!(late_sub.snapshot_sent);
    coordinator.publish(new_report("r2", 2)).await?;

    let messages = drain(&mut late_rx);
    let types: Vec<&str> = messages.iter().map(|m| m.type_name()).collect();
    assert_eq!(types, vec!["initial", "new"]);
    match &messages[0] {
        LiveMessage::Initial { reports, comments } => {
            assert!(reports.is_empty());
            assert_eq!(comments[&ReportId::from("r9")].len(), 1);
        }
        other => panic!("expected initial, got {}", other.type_name()),
    }

    let early_types: Vec<&str> = drain(&mut early_rx).iter().map(|m| m.type_name()).collect();
    assert_eq!(early_types, vec!["comment", "new"]);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_concurrent_publishes_arrive_in_the_same_order() -> TestResult {
    let (coordinator, handle) = start_empty().await?;

    let (a, mut a_rx) = ChannelSink::new();
    let (b, mut b_rx) = ChannelSink::new();
    coordinator.subscribe(a).await?;
    coordinator.subscribe(b).await?;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let coordinator = coordinator.clone();
        tasks.push(tokio::spawn(async move {
            coordinator.publish(new_report(&format!("r{i}"), i)).await
        }));
    }
    for task in tasks {
        task.await??;
    }

    let a_ids = report_ids(&drain(&mut a_rx));
    let b_ids = report_ids(&drain(&mut b_rx));
    assert_eq!(a_ids.len(), 20);
    assert_eq!(a_ids, b_ids);

    // The cache is newest-first in the same order the subscribers observed.
    let mut cached: Vec<String> = coordinator
        .recent_reports()
        .await?
        .iter()
        .map(|r| r.id.to_string())
        .collect();
    cached.reverse();
    assert_eq!(cached, a_ids);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_update_for_unknown_report_changes_nothing() -> TestResult {
    let (coordinator, handle) = start_empty().await?;
    coordinator.publish(new_report("r1", 1)).await?;
    let before = coordinator.snapshot().await?;

    let ghost = Report::new("ghost", Category::Sheep, 1.0, 1.0, 5);
    let report = coordinator.publish(DomainEvent::UpdatedReport(ghost)).await?;
    assert_eq!(report.change, CacheChange::ReportMissed);
    assert_eq!(coordinator.snapshot().await?, before);

    let edit = Report::new("r1", Category::Horse, 0.0, 0.0, 0)
        .with_count(4)
        .with_comment("two foals");
    let report = coordinator.publish(DomainEvent::UpdatedReport(edit)).await?;
    assert_eq!(report.change, CacheChange::ReportMerged);

    let cached = coordinator.recent_reports().await?;
    assert_eq!(cached[0].category, Category::Horse);
    assert_eq!(cached[0].count, 4);
    assert_eq!(cached[0].comment, "two foals");
    assert_eq!((cached[0].latitude, cached[0].longitude), (39.1, -94.5));

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_invalid_event_is_rejected_without_state_change() -> TestResult {
    let (coordinator, handle) = start_empty().await?;
    let (sink, mut rx) = ChannelSink::new();
    coordinator.subscribe(sink).await?;

    let bad = DomainEvent::NewReport(Report::new("bad", Category::Goat, 95.0, 0.0, 1));
    let result = coordinator.publish(bad).await;
    assert!(matches!(result, Err(CoordinatorError::InvalidEvent(_))));

    assert!(coordinator.recent_reports().await?.is_empty());
    assert!(drain(&mut rx).is_empty());
    assert_eq!(coordinator.connection_count().await?, 1);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_persistence_failure_still_broadcasts() -> TestResult {
    let (coordinator, handle) = start(Arc::new(FailingStore)).await?;
    let (sink, mut rx) = ChannelSink::new();
    coordinator.subscribe(sink).await?;

    let result = coordinator.publish(new_report("r1", 1)).await;
    match result {
        Err(CoordinatorError::Unpersisted { report, .. }) => {
            assert_eq!(report.kind, "new_report");
            assert_eq!(report.delivered, 1);
            assert!(report.dropped.is_empty());
        }
        other => panic!("expected Unpersisted, got {other:?}"),
    }

    assert_eq!(report_ids(&drain(&mut rx)), vec!["r1"]);
    assert_eq!(coordinator.recent_reports().await?.len(), 1);

    let shutdown = coordinator.shutdown().await;
    assert!(matches!(shutdown, Err(CoordinatorError::Persistence(_))));
    handle.await?;
    Ok(())
}

#[tokio::test]
async fn test_stalled_subscriber_does_not_block_the_coordinator() -> TestResult {
    let config = CoordinatorConfig {
        send_timeout_ms: 100,
        ..CoordinatorConfig::ephemeral()
    };
    let (coordinator, handle) =
        start_coordinator(&config, Arc::new(MemorySnapshotStore::new())).await?;
    let limit = Duration::from_secs(2);

    let stalled = coordinator.subscribe(StalledSink).await?;
    let (healthy, mut rx) = ChannelSink::new();
    coordinator.subscribe(healthy).await?;

    let report = timeout(limit, coordinator.publish(new_report("r1", 1))).await??;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.dropped, vec![stalled.id]);
    assert_eq!(report_ids(&drain(&mut rx)), vec!["r1"]);
    assert_eq!(timeout(limit, coordinator.connection_count()).await??, 1);

    // A stalled client joining a non-empty cache loses its initial snapshot.
    let late = timeout(limit, coordinator.subscribe(StalledSink)).await??;
    assert!(!late.snapshot_sent);
    assert_eq!(timeout(limit, coordinator.connection_count()).await??, 1);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() -> TestResult {
    let (coordinator, handle) = start_empty().await?;
    let (sink, _rx) = ChannelSink::new();
    let sub = coordinator.subscribe(sink).await?;
    assert_eq!(coordinator.connection_count().await?, 1);

    coordinator.unsubscribe(sub.id);
    coordinator.unsubscribe(sub.id);
    assert_eq!(coordinator.connection_count().await?, 0);

    let report = coordinator.publish(new_report("r1", 1)).await?;
    assert_eq!(report.delivered, 0);

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_restart_recovers_cache_from_memory_store() -> TestResult {
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());

    let (first, handle) = start(store.clone()).await?;
    first.publish(new_report("r1", 1)).await?;
    first
        .publish(DomainEvent::NewComment(Comment::new("c1", "r1", "still there", 2)))
        .await?;
    stop(first, handle).await?;

    let (second, handle) = start(store).await?;
    let reports = second.recent_reports().await?;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id.as_str(), "r1");
    assert_eq!(second.comments_for(ReportId::from("r1")).await?.len(), 1);

    stop(second, handle).await
}

#[tokio::test]
async fn test_restart_recovers_cache_from_file_store() -> TestResult {
    let dir = tempfile::tempdir()?;

    let file_store = FileSnapshotStore::new(dir.path());
    file_store.init().await?;
    let (first, handle) = start(Arc::new(file_store)).await?;
    first.publish(new_report("r1", 1)).await?;
    first.publish(new_report("r2", 2)).await?;
    stop(first, handle).await?;

    let (second, handle) = start(Arc::new(FileSnapshotStore::new(dir.path()))).await?;
    let ids: Vec<String> = second
        .recent_reports()
        .await?
        .iter()
        .map(|r| r.id.to_string())
        .collect();
    assert_eq!(ids, vec!["r2", "r1"]);

    stop(second, handle).await
}

#[tokio::test]
async fn test_malformed_snapshot_starts_empty() -> TestResult {
    let store = Arc::new(MemorySnapshotStore::new());
    store
        .put("live-cache", json!({"reports": "not a list"}))
        .await?;

    let (coordinator, handle) = start(store).await?;
    assert!(coordinator.recent_reports().await?.is_empty());

    stop(coordinator, handle).await
}

#[tokio::test]
async fn test_named_coordinator_can_be_looked_up() -> TestResult {
    let config = CoordinatorConfig {
        name: Some("lookup-test-coordinator".into()),
        ..CoordinatorConfig::ephemeral()
    };
    let (coordinator, handle) =
        start_coordinator(&config, Arc::new(MemorySnapshotStore::new())).await?;

    let found = Coordinator::lookup("lookup-test-coordinator").expect("registered");
    found.publish(new_report("r1", 1)).await?;
    assert_eq!(coordinator.recent_reports().await?.len(), 1);
    assert!(Coordinator::lookup("no-such-coordinator").is_none());

    stop(coordinator, handle).await?;
    assert!(matches!(
        found.recent_reports().await,
        Err(CoordinatorError::Unavailable)
    ));
    Ok(())
}
