use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serenity::async_trait;
use tokio::sync::Mutex;

use guildSyncBot::clients::ports::{EventMirror, EventPayload, RemoteEvent};
use guildSyncBot::error::SyncError;
use guildSyncBot::service::diff_engine::{DesiredEvent, DiffEngine};
use guildSyncBot::service::rate_limit::{Clock, RatePacer};

struct MockClock {
    now: AtomicI64,
    sleeps: Mutex<Vec<u64>>,
}

impl MockClock {
    fn new() -> Self {
        Self {
            now: AtomicI64::new(1_000_000),
            sleeps: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep_ms(&self, ms: u64) {
        self.sleeps.lock().await.push(ms);
        self.now.fetch_add(ms as i64, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockMirror {
    events: Mutex<HashMap<String, RemoteEvent>>,
    next_id: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    // Scripted errors consumed by successive mutations.
    failures: Mutex<Vec<SyncError>>,
}

impl MockMirror {
    async fn seed(&self, name: &str, start: DateTime<Utc>, description: &str) -> String {
        let id = format!("seed-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.events.lock().await.insert(
            id.clone(),
            RemoteEvent {
                id: id.clone(),
                name: name.to_string(),
                description: description.to_string(),
                start,
                end: Some(start + Duration::hours(2)),
            },
        );
        id
    }

    async fn take_failure(&self) -> Option<SyncError> {
        let mut failures = self.failures.lock().await;
        if failures.is_empty() {
            None
        } else {
            Some(failures.remove(0))
        }
    }
}

#[async_trait]
impl EventMirror for MockMirror {
    async fn list_events(&self) -> Result<Vec<RemoteEvent>, SyncError> {
        Ok(self.events.lock().await.values().cloned().collect())
    }

    async fn insert_event(&self, event: &EventPayload) -> Result<(), SyncError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.events.lock().await.insert(
            id.clone(),
            RemoteEvent {
                id,
                name: event.name.clone(),
                description: event.description.clone(),
                start: event.start,
                end: Some(event.end),
            },
        );
        Ok(())
    }

    async fn update_event(&self, id: &str, event: &EventPayload) -> Result<(), SyncError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        if let Some(remote) = self.events.lock().await.get_mut(id) {
            remote.description = event.description.clone();
            remote.start = event.start;
            remote.end = Some(event.end);
        }
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> Result<(), SyncError> {
        if let Some(err) = self.take_failure().await {
            return Err(err);
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.events.lock().await.remove(id);
        Ok(())
    }
}

fn engine(mirror: Arc<MockMirror>, clock: Arc<MockClock>, protected: Vec<String>) -> DiffEngine {
    let pacer = Arc::new(RatePacer::new(0, clock.clone() as Arc<dyn Clock>));
    DiffEngine::new(mirror, pacer, clock, protected)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
}

fn desired(name: &str, start: DateTime<Utc>) -> DesiredEvent {
    DesiredEvent {
        payload: EventPayload {
            name: name.to_string(),
            description: format!("{name} description"),
            start,
            end: start + Duration::hours(2),
            image: None,
        },
        source_line: None,
    }
}

#[tokio::test]
async fn creates_unmatched_desired_events() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    let engine = engine(mirror.clone(), clock, Vec::new());

    let start = now() + Duration::days(3);
    let summary = engine
        .sync(&[desired("Static Group: Gems", start)], None, now())
        .await
        .unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(mirror.inserts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn matching_event_with_equal_fields_is_left_alone() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    let start = now() + Duration::days(3);
    let event = desired("Static Group: Gems", start);
    // Whitespace and case differences in the description do not count.
    mirror
        .seed("Static Group: Gems", start, "STATIC GROUP:  GEMS   description")
        .await;
    let engine = engine(mirror.clone(), clock, Vec::new());

    let summary = engine.sync(&[event], None, now()).await.unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(mirror.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn drifted_description_triggers_an_update() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    let start = now() + Duration::days(3);
    let id = mirror.seed("Static Group: Gems", start, "stale text").await;
    let engine = engine(mirror.clone(), clock, Vec::new());

    let summary = engine
        .sync(&[desired("Static Group: Gems", start)], None, now())
        .await
        .unwrap();

    assert_eq!(summary.updated, 1);
    let events = mirror.events.lock().await;
    assert_eq!(events[&id].description, "Static Group: Gems description");
}

#[tokio::test]
async fn start_within_tolerance_still_matches() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    let start = now() + Duration::days(3);
    mirror
        .seed(
            "Static Group: Gems",
            start + Duration::seconds(30),
            "Static Group: Gems description",
        )
        .await;
    let engine = engine(mirror.clone(), clock, Vec::new());

    let summary = engine
        .sync(&[desired("Static Group: Gems", start)], None, now())
        .await
        .unwrap();

    // Matched, but the 30s drift is a real start difference, so it updates.
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);
}

#[tokio::test]
async fn ambiguous_matches_create_instead_of_updating() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    let start = now() + Duration::days(3);
    mirror.seed("Static Group: Gems", start, "one").await;
    mirror
        .seed("Static Group: Gems", start + Duration::seconds(10), "two")
        .await;
    let engine = engine(mirror.clone(), clock, Vec::new());

    let summary = engine
        .sync(&[desired("Static Group: Gems", start)], None, now())
        .await
        .unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(mirror.updates.load(Ordering::SeqCst), 0);
    // The ambiguous pair was not matched, so both count as stale deletions.
    assert_eq!(summary.deleted, 2);
}

#[tokio::test]
async fn stale_future_events_are_deleted_once() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    mirror
        .seed("Static Group: Gone", now() + Duration::days(2), "left over")
        .await;
    let engine = engine(mirror.clone(), clock, Vec::new());

    let summary = engine.sync(&[], None, now()).await.unwrap();
    assert_eq!(summary.deleted, 1);

    // A second pass has nothing left to do.
    let summary = engine.sync(&[], None, now()).await.unwrap();
    assert_eq!(summary.deleted, 0);
    assert_eq!(mirror.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn protected_prefixes_survive_deletion() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    mirror
        .seed("Raid Night: Plane of Fear", now() + Duration::days(2), "raid")
        .await;
    mirror
        .seed("Static Group: Gone", now() + Duration::days(2), "left over")
        .await;
    let engine = engine(
        mirror.clone(),
        clock,
        vec!["Raid Night:".to_string()],
    );

    let summary = engine.sync(&[], None, now()).await.unwrap();

    assert_eq!(summary.deleted, 1);
    let events = mirror.events.lock().await;
    assert_eq!(events.len(), 1);
    assert!(events.values().any(|e| e.name.starts_with("Raid Night:")));
}

#[tokio::test]
async fn past_remote_events_are_never_touched() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    mirror
        .seed("Static Group: History", now() - Duration::days(2), "done")
        .await;
    let engine = engine(mirror.clone(), clock, Vec::new());

    let summary = engine.sync(&[], None, now()).await.unwrap();
    assert_eq!(summary.deleted, 0);
}

#[tokio::test]
async fn desired_event_missing_from_canonical_source_is_skipped() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    let engine = engine(mirror.clone(), clock, Vec::new());

    let mut event = desired("Static Group: Gems", now() + Duration::days(3));
    event.source_line = Some("Sunday 6/15 8:00 PM EST. Gems. Hosted by X".to_string());
    let summary = engine
        .sync(&[event], Some("a different file body\n"), now())
        .await
        .unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn rate_limits_back_off_and_then_fail_the_run() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    *mirror.failures.lock().await = vec![
        SyncError::RateLimited { retry_after_secs: 5 },
        SyncError::RateLimited { retry_after_secs: 5 },
        SyncError::RateLimited { retry_after_secs: 5 },
    ];
    let engine = engine(mirror.clone(), clock.clone(), Vec::new());

    let result = engine
        .sync(&[desired("Static Group: Gems", now() + Duration::days(3))], None, now())
        .await;

    assert!(matches!(result, Err(SyncError::Fatal(_))));
    let sleeps = clock.sleeps.lock().await;
    assert_eq!(*sleeps, vec![5_000, 10_000]);
}

#[tokio::test]
async fn non_rate_limit_errors_count_as_per_item_failures() {
    let mirror = Arc::new(MockMirror::default());
    let clock = Arc::new(MockClock::new());
    *mirror.failures.lock().await = vec![SyncError::Transient("500".to_string())];
    let engine = engine(mirror.clone(), clock, Vec::new());

    let summary = engine
        .sync(
            &[
                desired("Static Group: Gems", now() + Duration::days(3)),
                desired("Static Group: Spells", now() + Duration::days(4)),
            ],
            None,
            now(),
        )
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.created, 1);
}
