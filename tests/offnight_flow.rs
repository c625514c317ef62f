use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serenity::async_trait;
use tokio::sync::Mutex;

use guildSyncBot::clients::ports::{
    ChatMessage, ChatPlatform, EventMirror, EventPayload, RemoteEvent, RemoteFile,
    RemoteFileStore, ThreadInfo,
};
use guildSyncBot::error::SyncError;
use guildSyncBot::models::cache::CacheManager;
use guildSyncBot::service::diff_engine::DiffEngine;
use guildSyncBot::service::offnight_service::OffnightService;
use guildSyncBot::service::rate_limit::{Clock, RatePacer, TokioClock};
use guildSyncBot::service::sync_executor::SyncExecutor;

const FILE_PATH: &str = "assets/data/offnight.txt";
const MANUAL_LINE: &str = "Saturday 7/19 7:00 PM EST. Fishing tournament";

struct FakeChat {
    threads: Vec<ThreadInfo>,
}

#[async_trait]
impl ChatPlatform for FakeChat {
    async fn fetch_recent_messages(
        &self,
        _channel_id: &str,
        _limit: u8,
    ) -> Result<Vec<ChatMessage>, SyncError> {
        Ok(Vec::new())
    }

    async fn fetch_active_threads(&self, _channel_id: &str) -> Result<Vec<ThreadInfo>, SyncError> {
        Ok(self.threads.clone())
    }

    async fn send_message(&self, _channel_id: &str, _text: &str) -> Result<(), SyncError> {
        Ok(())
    }

    async fn download_attachment(&self, _url: &str) -> Result<Vec<u8>, SyncError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeStore {
    files: Mutex<HashMap<String, RemoteFile>>,
    put_calls: AtomicUsize,
}

impl FakeStore {
    async fn seed(&self, path: &str, content: &str) {
        self.files.lock().await.insert(
            path.to_string(),
            RemoteFile {
                content: content.to_string(),
                revision: "rev-0".to_string(),
            },
        );
    }

    async fn content(&self, path: &str) -> String {
        self.files.lock().await[path].content.clone()
    }
}

#[async_trait]
impl RemoteFileStore for FakeStore {
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, SyncError> {
        Ok(self.files.lock().await.get(path).cloned())
    }

    async fn put_file(
        &self,
        path: &str,
        content: &str,
        _revision: Option<&str>,
    ) -> Result<(), SyncError> {
        let calls = self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.files.lock().await.insert(
            path.to_string(),
            RemoteFile {
                content: content.to_string(),
                revision: format!("rev-{}", calls + 1),
            },
        );
        Ok(())
    }
}

#[derive(Default)]
struct CountingMirror {
    inserts: AtomicUsize,
    names: Mutex<Vec<String>>,
}

#[async_trait]
impl EventMirror for CountingMirror {
    async fn list_events(&self) -> Result<Vec<RemoteEvent>, SyncError> {
        Ok(Vec::new())
    }

    async fn insert_event(&self, event: &EventPayload) -> Result<(), SyncError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.names.lock().await.push(event.name.clone());
        Ok(())
    }

    async fn update_event(&self, _id: &str, _event: &EventPayload) -> Result<(), SyncError> {
        Ok(())
    }

    async fn delete_event(&self, _id: &str) -> Result<(), SyncError> {
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    // Tuesday 2025-06-10.
    Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0).unwrap()
}

struct Harness {
    store: Arc<FakeStore>,
    mirror: Arc<CountingMirror>,
    service: OffnightService,
    cache: Arc<Mutex<CacheManager>>,
    _dir: tempfile::TempDir,
}

fn harness(thread_titles: &[&str]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.json").to_string_lossy().to_string();
    let cache = Arc::new(Mutex::new(CacheManager::load(&cache_path)));

    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let store = Arc::new(FakeStore::default());
    let executor = Arc::new(SyncExecutor::new(
        store.clone(),
        clock.clone(),
        Arc::new(RatePacer::new(0, clock.clone())),
    ));
    let mirror = Arc::new(CountingMirror::default());
    let engine = Arc::new(DiffEngine::new(
        mirror.clone(),
        Arc::new(RatePacer::new(0, clock.clone())),
        clock,
        Vec::new(),
    ));

    let threads = thread_titles
        .iter()
        .enumerate()
        .map(|(i, title)| ThreadInfo {
            id: format!("thread-{i}"),
            name: title.to_string(),
            created_at: now(),
            creator: Some("Keeper".to_string()),
        })
        .collect();
    let chat = Arc::new(FakeChat { threads });

    let service = OffnightService::new(
        chat,
        store.clone(),
        executor,
        cache.clone(),
        vec![engine],
        "offnight-forum".to_string(),
        FILE_PATH.to_string(),
    );
    Harness {
        store,
        mirror,
        service,
        cache,
        _dir: dir,
    }
}

#[tokio::test]
async fn poll_writes_generated_lines_and_preserves_manual_ones() {
    let h = harness(&["Sundays 8pm ET Static Group - hosted by Vanidor"]);
    h.store.seed(FILE_PATH, &format!("{MANUAL_LINE}\n")).await;

    h.service.poll(now()).await;

    let content = h.store.content(FILE_PATH).await;
    // Four weekly occurrences starting the coming Sunday.
    assert!(content.contains("Sunday 6/15 8:00 PM EST. Static Group. Hosted by Vanidor"));
    assert!(content.contains("Sunday 6/22 8:00 PM EST. Static Group. Hosted by Vanidor"));
    assert!(content.contains("Sunday 6/29 8:00 PM EST. Static Group. Hosted by Vanidor"));
    assert!(content.contains("Sunday 7/6 8:00 PM EST. Static Group. Hosted by Vanidor"));
    assert!(content.contains(MANUAL_LINE));

    let cache = h.cache.lock().await;
    let entry = cache.offnight_schedule().unwrap();
    assert_eq!(entry.manual_entries, vec![MANUAL_LINE.to_string()]);
    assert!(entry.thread_ids.contains_key("thread-0"));
    assert!(entry.entry.verification.as_ref().unwrap().is_success());
}

#[tokio::test]
async fn poll_pushes_every_file_event_to_the_mirror() {
    let h = harness(&["Sundays 8pm ET Static Group - hosted by Vanidor"]);
    h.store.seed(FILE_PATH, &format!("{MANUAL_LINE}\n")).await;

    h.service.poll(now()).await;

    // Four generated occurrences plus the manual line.
    assert_eq!(h.mirror.inserts.load(Ordering::SeqCst), 5);
    let names = h.mirror.names.lock().await;
    assert!(names.iter().any(|n| n == "Static Group: Static Group"));
    assert!(names.iter().any(|n| n == "Static Group: Fishing tournament"));
}

#[tokio::test]
async fn second_poll_is_idempotent() {
    let h = harness(&["Sundays 8pm ET Static Group - hosted by Vanidor"]);
    h.store.seed(FILE_PATH, "").await;

    h.service.poll(now()).await;
    let writes_after_first = h.store.put_calls.load(Ordering::SeqCst);
    assert_eq!(writes_after_first, 1);

    h.service.poll(now()).await;
    assert_eq!(h.store.put_calls.load(Ordering::SeqCst), writes_after_first);
}

#[tokio::test]
async fn unparseable_titles_are_rejected_without_stopping_the_rest() {
    let h = harness(&[
        "General chat about nothing",
        "Sundays 8pm ET Static Group - hosted by Vanidor",
    ]);
    h.store.seed(FILE_PATH, "").await;

    h.service.poll(now()).await;

    let content = h.store.content(FILE_PATH).await;
    assert!(content.contains("Static Group"));
    let cache = h.cache.lock().await;
    let entry = cache.offnight_schedule().unwrap();
    assert_eq!(entry.thread_ids.len(), 1);
}

#[tokio::test]
async fn cleanup_drops_past_generated_lines_only() {
    let h = harness(&[]);
    let past_generated = "Sunday 6/1 8:00 PM EST. Static Group. Hosted by Vanidor";
    let past_manual = "Sunday 6/1 7:00 PM EST. Fishing tournament";
    let future_generated = "Sunday 6/15 8:00 PM EST. Static Group. Hosted by Vanidor";
    h.store
        .seed(
            FILE_PATH,
            &format!("{past_generated}\n{past_manual}\n{future_generated}\n"),
        )
        .await;

    let (removed, preserved) = h.service.cleanup_past(now()).await;

    assert_eq!(removed, 1);
    assert_eq!(preserved, 2);
    let content = h.store.content(FILE_PATH).await;
    assert!(!content.contains(past_generated));
    assert!(content.contains(past_manual));
    assert!(content.contains(future_generated));
}
