use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::clients::ports::{ChatPlatform, EventPayload, RemoteFileStore};
use crate::models::cache::CacheManager;
use crate::service::checksum;
use crate::service::diff_engine::{DesiredEvent, DiffEngine};
use crate::service::raid_schedule::{self, RaidEvent};
use crate::service::sync_executor::{SyncExecutor, WriteIntent};

/// How many recent channel messages a poll scans for schedule lines.
const MESSAGE_SCAN_LIMIT: u8 = 100;

/// Keeps the raid schedule consistent across the schedule channel, the
/// cache, the canonical file on the remote store, and the event mirrors.
pub struct RaidService {
    chat: Arc<dyn ChatPlatform>,
    store: Arc<dyn RemoteFileStore>,
    executor: Arc<SyncExecutor>,
    cache: Arc<Mutex<CacheManager>>,
    mirrors: Vec<Arc<DiffEngine>>,
    channel_id: String,
    file_path: String,
}

impl RaidService {
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        store: Arc<dyn RemoteFileStore>,
        executor: Arc<SyncExecutor>,
        cache: Arc<Mutex<CacheManager>>,
        mirrors: Vec<Arc<DiffEngine>>,
        channel_id: String,
        file_path: String,
    ) -> Self {
        Self {
            chat,
            store,
            executor,
            cache,
            mirrors,
            channel_id,
            file_path,
        }
    }

    /// Scans the schedule channel and reconciles whatever it finds. The
    /// schedule may be split across several posts; every valid line from
    /// every recent post is combined.
    pub async fn poll(&self, now: DateTime<Utc>) {
        let messages = match self
            .chat
            .fetch_recent_messages(&self.channel_id, MESSAGE_SCAN_LIMIT)
            .await
        {
            Ok(messages) => messages,
            Err(err) => {
                error!("failed to fetch schedule channel: {err}");
                return;
            }
        };

        let contents: Vec<String> = messages.iter().map(|m| m.content.clone()).collect();
        let lines = raid_schedule::combine_schedule_messages(&contents);
        if lines.is_empty() {
            info!("no raid schedule found in the last {MESSAGE_SCAN_LIMIT} messages");
            return;
        }
        let combined = lines.join("\n");
        self.reconcile(&combined, now).await;
    }

    /// Event-driven entry point for a single new or edited message.
    pub async fn handle_message(&self, content: &str, now: DateTime<Utc>) {
        let lines = raid_schedule::extract_schedule_lines(content);
        if lines.is_empty() {
            return;
        }
        info!("found {} valid schedule lines in message", lines.len());
        self.reconcile(&lines.join("\n"), now).await;
    }

    async fn reconcile(&self, content: &str, now: DateTime<Utc>) {
        let (changed, prior) = {
            let cache = self.cache.lock().await;
            match cache.raid_schedule() {
                Some(entry) => (
                    checksum::content_changed(content, &entry.content),
                    entry.verification.clone(),
                ),
                None => (true, None),
            }
        };

        if changed {
            info!("raid schedule changed, updating cache and remote file");
            {
                let mut cache = self.cache.lock().await;
                cache.update_raid_schedule(content.to_string(), now.timestamp_millis());
                if let Err(err) = cache.save() {
                    error!("failed to persist cache: {err}");
                }
            }

            let outcomes = self
                .executor
                .process_batch(vec![WriteIntent {
                    path: self.file_path.clone(),
                    content: content.to_string(),
                    prior,
                }])
                .await;
            if let Some(outcome) = outcomes.into_iter().next() {
                let mut cache = self.cache.lock().await;
                cache.set_raid_verification(outcome.verification);
                if let Err(err) = cache.save() {
                    error!("failed to persist cache: {err}");
                }
            }
        } else {
            info!("raid schedule is up to date, checking mirrors for missing events");
        }

        self.sync_mirrors(content, now).await;
    }

    /// Pushes the schedule's events to every configured mirror.
    pub async fn sync_mirrors(&self, content: &str, now: DateTime<Utc>) {
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let events = raid_schedule::parse_raid_lines(&lines, now);
        if events.is_empty() {
            return;
        }
        let desired = desired_events(&events);
        for mirror in &self.mirrors {
            if let Err(err) = mirror.sync(&desired, Some(content), now).await {
                error!("raid mirror sync failed: {err}");
            }
        }
    }

    /// Mirror pass from cached state, for the periodic resync timer.
    pub async fn sync_mirrors_from_cache(&self, now: DateTime<Utc>) {
        let content = {
            let cache = self.cache.lock().await;
            cache.raid_schedule().map(|entry| entry.content.clone())
        };
        if let Some(content) = content {
            self.sync_mirrors(&content, now).await;
        }
    }

    /// Drift check: the canonical file on the remote store must match the
    /// cache (normalized); re-upload when it does not.
    pub async fn verify_remote(&self) {
        let content = {
            let cache = self.cache.lock().await;
            match cache.raid_schedule() {
                Some(entry) => entry.content.clone(),
                None => {
                    info!("no raid schedule in cache to verify");
                    return;
                }
            }
        };

        let remote = match self.store.get_file(&self.file_path).await {
            Ok(remote) => remote,
            Err(err) => {
                error!("failed to fetch {} for verification: {err}", self.file_path);
                return;
            }
        };
        let remote_content = remote.map(|f| f.content).unwrap_or_default();
        if !checksum::content_changed(&content, &remote_content) {
            info!("{} matches the cache", self.file_path);
            return;
        }

        info!("{} drifted from the cache, re-uploading", self.file_path);
        // No prior verification here: we just observed the divergence, so a
        // fresh cached success must not short-circuit the write.
        let outcomes = self
            .executor
            .process_batch(vec![WriteIntent {
                path: self.file_path.clone(),
                content,
                prior: None,
            }])
            .await;
        if let Some(outcome) = outcomes.into_iter().next() {
            let mut cache = self.cache.lock().await;
            cache.set_raid_verification(outcome.verification);
            if let Err(err) = cache.save() {
                error!("failed to persist cache: {err}");
            }
        }
    }
}

fn desired_events(events: &[RaidEvent]) -> Vec<DesiredEvent> {
    events
        .iter()
        .map(|event| DesiredEvent {
            payload: EventPayload {
                name: crate::service::schedule_file::raid_event_name(&event.targets),
                description: crate::service::schedule_file::raid_description(&event.targets),
                start: event.start,
                end: event.end,
                image: None,
            },
            source_line: Some(event.line.clone()),
        })
        .collect()
}
