use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::clients::ports::{ChatPlatform, EventPayload, RemoteFileStore};
use crate::models::cache::{CacheManager, ResourceClass, ThreadRecord};
use crate::models::event::{EventOrigin, ParsedEvent};
use crate::service::checksum;
use crate::service::diff_engine::{DesiredEvent, DiffEngine};
use crate::service::recurrence::{self, DEFAULT_OCCURRENCES};
use crate::service::schedule_file::{self, OFFNIGHT_DURATION_HOURS};
use crate::service::sync_executor::{SyncExecutor, WriteIntent};
use crate::service::thread_parser;

/// Turns offnight forum threads into the canonical offnight file and keeps
/// the downstream mirrors in step with it. Manually-authored lines in the
/// file are preserved verbatim through every rewrite.
pub struct OffnightService {
    chat: Arc<dyn ChatPlatform>,
    store: Arc<dyn RemoteFileStore>,
    executor: Arc<SyncExecutor>,
    cache: Arc<Mutex<CacheManager>>,
    mirrors: Vec<Arc<DiffEngine>>,
    channel_id: String,
    file_path: String,
}

impl OffnightService {
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

    pub async fn poll(&self, now: DateTime<Utc>) {
        {
            let cache = self.cache.lock().await;
            if cache.was_just_created(ResourceClass::Offnight) {
                info!("offnight cache has no prior state, existing manual entries will be preserved");
            }
        }

        let threads = match self.chat.fetch_active_threads(&self.channel_id).await {
            Ok(threads) => threads,
            Err(err) => {
                error!("failed to fetch offnight threads: {err}");
                return;
            }
        };
        info!("found {} active threads in the offnight channel", threads.len());

        let today = now.date_naive();
        let mut events: Vec<ParsedEvent> = Vec::new();
        let mut thread_ids: HashMap<String, ThreadRecord> = HashMap::new();
        let mut rejected = 0;
        for thread in &threads {
            let origin = EventOrigin {
                thread_id: Some(thread.id.clone()),
                thread_created_at: Some(thread.created_at),
                creator: thread.creator.clone(),
            };
            let Some(parsed) = thread_parser::parse_thread_title(&thread.name, now, origin) else {
                rejected += 1;
                continue;
            };
            let occurrences: Vec<ParsedEvent> =
                recurrence::expand(&parsed, DEFAULT_OCCURRENCES, today)
                    .into_iter()
                    .filter(|event| event.date >= today)
                    .collect();
            thread_ids.insert(
                thread.id.clone(),
                ThreadRecord {
                    last_updated: now.timestamp_millis(),
                    dates: occurrences.iter().map(|e| e.date.to_string()).collect(),
                },
            );
            events.extend(occurrences);
        }
        info!(
            "parsed {} offnight events from {} threads ({rejected} titles rejected)",
            events.len(),
            threads.len()
        );
        if events.is_empty() {
            return;
        }

        let existing = match self.store.get_file(&self.file_path).await {
            Ok(file) => file.map(|f| f.content).unwrap_or_default(),
            Err(err) => {
                error!("failed to read {}: {err}", self.file_path);
                return;
            }
        };

        // Manual lines are whatever the bot did not write, now or before.
        let current_lines: Vec<String> = events.iter().map(schedule_file::format_offnight_line).collect();
        let (previously_generated, prior) = {
            let cache = self.cache.lock().await;
            match cache.offnight_schedule() {
                Some(entry) => {
                    let manual = &entry.manual_entries;
                    let generated: Vec<String> = entry
                        .entry
                        .content
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .filter(|line| !manual.iter().any(|m| m == line))
                        .map(str::to_string)
                        .collect();
                    (generated, entry.entry.verification.clone())
                }
                None => (Vec::new(), None),
            }
        };
        let manual_entries =
            schedule_file::extract_manual_entries(&existing, &current_lines, &previously_generated);
        if !manual_entries.is_empty() {
            info!("preserving {} manual entries", manual_entries.len());
        }

        let new_content = schedule_file::generate_offnight_content(&events, &manual_entries);

        if checksum::content_changed(&new_content, &existing) {
            info!("offnight schedule changed, updating cache and remote file");
            {
                let mut cache = self.cache.lock().await;
                cache.update_offnight_schedule(
                    new_content.clone(),
                    now.timestamp_millis(),
                    thread_ids,
                    manual_entries.clone(),
                    None,
                );
                if let Err(err) = cache.save() {
                    error!("failed to persist cache: {err}");
                }
            }
            let outcomes = self
                .executor
                .process_batch(vec![WriteIntent {
                    path: self.file_path.clone(),
                    content: new_content.clone(),
                    prior,
                }])
                .await;
            if let Some(outcome) = outcomes.into_iter().next() {
                let mut cache = self.cache.lock().await;
                cache.set_offnight_verification(outcome.verification);
                if let Err(err) = cache.save() {
                    error!("failed to persist cache: {err}");
                }
            }
        } else {
            info!("no changes to the offnight schedule");
        }

        self.sync_mirrors(&new_content, now).await;
    }

    /// Pushes the file's events to every configured mirror.
    pub async fn sync_mirrors(&self, content: &str, now: DateTime<Utc>) {
        let desired = self.desired_events(content, now).await;
        if desired.is_empty() {
            return;
        }
        for mirror in &self.mirrors {
            if let Err(err) = mirror.sync(&desired, Some(content), now).await {
                error!("offnight mirror sync failed: {err}");
            }
        }
    }

    pub async fn sync_mirrors_from_cache(&self, now: DateTime<Utc>) {
        let content = {
            let cache = self.cache.lock().await;
            cache.offnight_schedule().map(|entry| entry.entry.content.clone())
        };
        if let Some(content) = content {
            self.sync_mirrors(&content, now).await;
        }
    }

    async fn desired_events(&self, content: &str, now: DateTime<Utc>) -> Vec<DesiredEvent> {
        let parsed = schedule_file::parse_offnight_content(content, now.date_naive());
        let cache = self.cache.lock().await;
        parsed
            .into_iter()
            .map(|event| {
                let image = cache
                    .image(&event.title.to_lowercase())
                    .map(|entry| entry.data.clone());
                DesiredEvent {
                    payload: EventPayload {
                        name: schedule_file::offnight_event_name(&event.title),
                        description: schedule_file::offnight_description(
                            &event.title,
                            event.host.as_deref(),
                        ),
                        start: event.start,
                        end: schedule_file::end_of(event.start, OFFNIGHT_DURATION_HOURS),
                        image,
                    },
                    source_line: Some(event.line.clone()),
                }
            })
            .collect()
    }

    /// Drops past bot-generated lines from the canonical file. Manual lines
    /// always survive. Returns (removed, preserved).
    pub async fn cleanup_past(&self, now: DateTime<Utc>) -> (usize, usize) {
        let existing = match self.store.get_file(&self.file_path).await {
            Ok(Some(file)) => file.content,
            Ok(None) => {
                info!("{} does not exist, nothing to clean up", self.file_path);
                return (0, 0);
            }
            Err(err) => {
                error!("failed to read {}: {err}", self.file_path);
                return (0, 0);
            }
        };

        let (kept, removed) = schedule_file::cleanup_past_lines(&existing, now.date_naive());
        let preserved = kept.lines().filter(|l| !l.trim().is_empty()).count();
        if removed == 0 {
            info!("no past events to remove from {}", self.file_path);
            return (0, preserved);
        }

        let prior = {
            let cache = self.cache.lock().await;
            cache
                .offnight_schedule()
                .and_then(|entry| entry.entry.verification.clone())
        };
        let outcomes = self
            .executor
            .process_batch(vec![WriteIntent {
                path: self.file_path.clone(),
                content: kept.clone(),
                prior,
            }])
            .await;
        if let Some(outcome) = outcomes.into_iter().next() {
            if outcome.succeeded() {
                let mut cache = self.cache.lock().await;
                let (thread_ids, manual) = match cache.offnight_schedule() {
                    Some(entry) => (entry.thread_ids.clone(), entry.manual_entries.clone()),
                    None => (HashMap::new(), Vec::new()),
                };
                cache.update_offnight_schedule(
                    kept,
                    now.timestamp_millis(),
                    thread_ids,
                    manual,
                    Some(outcome.verification),
                );
                if let Err(err) = cache.save() {
                    error!("failed to persist cache: {err}");
                }
            }
        }
        info!("cleanup removed {removed} past events, preserved {preserved} lines");
        (removed, preserved)
    }
}
