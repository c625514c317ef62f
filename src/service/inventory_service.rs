use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::clients::ports::ChatPlatform;
use crate::models::cache::{CacheEntry, CacheManager, INVENTORY_FILES};
use crate::service::rate_limit::RatePacer;
use crate::service::sync_executor::{SyncExecutor, WriteIntent};

/// Where inventory files land in the remote repository.
const REMOTE_DIR: &str = "assets/data";

fn cache_key(file_name: &str) -> String {
    format!("inventory_{file_name}")
}

fn remote_path(file_name: &str) -> String {
    format!("{REMOTE_DIR}/{file_name}")
}

pub fn is_inventory_file(file_name: &str) -> bool {
    INVENTORY_FILES.contains(&file_name)
}

/// Caches inventory files posted as attachments and batch-syncs them to
/// the remote store. Channel notices are paced so a burst of uploads does
/// not turn into a burst of messages.
pub struct InventoryService {
    chat: Arc<dyn ChatPlatform>,
    executor: Arc<SyncExecutor>,
    cache: Arc<Mutex<CacheManager>>,
    notice_pacer: Arc<RatePacer>,
    channel_id: String,
}

impl InventoryService {
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        executor: Arc<SyncExecutor>,
        cache: Arc<Mutex<CacheManager>>,
        notice_pacer: Arc<RatePacer>,
        channel_id: String,
    ) -> Self {
        Self {
            chat,
            executor,
            cache,
            notice_pacer,
            channel_id,
        }
    }

    /// Event-driven entry point for a freshly posted attachment.
    pub async fn handle_attachment(&self, file_name: &str, content: String, now: DateTime<Utc>) {
        if !is_inventory_file(file_name) {
            info!("skipping non-inventory file: {file_name}");
            return;
        }

        let (is_new, prior) = {
            let cache = self.cache.lock().await;
            match cache.inventory_file(&cache_key(file_name)) {
                Some(entry) if entry.content == content => {
                    info!("{file_name} is already up to date");
                    return;
                }
                Some(entry) => (false, entry.verification.clone()),
                None => (true, None),
            }
        };

        let outcomes = self
            .executor
            .process_batch(vec![WriteIntent {
                path: remote_path(file_name),
                content,
                prior,
            }])
            .await;
        let Some(outcome) = outcomes.into_iter().next() else {
            return;
        };
        if !outcome.succeeded() {
            error!("failed to sync {file_name}");
        }

        {
            let mut cache = self.cache.lock().await;
            cache.update_inventory_file(
                &cache_key(file_name),
                CacheEntry {
                    content: outcome.content,
                    timestamp: now.timestamp_millis(),
                    verification: Some(outcome.verification),
                },
            );
            if let Err(err) = cache.save() {
                error!("failed to persist cache: {err}");
            }
        }

        if is_new {
            self.notice_pacer.pace().await;
            let notice =
                format!("New inventory file processed: `{file_name}`. The website will update shortly.");
            if let Err(err) = self.chat.send_message(&self.channel_id, &notice).await {
                error!("failed to send inventory notice: {err}");
            }
        }
    }

    /// Periodic batch sync of everything the cache holds.
    pub async fn poll(&self, now: DateTime<Utc>) {
        let intents: Vec<WriteIntent> = {
            let cache = self.cache.lock().await;
            INVENTORY_FILES
                .iter()
                .filter_map(|name| {
                    cache.inventory_file(&cache_key(name)).map(|entry| WriteIntent {
                        path: remote_path(name),
                        content: entry.content.clone(),
                        prior: entry.verification.clone(),
                    })
                })
                .collect()
        };
        if intents.is_empty() {
            return;
        }

        info!("syncing {} cached inventory files", intents.len());
        let outcomes = self.executor.process_batch(intents).await;
        let mut cache = self.cache.lock().await;
        for outcome in outcomes {
            let file_name = outcome.path.rsplit('/').next().unwrap_or(&outcome.path).to_string();
            if !outcome.succeeded() {
                error!("failed to sync {file_name}");
            }
            cache.update_inventory_file(
                &cache_key(&file_name),
                CacheEntry {
                    content: outcome.content,
                    timestamp: now.timestamp_millis(),
                    verification: Some(outcome.verification),
                },
            );
        }
        if let Err(err) = cache.save() {
            error!("failed to persist cache: {err}");
        }
    }
}
