use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use crate::clients::ports::ChatPlatform;
use crate::events::queue::Event;
use crate::models::cache::{CacheManager, CACHE_RETENTION_MS};
use crate::service::inventory_service::InventoryService;
use crate::service::offnight_service::OffnightService;
use crate::service::raid_service::RaidService;

/// Consumes the event bus. Everything runs on this one task, so two
/// reconciliations for the same resource can never race on a remote
/// revision token; queued duplicates are coalesced before each run.
pub struct EventWorker {
    pub raid: Arc<RaidService>,
    pub offnight: Arc<OffnightService>,
    pub inventory: Arc<InventoryService>,
    pub chat: Arc<dyn ChatPlatform>,
    pub cache: Arc<Mutex<CacheManager>>,
}

impl EventWorker {
    pub async fn run(self, mut rx: mpsc::Receiver<Event>) {
        let mut queue: Vec<Event> = Vec::new();
        while let Some(event) = rx.recv().await {
            queue.push(event);
            // Drain whatever else is already waiting before running.
            while let Ok(next) = rx.try_recv() {
                queue.push(next);
            }
            let batch = coalesce(std::mem::take(&mut queue));
            for event in batch {
                self.handle(event).await;
            }
        }
    }

    async fn handle(&self, event: Event) {
        let now = Utc::now();
        match event {
            Event::RaidPoll => self.raid.poll(now).await,
            Event::RaidMessage { content } => self.raid.handle_message(&content, now).await,
            Event::OffnightPoll => self.offnight.poll(now).await,
            Event::InventoryPoll => self.inventory.poll(now).await,
            Event::InventoryAttachment { file_name, url } => {
                match self.chat.download_attachment(&url).await {
                    Ok(bytes) => match String::from_utf8(bytes) {
                        Ok(content) => {
                            self.inventory.handle_attachment(&file_name, content, now).await
                        }
                        Err(_) => error!("{file_name} is not valid utf-8, skipping"),
                    },
                    Err(err) => error!("failed to download {file_name}: {err}"),
                }
            }
            Event::CoverImage { key, url, mime } => {
                match self.chat.download_attachment(&url).await {
                    Ok(bytes) => {
                        use base64::Engine;
                        let encoded =
                            base64::engine::general_purpose::STANDARD.encode(&bytes);
                        let entry = crate::models::cache::ImageEntry {
                            data: format!("data:{mime};base64,{encoded}"),
                            timestamp: now.timestamp_millis(),
                            size: bytes.len(),
                            mime_type: mime,
                        };
                        let mut cache = self.cache.lock().await;
                        cache.set_image(&key, entry);
                        if let Err(err) = cache.save() {
                            error!("failed to persist cache: {err}");
                        }
                    }
                    Err(err) => error!("failed to download cover image {key}: {err}"),
                }
            }
            Event::MirrorSync => {
                self.raid.sync_mirrors_from_cache(now).await;
                self.offnight.sync_mirrors_from_cache(now).await;
            }
            Event::RemoteDriftCheck => self.raid.verify_remote().await,
            Event::CacheCleanup => {
                let mut cache = self.cache.lock().await;
                let cleaned = cache.cleanup(now.timestamp_millis(), CACHE_RETENTION_MS);
                if cleaned > 0 {
                    if let Err(err) = cache.save() {
                        error!("failed to persist cache after cleanup: {err}");
                    }
                }
            }
        }
    }
}

fn coalesce(events: Vec<Event>) -> Vec<Event> {
    let mut batch: Vec<Event> = Vec::with_capacity(events.len());
    let mut dropped = 0;
    for event in events {
        if batch.iter().any(|kept| kept.coalesces_with(&event)) {
            dropped += 1;
            continue;
        }
        batch.push(event);
    }
    if dropped > 0 {
        info!("coalesced {dropped} duplicate triggers");
    }
    batch
}
