use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::SyncError;

/// The only inventory files the bot manages; anything else found in the
/// cache is evicted during cleanup.
pub const INVENTORY_FILES: [&str; 3] = [
    "Fggems-Inventory.txt",
    "Fsbank-Inventory.txt",
    "Fgspells-Inventory.txt",
];

/// Entries older than this are evicted by the periodic cleanup.
pub const CACHE_RETENTION_MS: i64 = 30 * 24 * 60 * 60 * 1000;

// Returns the snapshot file path. Defaults to a relative ./data directory.
pub fn get_cache_location() -> String {
    env::var("CACHE_LOCATION").unwrap_or("./data/content-cache.json".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub checksum: String,
    pub last_verified: i64,
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Verification {
    pub fn is_success(&self) -> bool {
        self.status == VerificationStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub content: String,
    /// Epoch ms of the last known-good observation.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl CacheEntry {
    /// A failed verification is retained for observability but never counts
    /// as a hit for skip decisions.
    pub fn verified_content(&self) -> Option<&str> {
        match &self.verification {
            Some(v) if v.is_success() => Some(&self.content),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRecord {
    pub last_updated: i64,
    /// ISO dates of the occurrences generated from this thread.
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffnightEntry {
    #[serde(flatten)]
    pub entry: CacheEntry,
    pub thread_ids: HashMap<String, ThreadRecord>,
    /// Manually-authored lines preserved verbatim through rewrites.
    pub manual_entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    /// data: URI for an event cover image.
    pub data: String,
    pub timestamp: i64,
    pub size: usize,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCache {
    pub raid_schedule: Option<CacheEntry>,
    pub offnight_schedule: Option<OffnightEntry>,
    #[serde(default)]
    pub inventory_files: HashMap<String, CacheEntry>,
    #[serde(default)]
    pub image_data: HashMap<String, ImageEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Raid,
    Offnight,
}

/// Durable store of last-known content and verification metadata per
/// logical resource. The single JSON snapshot is rewritten atomically after
/// every confirmed mutation; it is only ever cleared by operator action.
pub struct CacheManager {
    cache: ContentCache,
    path: PathBuf,
}

impl CacheManager {
    /// Loads the snapshot from disk. A missing, empty, or corrupt file
    /// yields a fresh cache rather than an error.
    pub fn load(path: &str) -> Self {
        let cache = match fs::read_to_string(path) {
            Ok(data) if data.trim().is_empty() => {
                info!("cache file is empty, initializing a new cache");
                ContentCache::default()
            }
            Ok(data) => match serde_json::from_str(&data) {
                Ok(cache) => {
                    info!("cache loaded from {}", path);
                    cache
                }
                Err(err) => {
                    error!("failed to parse cache file: {err}; initializing a new cache");
                    ContentCache::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("no existing cache file, initializing a new cache");
                ContentCache::default()
            }
            Err(err) => {
                error!("error reading cache file: {err}; initializing a new cache");
                ContentCache::default()
            }
        };
        Self {
            cache,
            path: PathBuf::from(path),
        }
    }

    /// Writes the whole snapshot atomically: serialize to a temp file next
    /// to the target, then rename over it.
    pub fn save(&self) -> Result<(), SyncError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4()));
        let data = serde_json::to_string_pretty(&self.cache)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn raid_schedule(&self) -> Option<&CacheEntry> {
        self.cache.raid_schedule.as_ref()
    }

    pub fn update_raid_schedule(&mut self, content: String, timestamp: i64) {
        self.cache.raid_schedule = Some(CacheEntry {
            content,
            timestamp,
            verification: None,
        });
    }

    pub fn set_raid_verification(&mut self, verification: Verification) {
        if let Some(entry) = self.cache.raid_schedule.as_mut() {
            entry.verification = Some(verification);
        }
    }

    pub fn offnight_schedule(&self) -> Option<&OffnightEntry> {
        self.cache.offnight_schedule.as_ref()
    }

    pub fn update_offnight_schedule(
        &mut self,
        content: String,
        timestamp: i64,
        thread_ids: HashMap<String, ThreadRecord>,
        manual_entries: Vec<String>,
        verification: Option<Verification>,
    ) {
        self.cache.offnight_schedule = Some(OffnightEntry {
            entry: CacheEntry {
                content,
                timestamp,
                verification,
            },
            thread_ids,
            manual_entries,
        });
    }

    pub fn set_offnight_verification(&mut self, verification: Verification) {
        if let Some(entry) = self.cache.offnight_schedule.as_mut() {
            entry.entry.verification = Some(verification);
        }
    }

    pub fn inventory_file(&self, key: &str) -> Option<&CacheEntry> {
        self.cache.inventory_files.get(key)
    }

    pub fn inventory_keys(&self) -> Vec<String> {
        self.cache.inventory_files.keys().cloned().collect()
    }

    pub fn update_inventory_file(&mut self, key: &str, entry: CacheEntry) {
        self.cache.inventory_files.insert(key.to_string(), entry);
    }

    pub fn image(&self, key: &str) -> Option<&ImageEntry> {
        self.cache.image_data.get(key)
    }

    pub fn set_image(&mut self, key: &str, entry: ImageEntry) {
        self.cache.image_data.insert(key.to_string(), entry);
    }

    /// True when the resource has no prior state, which makes callers
    /// conservative about overwriting manually-authored content right after
    /// an operator-triggered reset.
    pub fn was_just_created(&self, class: ResourceClass) -> bool {
        match class {
            ResourceClass::Raid => self.cache.raid_schedule.is_none(),
            ResourceClass::Offnight => self.cache.offnight_schedule.is_none(),
        }
    }

    /// Operator-triggered reset. Internal failure paths never call this.
    pub fn clear(&mut self, class: ResourceClass) {
        match class {
            ResourceClass::Raid => self.cache.raid_schedule = None,
            ResourceClass::Offnight => self.cache.offnight_schedule = None,
        }
        info!("cleared {:?} cache entry", class);
    }

    /// Evicts entries older than the retention window and any inventory
    /// keys outside the known resource set. Returns the eviction count.
    pub fn cleanup(&mut self, now_ms: i64, retention_ms: i64) -> usize {
        let mut cleaned = 0;

        let known = |key: &str| INVENTORY_FILES.iter().any(|name| key.ends_with(name));
        let before = self.cache.inventory_files.len();
        self.cache
            .inventory_files
            .retain(|key, entry| known(key) && now_ms - entry.timestamp <= retention_ms);
        cleaned += before - self.cache.inventory_files.len();

        let before = self.cache.image_data.len();
        self.cache
            .image_data
            .retain(|_, entry| now_ms - entry.timestamp <= retention_ms);
        cleaned += before - self.cache.image_data.len();

        if let Some(entry) = &self.cache.raid_schedule {
            if now_ms - entry.timestamp > retention_ms {
                self.cache.raid_schedule = None;
                cleaned += 1;
            }
        }
        if let Some(entry) = &self.cache.offnight_schedule {
            if now_ms - entry.entry.timestamp > retention_ms {
                self.cache.offnight_schedule = None;
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            info!("cleaned up {cleaned} old cache entries");
        }
        cleaned
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.path
    }
}

pub fn warn_if_unwritable(path: &str) {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            warn!("cache directory {} does not exist yet; it will be created on first save", dir.display());
        }
    }
}
