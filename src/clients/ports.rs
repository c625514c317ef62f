use chrono::{DateTime, Utc};
use serenity::async_trait;

use crate::error::SyncError;

/// A chat message from the schedule channel.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

/// Metadata for an active forum thread.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub creator: Option<String>,
}

/// A file fetched from the remote store, with the revision token required
/// to write it back without clobbering a concurrent edit.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: String,
    pub revision: String,
}

/// An event as the mirror currently holds it.
#[derive(Debug, Clone)]
pub struct RemoteEvent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// The event shape we push to a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPayload {
    pub name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Optional cover image as a data: URI.
    pub image: Option<String>,
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, SyncError>;

    async fn fetch_active_threads(&self, channel_id: &str) -> Result<Vec<ThreadInfo>, SyncError>;

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), SyncError>;

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, SyncError>;
}

#[async_trait]
pub trait RemoteFileStore: Send + Sync {
    /// `Ok(None)` means the file does not exist yet; that is a create, not
    /// an error.
    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>, SyncError>;

    async fn put_file(
        &self,
        path: &str,
        content: &str,
        revision: Option<&str>,
    ) -> Result<(), SyncError>;
}

/// CRUD over a downstream event mirror. The calendar and the Discord
/// scheduled-event surface share this shape; only the transport differs.
/// Implementations surface rate limiting as `SyncError::RateLimited`.
#[async_trait]
pub trait EventMirror: Send + Sync {
    async fn list_events(&self) -> Result<Vec<RemoteEvent>, SyncError>;

    async fn insert_event(&self, event: &EventPayload) -> Result<(), SyncError>;

    async fn update_event(&self, id: &str, event: &EventPayload) -> Result<(), SyncError>;

    async fn delete_event(&self, id: &str) -> Result<(), SyncError>;
}
