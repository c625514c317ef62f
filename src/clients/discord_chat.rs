use std::sync::Arc;

use chrono::{DateTime, Utc};
use serenity::async_trait;
use serenity::builder::GetMessages;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId};

use crate::clients::ports::{Attachment, ChatMessage, ChatPlatform, ThreadInfo};
use crate::error::SyncError;

/// Chat access over the serenity HTTP client. Thread listings come from the
/// guild's active-thread index filtered down to the requested forum channel;
/// archived threads are deliberately ignored.
pub struct DiscordChatPlatform {
    http: Arc<Http>,
    guild_id: GuildId,
    downloader: reqwest::Client,
}

impl DiscordChatPlatform {
    pub fn new(http: Arc<Http>, guild_id: u64) -> Self {
        Self {
            http,
            guild_id: GuildId::new(guild_id),
            downloader: reqwest::Client::new(),
        }
    }
}

fn parse_channel(channel_id: &str) -> Result<ChannelId, SyncError> {
    channel_id
        .parse::<u64>()
        .map(ChannelId::new)
        .map_err(|_| SyncError::Fatal(format!("invalid channel id: {channel_id}")))
}

#[async_trait]
impl ChatPlatform for DiscordChatPlatform {
    async fn fetch_recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, SyncError> {
        let channel = parse_channel(channel_id)?;
        let messages = channel
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|e| SyncError::Transient(format!("failed to fetch messages: {e}")))?;

        Ok(messages
            .into_iter()
            .map(|message| ChatMessage {
                id: message.id.to_string(),
                content: message.content.clone(),
                author: message.author.name.clone(),
                timestamp: DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0)
                    .unwrap_or_else(Utc::now),
                attachments: message
                    .attachments
                    .iter()
                    .map(|a| Attachment {
                        filename: a.filename.clone(),
                        url: a.url.clone(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn fetch_active_threads(&self, channel_id: &str) -> Result<Vec<ThreadInfo>, SyncError> {
        let parent = parse_channel(channel_id)?;
        let data = self
            .guild_id
            .get_active_threads(&self.http)
            .await
            .map_err(|e| SyncError::Transient(format!("failed to fetch threads: {e}")))?;

        Ok(data
            .threads
            .into_iter()
            .filter(|thread| thread.parent_id == Some(parent))
            .map(|thread| ThreadInfo {
                id: thread.id.to_string(),
                created_at: DateTime::from_timestamp(thread.id.created_at().unix_timestamp(), 0)
                    .unwrap_or_else(Utc::now),
                creator: thread.owner_id.map(|id| id.to_string()),
                name: thread.name,
            })
            .collect())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), SyncError> {
        let channel = parse_channel(channel_id)?;
        channel
            .say(&self.http, text)
            .await
            .map_err(|e| SyncError::Transient(format!("failed to send message: {e}")))?;
        Ok(())
    }

    async fn download_attachment(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let response = self
            .downloader
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("attachment download failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SyncError::Transient(format!(
                "attachment download returned {}",
                response.status()
            )));
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| SyncError::Transient(format!("attachment body read failed: {e}")))
    }
}
