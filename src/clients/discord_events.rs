use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::async_trait;

use crate::clients::ports::{EventMirror, EventPayload, RemoteEvent};
use crate::error::SyncError;

const API_BASE: &str = "https://discord.com/api/v10";
const EXTERNAL_ENTITY: u8 = 3;
const GUILD_ONLY_PRIVACY: u8 = 2;

#[derive(Debug, Serialize)]
struct EntityMetadata {
    location: String,
}

#[derive(Debug, Serialize)]
struct ScheduledEventRequest {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    scheduled_start_time: String,
    scheduled_end_time: String,
    privacy_level: u8,
    entity_type: u8,
    entity_metadata: EntityMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScheduledEventItem {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    scheduled_start_time: String,
    #[serde(default)]
    scheduled_end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// Discord guild scheduled events over the raw REST surface. The gateway
/// client does its own rate-limit queueing, which would hide the 429
/// signal this mirror is required to surface, so the mirror talks HTTP
/// directly.
pub struct DiscordEventMirror {
    client: reqwest::Client,
    token: String,
    guild_id: String,
    location: String,
}

impl DiscordEventMirror {
    pub fn new(token: String, guild_id: String, location: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            guild_id,
            location,
        }
    }

    fn events_url(&self) -> String {
        format!("{API_BASE}/guilds/{}/scheduled-events", self.guild_id)
    }

    fn request_body(&self, event: &EventPayload) -> ScheduledEventRequest {
        ScheduledEventRequest {
            name: event.name.clone(),
            description: Some(event.description.clone()),
            scheduled_start_time: event.start.to_rfc3339(),
            scheduled_end_time: event.end.to_rfc3339(),
            privacy_level: GUILD_ONLY_PRIVACY,
            entity_type: EXTERNAL_ENTITY,
            entity_metadata: EntityMetadata {
                location: self.location.clone(),
            },
            image: event.image.clone(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            let retry_after = serde_json::from_str::<RateLimitBody>(&body)
                .map(|b| b.retry_after.ceil() as u64)
                .unwrap_or(5);
            return Err(SyncError::RateLimited {
                retry_after_secs: retry_after.max(1),
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(body));
        }
        if status.is_server_error() {
            return Err(SyncError::Transient(format!("discord returned {status}: {body}")));
        }
        Err(SyncError::Fatal(format!("discord returned {status}: {body}")))
    }
}

#[async_trait]
impl EventMirror for DiscordEventMirror {
    async fn list_events(&self) -> Result<Vec<RemoteEvent>, SyncError> {
        let response = self
            .client
            .get(self.events_url())
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("discord list failed: {e}")))?;
        let response = Self::check(response).await?;
        let items: Vec<ScheduledEventItem> = response
            .json()
            .await
            .map_err(|e| SyncError::Transient(format!("discord list body: {e}")))?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let start = parse_time(&item.scheduled_start_time)?;
                Some(RemoteEvent {
                    id: item.id,
                    name: item.name,
                    description: item.description.unwrap_or_default(),
                    start,
                    end: item.scheduled_end_time.as_deref().and_then(parse_time),
                })
            })
            .collect())
    }

    async fn insert_event(&self, event: &EventPayload) -> Result<(), SyncError> {
        let response = self
            .client
            .post(self.events_url())
            .header("Authorization", format!("Bot {}", self.token))
            .json(&self.request_body(event))
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("discord insert failed: {e}")))?;
        Self::check(response).await.map(|_| ())
    }

    async fn update_event(&self, id: &str, event: &EventPayload) -> Result<(), SyncError> {
        let response = self
            .client
            .patch(format!("{}/{id}", self.events_url()))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&self.request_body(event))
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("discord update failed: {e}")))?;
        Self::check(response).await.map(|_| ())
    }

    async fn delete_event(&self, id: &str) -> Result<(), SyncError> {
        let response = self
            .client
            .delete(format!("{}/{id}", self.events_url()))
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("discord delete failed: {e}")))?;
        Self::check(response).await.map(|_| ())
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
