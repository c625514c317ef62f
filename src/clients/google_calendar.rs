use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serenity::async_trait;

use crate::clients::ports::{EventMirror, EventPayload, RemoteEvent};
use crate::error::SyncError;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// How far ahead the mirror window reaches when listing events.
const WINDOW_DAYS: i64 = 365;

#[derive(Debug, Serialize, Deserialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReminderOverride {
    method: &'static str,
    minutes: u32,
}

#[derive(Debug, Serialize)]
struct Reminders {
    #[serde(rename = "useDefault")]
    use_default: bool,
    overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Serialize)]
struct CalendarEventRequest {
    summary: String,
    description: String,
    start: EventTime,
    end: EventTime,
    reminders: Reminders,
}

#[derive(Debug, Deserialize)]
struct CalendarEventItem {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
struct ListEventsResponse {
    #[serde(default)]
    items: Vec<CalendarEventItem>,
}

/// Google Calendar mirror over the REST v3 events API.
pub struct GoogleCalendarMirror {
    client: reqwest::Client,
    token: String,
    calendar_id: String,
}

impl GoogleCalendarMirror {
    pub fn new(token: String, calendar_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            calendar_id,
        }
    }

    fn events_url(&self) -> String {
        format!("{API_BASE}/calendars/{}/events", self.calendar_id)
    }

    fn request_body(event: &EventPayload) -> CalendarEventRequest {
        CalendarEventRequest {
            summary: event.name.clone(),
            description: event.description.clone(),
            start: EventTime {
                date_time: event.start.to_rfc3339(),
                time_zone: Some("America/New_York".to_string()),
            },
            end: EventTime {
                date_time: event.end.to_rfc3339(),
                time_zone: Some("America/New_York".to_string()),
            },
            reminders: Reminders {
                use_default: false,
                overrides: vec![ReminderOverride {
                    method: "popup",
                    minutes: 30,
                }],
            },
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            Err(SyncError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(5),
            })
        } else if status.is_server_error() {
            Err(SyncError::Transient(format!("calendar returned {status}: {body}")))
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(SyncError::NotFound(body))
        } else {
            Err(SyncError::Fatal(format!("calendar returned {status}: {body}")))
        }
    }
}

#[async_trait]
impl EventMirror for GoogleCalendarMirror {
    async fn list_events(&self) -> Result<Vec<RemoteEvent>, SyncError> {
        let now = Utc::now();
        let time_max = now + Duration::days(WINDOW_DAYS);
        let response = self
            .client
            .get(self.events_url())
            .bearer_auth(&self.token)
            .query(&[
                ("timeMin", now.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("calendar list failed: {e}")))?;
        let response = Self::check(response).await?;
        let parsed: ListEventsResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Transient(format!("calendar list body: {e}")))?;

        Ok(parsed
            .items
            .into_iter()
            .filter_map(|item| {
                let start = parse_time(item.start.as_ref())?;
                Some(RemoteEvent {
                    id: item.id,
                    name: item.summary.unwrap_or_else(|| "Untitled Event".to_string()),
                    description: item.description.unwrap_or_default(),
                    start,
                    end: parse_time(item.end.as_ref()),
                })
            })
            .collect())
    }

    async fn insert_event(&self, event: &EventPayload) -> Result<(), SyncError> {
        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(&self.token)
            .json(&Self::request_body(event))
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("calendar insert failed: {e}")))?;
        Self::check(response).await.map(|_| ())
    }

    async fn update_event(&self, id: &str, event: &EventPayload) -> Result<(), SyncError> {
        let response = self
            .client
            .put(format!("{}/{id}", self.events_url()))
            .bearer_auth(&self.token)
            .json(&Self::request_body(event))
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("calendar update failed: {e}")))?;
        Self::check(response).await.map(|_| ())
    }

    async fn delete_event(&self, id: &str) -> Result<(), SyncError> {
        let response = self
            .client
            .delete(format!("{}/{id}", self.events_url()))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("calendar delete failed: {e}")))?;
        Self::check(response).await.map(|_| ())
    }
}

fn parse_time(time: Option<&EventTime>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&time?.date_time)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
