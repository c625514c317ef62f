use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::clients::ports::{EventMirror, EventPayload, RemoteEvent};
use crate::error::SyncError;
use crate::service::rate_limit::{Clock, RatePacer};

/// Remote start times within this window count as the same event.
pub const MATCH_TOLERANCE_SECS: i64 = 60;

const MAX_MUTATION_ATTEMPTS: u32 = 3;
const RATE_LIMIT_CAP_MS: u64 = 60_000;

/// One event the mirror should hold after the sync.
#[derive(Debug, Clone)]
pub struct DesiredEvent {
    pub payload: EventPayload,
    /// The canonical-source line this event was derived from; re-checked
    /// against the source right before mutating, to lose gracefully against
    /// a concurrent edit.
    pub source_line: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
}

enum Mutation<'a> {
    Insert(&'a EventPayload),
    Update(&'a str, &'a EventPayload),
    Delete(&'a str),
}

/// Reconciles a derived event set against one downstream mirror: update on
/// real difference, create when unmatched, delete stale future events that
/// are not name-protected.
pub struct DiffEngine {
    mirror: Arc<dyn EventMirror>,
    pacer: Arc<RatePacer>,
    clock: Arc<dyn Clock>,
    protected_prefixes: Vec<String>,
}

impl DiffEngine {
    pub fn new(
        mirror: Arc<dyn EventMirror>,
        pacer: Arc<RatePacer>,
        clock: Arc<dyn Clock>,
        protected_prefixes: Vec<String>,
    ) -> Self {
        Self {
            mirror,
            pacer,
            clock,
            protected_prefixes,
        }
    }

    pub async fn sync(
        &self,
        desired: &[DesiredEvent],
        canonical_source: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SyncSummary, SyncError> {
        let remotes = self.mirror.list_events().await?;
        let mut summary = SyncSummary::default();
        let mut matched_ids: HashSet<String> = HashSet::new();

        for event in desired {
            if event.payload.start <= now {
                summary.skipped += 1;
                continue;
            }
            if let (Some(source), Some(line)) = (canonical_source, event.source_line.as_deref()) {
                if !source.contains(line) {
                    info!(
                        "'{}' no longer present in the canonical source, skipping",
                        event.payload.name
                    );
                    summary.skipped += 1;
                    continue;
                }
            }

            match find_match(&event.payload, &remotes) {
                Some(remote) => {
                    matched_ids.insert(remote.id.clone());
                    if needs_update(&event.payload, remote) {
                        info!("updating '{}'", event.payload.name);
                        match self.apply(Mutation::Update(&remote.id, &event.payload)).await? {
                            true => summary.updated += 1,
                            false => summary.failed += 1,
                        }
                    } else {
                        summary.skipped += 1;
                    }
                }
                None => {
                    info!("creating '{}' at {}", event.payload.name, event.payload.start);
                    match self.apply(Mutation::Insert(&event.payload)).await? {
                        true => summary.created += 1,
                        false => summary.failed += 1,
                    }
                }
            }
        }

        for remote in &remotes {
            if matched_ids.contains(&remote.id) || remote.start <= now {
                continue;
            }
            if self
                .protected_prefixes
                .iter()
                .any(|prefix| remote.name.starts_with(prefix.as_str()))
            {
                continue;
            }
            info!("deleting stale event '{}' at {}", remote.name, remote.start);
            match self.apply(Mutation::Delete(&remote.id)).await? {
                true => summary.deleted += 1,
                false => summary.failed += 1,
            }
        }

        info!(
            "mirror sync complete: {} created, {} updated, {} skipped, {} deleted, {} failed",
            summary.created, summary.updated, summary.skipped, summary.deleted, summary.failed
        );
        Ok(summary)
    }

    /// Applies one mutation through the pacer. Rate-limit responses back
    /// off exponentially up to a cap; exhausting the attempts fails the
    /// whole run rather than looping forever. Other errors are reported as
    /// a per-item failure (`Ok(false)`).
    async fn apply(&self, op: Mutation<'_>) -> Result<bool, SyncError> {
        for attempt in 1..=MAX_MUTATION_ATTEMPTS {
            self.pacer.pace().await;
            let result = match &op {
                Mutation::Insert(event) => self.mirror.insert_event(event).await,
                Mutation::Update(id, event) => self.mirror.update_event(id, event).await,
                Mutation::Delete(id) => self.mirror.delete_event(id).await,
            };
            match result {
                Ok(()) => return Ok(true),
                Err(SyncError::RateLimited { retry_after_secs }) => {
                    if attempt == MAX_MUTATION_ATTEMPTS {
                        return Err(SyncError::Fatal(
                            "rate limit retries exhausted during mirror sync".to_string(),
                        ));
                    }
                    let delay = (retry_after_secs * 1000)
                        .saturating_mul(1 << (attempt - 1))
                        .min(RATE_LIMIT_CAP_MS);
                    warn!("rate limited, backing off {delay}ms (attempt {attempt})");
                    self.clock.sleep_ms(delay).await;
                }
                Err(err) => {
                    warn!("mirror mutation failed: {err}");
                    return Ok(false);
                }
            }
        }
        Ok(false)
    }
}

/// Exact title plus start within tolerance. Multiple candidates count as no
/// match; creating a duplicate is safer than updating the wrong event.
fn find_match<'a>(event: &EventPayload, remotes: &'a [RemoteEvent]) -> Option<&'a RemoteEvent> {
    let mut candidates = remotes.iter().filter(|remote| {
        remote.name == event.name
            && (remote.start - event.start).num_seconds().abs() < MATCH_TOLERANCE_SECS
    });
    let first = candidates.next()?;
    if candidates.next().is_some() {
        warn!("multiple remote events match '{}', treating as unmatched", event.name);
        return None;
    }
    Some(first)
}

fn needs_update(event: &EventPayload, remote: &RemoteEvent) -> bool {
    if normalize_description(&event.description) != normalize_description(&remote.description) {
        return true;
    }
    if (remote.start - event.start).num_seconds() != 0 {
        return true;
    }
    match remote.end {
        Some(end) => (end - event.end).num_seconds() != 0,
        None => true,
    }
}

// Mirrors re-flow whitespace and case; only content differences matter.
fn normalize_description(description: &str) -> String {
    description
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}
