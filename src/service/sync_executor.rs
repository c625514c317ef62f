use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::ports::RemoteFileStore;
use crate::error::SyncError;
use crate::models::cache::{Verification, VerificationStatus};
use crate::service::checksum;
use crate::service::rate_limit::{backoff_ms, Clock, RatePacer};

/// How many write intents run concurrently.
pub const BATCH_WIDTH: usize = 5;
pub const MAX_ATTEMPTS: u32 = 3;
pub const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 60_000;

/// One file the caller wants the remote store to hold.
#[derive(Debug, Clone)]
pub struct WriteIntent {
    pub path: String,
    pub content: String,
    /// The last verification recorded for this path, if any. A fresh
    /// success whose checksum matches skips the remote round-trip.
    pub prior: Option<Verification>,
}

/// Per-item result. A failed verification carries the attempted content's
/// checksum so the cache records the divergence instead of hiding it.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub path: String,
    pub content: String,
    pub skipped: bool,
    pub verification: Verification,
}

impl WriteOutcome {
    pub fn succeeded(&self) -> bool {
        self.verification.is_success()
    }
}

/// Pushes batches of file writes to the remote store: read, skip when
/// byte-identical, write with the revision token, verify, retry transient
/// failures with backoff. One item's failure never aborts its siblings.
pub struct SyncExecutor {
    store: Arc<dyn RemoteFileStore>,
    clock: Arc<dyn Clock>,
    pacer: Arc<RatePacer>,
}

impl SyncExecutor {
    pub fn new(store: Arc<dyn RemoteFileStore>, clock: Arc<dyn Clock>, pacer: Arc<RatePacer>) -> Self {
        Self { store, clock, pacer }
    }

    pub async fn process_batch(self: &Arc<Self>, intents: Vec<WriteIntent>) -> Vec<WriteOutcome> {
        let mut outcomes = Vec::with_capacity(intents.len());
        for chunk in intents.chunks(BATCH_WIDTH) {
            let mut handles = Vec::with_capacity(chunk.len());
            for intent in chunk {
                let executor = Arc::clone(self);
                let intent = intent.clone();
                handles.push(tokio::spawn(async move {
                    executor.process_one(intent).await
                }));
            }
            for handle in handles {
                match handle.await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(err) => warn!("write task panicked: {err}"),
                }
            }
        }
        outcomes
    }

    async fn process_one(&self, intent: WriteIntent) -> WriteOutcome {
        let now = self.clock.now_ms();
        if let Some(prior) = &intent.prior {
            if checksum::is_fresh(prior, &intent.content, now) {
                info!("{}: verification is fresh, skipping remote fetch", intent.path);
                return WriteOutcome {
                    verification: prior.clone(),
                    skipped: true,
                    path: intent.path,
                    content: intent.content,
                };
            }
        }

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt_write(&intent).await {
                Ok(outcome) => return outcome,
                Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                    let delay = backoff_ms(BACKOFF_BASE_MS, attempt, BACKOFF_CAP_MS);
                    warn!(
                        "{}: attempt {attempt} failed ({err}), retrying in {delay}ms",
                        intent.path
                    );
                    self.clock.sleep_ms(delay).await;
                    last_error = err.to_string();
                }
                Err(err) => {
                    last_error = err.to_string();
                    break;
                }
            }
        }

        warn!("{}: all attempts failed: {last_error}", intent.path);
        WriteOutcome {
            verification: Verification {
                checksum: checksum::hash(&intent.content),
                last_verified: self.clock.now_ms(),
                status: VerificationStatus::Failed,
                error: Some(last_error),
            },
            skipped: false,
            path: intent.path,
            content: intent.content,
        }
    }

    async fn attempt_write(&self, intent: &WriteIntent) -> Result<WriteOutcome, SyncError> {
        let remote = self.store.get_file(&intent.path).await?;
        let revision = remote.as_ref().map(|f| f.revision.clone());

        if let Some(file) = &remote {
            if file.content == intent.content {
                info!("{}: remote content is identical, skipping write", intent.path);
                return Ok(WriteOutcome {
                    verification: checksum::verify(&intent.content, &file.content, self.clock.now_ms()),
                    skipped: true,
                    path: intent.path.clone(),
                    content: intent.content.clone(),
                });
            }
        } else {
            info!("{}: not present on remote, creating", intent.path);
        }

        self.pacer.pace().await;
        self.store
            .put_file(&intent.path, &intent.content, revision.as_deref())
            .await?;

        // Read back what landed; a mismatch means a racing writer won.
        let written = self.store.get_file(&intent.path).await?;
        let verification = match &written {
            Some(file) => checksum::verify(&intent.content, &file.content, self.clock.now_ms()),
            None => {
                return Err(SyncError::VerificationMismatch {
                    path: intent.path.clone(),
                })
            }
        };
        if !verification.is_success() {
            warn!("{}: post-write verification failed", intent.path);
        }
        Ok(WriteOutcome {
            verification,
            skipped: false,
            path: intent.path.clone(),
            content: intent.content.clone(),
        })
    }
}
