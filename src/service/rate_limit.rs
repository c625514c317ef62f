use std::sync::Arc;

use serenity::async_trait;
use tokio::sync::Mutex;

/// Time source for pacing and backoff. Production uses [`TokioClock`];
/// tests inject a fake that records sleeps instead of waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
    async fn sleep_ms(&self, ms: u64);
}

pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

/// Enforces a minimum interval between remote mutations. Callers are
/// serialized: the interval lock is held across the wait so two tasks can
/// never slip through the same gap.
pub struct RatePacer {
    min_interval_ms: u64,
    last: Mutex<Option<i64>>,
    clock: Arc<dyn Clock>,
}

impl RatePacer {
    pub fn new(min_interval_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval_ms,
            last: Mutex::new(None),
            clock,
        }
    }

    /// Waits until at least `min_interval_ms` has passed since the previous
    /// call, then records this call as the new reference point.
    pub async fn pace(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = self.clock.now_ms() - prev;
            let remaining = self.min_interval_ms as i64 - elapsed;
            if remaining > 0 {
                self.clock.sleep_ms(remaining as u64).await;
            }
        }
        *last = Some(self.clock.now_ms());
    }
}

/// Exponential backoff delay for attempt `n` (1-based), capped.
pub fn backoff_ms(base_ms: u64, attempt: u32, cap_ms: u64) -> u64 {
    base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16)).min(cap_ms)
}
