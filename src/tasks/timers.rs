use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::events::queue::{Event, EventBus};

pub const RAID_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const INVENTORY_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const OFFNIGHT_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const MIRROR_SYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DRIFT_CHECK_INTERVAL: Duration = Duration::from_secs(90 * 60);
pub const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Emits `event` on the bus immediately and then on every tick. The worker
/// does the actual work; timers never touch the cache or the network.
pub async fn run_timer_loop(bus: EventBus, event: Event, interval: Duration) {
    loop {
        debug!("timer fired: {event:?}");
        bus.emit(event.clone()).await;
        sleep(interval).await;
    }
}
