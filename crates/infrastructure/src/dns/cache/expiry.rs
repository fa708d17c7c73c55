use super::store::ResponseCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const EXPIRY_TICK: Duration = Duration::from_secs(2);

/// Spawns the background eviction loop for a cache.
pub fn spawn(cache: Arc<ResponseCache>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(EXPIRY_TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            cache.evict_expired();
            debug!(size = cache.len(), "cache expiry pass");
        }
    })
}
