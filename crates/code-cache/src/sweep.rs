//! Periodic background sweep
//!
//! Spawns a task that evicts expired cache entries on a fixed tick for the
//! process lifetime. The sweep runs independently of request handling and
//! only takes the cache lock for the duration of one `retain` pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::CodeCache;

/// Spawn a background task that sweeps `cache` every `interval`.
///
/// Returns the `JoinHandle` for the spawned task. The task runs until the
/// process exits; dropping the handle detaches it.
pub fn spawn_sweep_task(
    cache: Arc<CodeCache>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick — the cache was just created
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = cache.sweep(Instant::now()).await;
            trace!(removed, "sweep tick");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sweep_task_evicts_expired_entries_on_tick() {
        // Zero-ish retention so the entry is expired by the first tick.
        let cache = Arc::new(CodeCache::new(Duration::from_millis(1)));
        cache.store("code".into(), "token".into()).await;

        // Let real time make the entry older than the 1ms retention
        std::thread::sleep(Duration::from_millis(5));

        let _task = spawn_sweep_task(cache.clone(), Duration::from_secs(60));

        // Paused clock: this jumps past the first sweep tick instantly
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(cache.is_empty().await, "entry must be gone after the tick");
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entries_survive_a_tick() {
        let cache = Arc::new(CodeCache::new(Duration::from_secs(300)));
        cache.store("code".into(), "token".into()).await;

        let _task = spawn_sweep_task(cache.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert_eq!(cache.len().await, 1, "unexpired entry must survive sweeps");
    }
}
