use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::store::TtlCache;

/// Periodically evict expired entries until `cancel` fires.
///
/// Sweeping only bounds memory; `get` already hides stale entries.
pub fn spawn_sweeper<V, K>(
    cache: Arc<TtlCache<V, K>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    let period = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("cache sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            remaining = cache.len(),
                            "swept expired cache entries"
                        );
                    }
                }
            }
        }
    })
}
