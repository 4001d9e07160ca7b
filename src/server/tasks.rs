use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

use crate::state::{CleanupPolicy, PackageStore};
use crate::workflow::CancelToken;

/// Periodically evicts packages older than `max_age` until `shutdown` fires.
pub async fn run_package_cleanup(
    packages: Arc<PackageStore>,
    every: Duration,
    max_age: chrono::Duration,
    shutdown: CancelToken,
) {
    let mut ticker = interval(every);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Package cleanup task stopping.");
                return;
            }
            _ = ticker.tick() => {
                let evicted = packages.cleanup(CleanupPolicy::max_age(max_age));
                if evicted > 0 {
                    info!(evicted, remaining = packages.len(), "Evicted expired packages.");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_task_stops_on_shutdown() {
        let shutdown = CancelToken::new();
        let handle = tokio::spawn(run_package_cleanup(
            Arc::new(PackageStore::new()),
            Duration::from_millis(10),
            chrono::Duration::hours(1),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
