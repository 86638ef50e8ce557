//! Periodic eviction of expired artifacts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;
use tracing::{error, info};

use mergeai_core::store::ArtifactStore;

/// Counters across sweep cycles.
#[derive(Default)]
pub struct SweeperStats {
    pub total_cycles: AtomicU64,
    pub total_evicted: AtomicU64,
    pub total_errors: AtomicU64,
}

/// Runs [`ArtifactStore::evict_older_than`] on a timer until shut down.
pub struct Sweeper {
    store: ArtifactStore,
    max_age: Duration,
    interval: Duration,
    stats: Arc<SweeperStats>,
}

impl Sweeper {
    pub fn new(store: ArtifactStore, max_age: Duration, interval: Duration) -> Self {
        Self {
            store,
            max_age,
            interval,
            stats: Arc::new(SweeperStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SweeperStats> {
        self.stats.clone()
    }

    /// Main sweeper loop. Returns once `shutdown` is notified.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        info!(
            max_age_secs = self.max_age.as_secs(),
            interval_secs = self.interval.as_secs(),
            "artifact sweeper started"
        );

        let mut interval = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.notified() => {
                    info!("artifact sweeper stopping");
                    return;
                }
            }
        }
    }

    /// Run a single eviction pass.
    pub async fn sweep_once(&self) {
        let cycle = self.stats.total_cycles.fetch_add(1, Ordering::SeqCst) + 1;
        match self.store.evict_older_than(self.max_age).await {
            Ok(removed) => {
                self.stats
                    .total_evicted
                    .fetch_add(removed as u64, Ordering::SeqCst);
                if removed > 0 {
                    info!(cycle, removed, "sweep cycle evicted artifacts");
                }
            }
            Err(e) => {
                let errors = self.stats.total_errors.fetch_add(1, Ordering::SeqCst) + 1;
                error!(cycle, error = %e, total_errors = errors, "sweep cycle failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergeai_core::store::ArtifactKind;

    #[tokio::test]
    async fn test_sweep_once_evicts_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        let artifact = store.stage(b"x", ArtifactKind::Merged, None).await.unwrap();

        let sweeper = Sweeper::new(store.clone(), Duration::ZERO, Duration::from_secs(60));
        sweeper.sweep_once().await;

        assert!(!store.exists(artifact.id.as_str()).await);
        let stats = sweeper.stats();
        assert_eq!(stats.total_cycles.load(Ordering::SeqCst), 1);
        assert_eq!(stats.total_evicted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        let artifact = store.stage(b"x", ArtifactKind::Merged, None).await.unwrap();

        let sweeper = Sweeper::new(store.clone(), Duration::from_secs(3600), Duration::from_secs(60));
        sweeper.sweep_once().await;

        assert!(store.exists(artifact.id.as_str()).await);
        assert_eq!(sweeper.stats().total_evicted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        let sweeper = Arc::new(Sweeper::new(
            store,
            Duration::from_secs(3600),
            Duration::from_millis(10),
        ));
        let shutdown = Arc::new(Notify::new());

        let task = {
            let sweeper = sweeper.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { sweeper.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("sweeper did not stop")
            .unwrap();
        assert!(sweeper.stats().total_cycles.load(Ordering::SeqCst) >= 1);
    }
}
