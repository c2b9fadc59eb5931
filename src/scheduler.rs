//! Periodic refresh of the domain cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::domains::DomainCache;

/// Runs refresh cycles: once immediately, then every `period`.
///
/// Cycles run one after another on a single task. Ticks that fall due while
/// a cycle is still running are dropped rather than queued.
pub struct Scheduler {
    cache: Arc<DomainCache>,
    period: Duration,
}

impl Scheduler {
    pub fn new(cache: Arc<DomainCache>, period: Duration) -> Self {
        Self { cache, period }
    }

    /// Spawns the refresh loop. It exits once `shutdown` turns `true` or its
    /// sender is dropped; a cycle already running is finished first.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            period_secs = self.period.as_secs(),
            sources = self.cache.sources().len(),
            "Refresh scheduler started"
        );

        loop {
            // The first tick completes immediately
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Refresh scheduler stopping");
                        return;
                    }
                    continue;
                }
            }

            if self.cache.refresh_cycle().await.is_none() {
                debug!("Previous refresh still running, tick dropped");
            }
        }
    }
}
