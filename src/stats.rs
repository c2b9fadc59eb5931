//! Query statistics for the check endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::domains::DomainCache;

/// Atomic counters updated by request handlers.
pub struct Stats {
    pub checks: AtomicU64,
    pub suspicious: AtomicU64,
    pub unsuspicious: AtomicU64,
    pub invalid: AtomicU64,
    /// Cumulative handling time in microseconds for averaging.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            checks: AtomicU64::new(0),
            suspicious: AtomicU64::new(0),
            unsuspicious: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_suspicious(&self, elapsed: Duration) {
        self.suspicious.fetch_add(1, Ordering::Relaxed);
        self.record_check(elapsed);
    }

    pub fn record_unsuspicious(&self, elapsed: Duration) {
        self.unsuspicious.fetch_add(1, Ordering::Relaxed);
        self.record_check(elapsed);
    }

    pub fn record_invalid(&self, elapsed: Duration) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
        self.record_check(elapsed);
    }

    fn record_check(&self, elapsed: Duration) {
        self.checks.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let checks = self.checks.load(Ordering::Relaxed);
        let total_us = self.total_response_time_us.load(Ordering::Relaxed);

        let avg_response_ms = if checks > 0 {
            (total_us as f64 / checks as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            checks,
            suspicious: self.suspicious.load(Ordering::Relaxed),
            unsuspicious: self.unsuspicious.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            avg_response_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub checks: u64,
    pub suspicious: u64,
    pub unsuspicious: u64,
    pub invalid: u64,
    pub avg_response_ms: f64,
}

/// Logs counters and cache size every `every` until the runtime shuts down.
pub fn spawn_reporter(stats: Arc<Stats>, cache: Arc<DomainCache>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let snapshot = stats.snapshot();
            tracing::info!(
                domains = cache.size(),
                checks = snapshot.checks,
                suspicious = snapshot.suspicious,
                unsuspicious = snapshot.unsuspicious,
                invalid = snapshot.invalid,
                avg_response_ms = snapshot.avg_response_ms,
                "stats"
            );
        }
    });
}
