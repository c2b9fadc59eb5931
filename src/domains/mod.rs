//! Refresh-and-lookup cache of disposable domains.
//!
//! [`DomainCache`] owns the published domain set, the snapshot file and the
//! source list. Readers load the current set through an [`ArcSwap`], so a
//! lookup never waits for a refresh cycle and never sees a half-merged set:
//! a cycle merges into a private copy and publishes it with one swap.

mod set;
pub mod snapshot;

pub use set::{DEFAULT_MAX_LINE_LEN, DomainSet, MergeOutcome, normalize};
pub use snapshot::SnapshotLoad;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{FetchError, PersistenceError};
use crate::fetch::SourceFetcher;

/// Outcome of one source within a refresh cycle.
#[derive(Debug)]
pub struct SourceReport {
    pub source: String,
    pub outcome: Result<MergeOutcome, FetchError>,
}

/// Summary of a completed refresh cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub sources: Vec<SourceReport>,
    /// New entries across all sources.
    pub total_added: usize,
    /// Set size after the cycle.
    pub size: usize,
    /// Whether the snapshot rewrite succeeded.
    pub persisted: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Number of sources that could not be fetched.
    pub fn failed(&self) -> usize {
        self.sources.iter().filter(|s| s.outcome.is_err()).count()
    }
}

/// Owns the known domain set and keeps it in sync with sources and disk.
///
/// # Lifecycle
///
/// 1. [`load_snapshot`](Self::load_snapshot) once at startup.
/// 2. [`refresh_cycle`](Self::refresh_cycle) from the scheduler.
/// 3. [`lookup`](Self::lookup) and [`size`](Self::size) from any task, at any time.
pub struct DomainCache {
    domains: ArcSwap<DomainSet>,
    sources: Vec<String>,
    snapshot_path: PathBuf,
    fetcher: Arc<dyn SourceFetcher>,
    max_line_len: usize,
    // Held by whoever is building the next set; at most one at a time.
    writer: Mutex<()>,
}

impl DomainCache {
    /// Creates an empty cache. Nothing is read or fetched until asked.
    pub fn new(
        sources: Vec<String>,
        snapshot_path: impl Into<PathBuf>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            domains: ArcSwap::from_pointee(DomainSet::new()),
            sources,
            snapshot_path: snapshot_path.into(),
            fetcher,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            writer: Mutex::new(()),
        }
    }

    /// Overrides the longest accepted source line.
    #[must_use]
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Reports whether `candidate` is a known domain.
    ///
    /// Case-insensitive. Blank or malformed input is simply not found.
    pub fn lookup(&self, candidate: &str) -> bool {
        self.domains.load().contains(candidate)
    }

    /// Returns the number of known domains.
    pub fn size(&self) -> usize {
        self.domains.load().len()
    }

    /// Merges the on-disk snapshot into the set.
    ///
    /// A missing snapshot means first run and merges nothing. A malformed one
    /// still contributes the entries parsed before the error.
    ///
    /// Returns the number of entries added.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Read`] or [`PersistenceError::Parse`]; the
    /// cache stays usable either way.
    pub async fn load_snapshot(&self) -> Result<usize, PersistenceError> {
        let _writer = self.writer.lock().await;
        let path = &self.snapshot_path;

        let (entries, failure) = match snapshot::load(path).await {
            Ok(SnapshotLoad::Missing) => {
                warn!(
                    path = %path.display(),
                    "No domain snapshot found, it will be created after the first refresh"
                );
                return Ok(0);
            }
            Ok(SnapshotLoad::Loaded(entries)) => (entries, None),
            Ok(SnapshotLoad::Malformed { entries, error }) => (entries, Some(error)),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read domain snapshot");
                return Err(e);
            }
        };

        let mut next = DomainSet::clone(&self.domains.load());
        let merged = next.merge_entries(&entries, self.max_line_len);
        self.domains.store(Arc::new(next));

        match failure {
            None => {
                info!(
                    path = %path.display(),
                    added = merged.added,
                    size = self.size(),
                    "Loaded domain snapshot"
                );
                Ok(merged.added)
            }
            Some(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    recovered = merged.added,
                    "Domain snapshot is malformed, keeping entries parsed before the error"
                );
                Err(e)
            }
        }
    }

    /// Fetches every source in order, merges new entries and rewrites the snapshot.
    ///
    /// A source that fails to fetch is logged and skipped. The merged set is
    /// published before the snapshot is written, so a write failure never
    /// loses in-memory entries.
    ///
    /// Returns `None` without doing anything if another cycle is in flight.
    pub async fn refresh_cycle(&self) -> Option<CycleReport> {
        let Ok(_writer) = self.writer.try_lock() else {
            debug!("Refresh cycle already in progress, skipping");
            return None;
        };

        let started = Instant::now();
        let mut next = DomainSet::clone(&self.domains.load());
        let mut sources = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            info!(source = %source, "Fetching domain source");

            let outcome = match self.fetcher.fetch(source).await {
                Ok(body) => {
                    let merged = next.merge_lines(&body, self.max_line_len);
                    info!(
                        source = %source,
                        added = merged.added,
                        rejected = merged.rejected,
                        "Merged domain source"
                    );
                    Ok(merged)
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Failed to fetch domain source, skipping");
                    Err(e)
                }
            };

            sources.push(SourceReport {
                source: source.clone(),
                outcome,
            });
        }

        let next = Arc::new(next);
        self.domains.store(Arc::clone(&next));

        let persisted = self.persist(next).await;
        let total_added = sources
            .iter()
            .filter_map(|s| s.outcome.as_ref().ok())
            .map(|m| m.added)
            .sum();

        let report = CycleReport {
            sources,
            total_added,
            size: self.size(),
            persisted,
            elapsed: started.elapsed(),
        };

        info!(
            added = report.total_added,
            failed = report.failed(),
            size = report.size,
            persisted = report.persisted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Refresh cycle complete"
        );

        Some(report)
    }

    /// Rewrites the snapshot off the async workers.
    async fn persist(&self, domains: Arc<DomainSet>) -> bool {
        let path = self.snapshot_path.clone();
        let task = tokio::task::spawn_blocking(move || snapshot::write(&path, domains.iter()));

        match task.await {
            Ok(Ok(())) => {
                debug!(path = %self.snapshot_path.display(), "Wrote domain snapshot");
                true
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to write domain snapshot, keeping in-memory set");
                false
            }
            Err(e) => {
                error!(error = %e, "Snapshot writer task failed");
                false
            }
        }
    }
}
