//! Reconciliation Engine - brings stored release state up to date
//!
//! The engine sends the known repositories to a [`ReleaseSource`] in
//! partitions, counts the records that came back different and writes each
//! changed partition back to the [`RepositoryStore`] in one atomic update.
//! Partitions run strictly one after another; the first failure ends the run
//! and leaves earlier partitions committed.
//!
//! Two overlapping runs over the same repositories are not coordinated. The
//! store keeps whichever write lands last.

use crate::error::ReconcileError;
use crate::fetcher::ReleaseSource;
use crate::model::TrackedRepository;
use crate::store::RepositoryStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Largest query cost GitHub allows per hour
pub const GRAPHQL_API_COST_MAX: usize = 500_000;

/// Cost charged per repository in a batched release query
pub const GRAPHQL_REQUEST_COST: usize = 100;

/// Repositories per partition on the periodic path
pub const DEFAULT_PARTITION_SIZE: usize = GRAPHQL_API_COST_MAX / GRAPHQL_REQUEST_COST;

/// Results from a complete reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Every input repository in input order, updated where a newer release
    /// was found
    pub repositories: Vec<TrackedRepository>,
    /// Records that differ from their input
    pub changed: usize,
    /// Partitions fetched
    pub partitions: usize,
    pub duration: Duration,
}

impl ReconcileReport {
    /// True when nothing changed
    pub fn is_latest(&self) -> bool {
        self.changed == 0
    }
}

/// Fetches, diffs and persists release state
#[derive(Clone)]
pub struct ReconciliationEngine {
    source: Arc<dyn ReleaseSource>,
    store: Arc<dyn RepositoryStore>,
    partition_size: usize,
}

impl ReconciliationEngine {
    pub fn new(source: Arc<dyn ReleaseSource>, store: Arc<dyn RepositoryStore>) -> Self {
        Self {
            source,
            store,
            partition_size: DEFAULT_PARTITION_SIZE,
        }
    }

    /// Override the periodic partition size (at least 1)
    pub fn with_partition_size(mut self, partition_size: usize) -> Self {
        self.partition_size = partition_size.max(1);
        self
    }

    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    /// Reconcile the whole set in fixed-size partitions
    pub async fn reconcile(
        &self,
        repositories: &[TrackedRepository],
        token: &str,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.run(repositories, token, self.partition_size).await
    }

    /// Reconcile a user-visible subset as a single partition
    pub async fn reconcile_visible(
        &self,
        repositories: &[TrackedRepository],
        token: &str,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.run(repositories, token, repositories.len().max(1))
            .await
    }

    async fn run(
        &self,
        repositories: &[TrackedRepository],
        token: &str,
        partition_size: usize,
    ) -> Result<ReconcileReport, ReconcileError> {
        let start_time = Instant::now();

        info!(
            "Reconciling {} repositories in partitions of {}",
            repositories.len(),
            partition_size
        );

        let mut updated = Vec::with_capacity(repositories.len());
        let mut changed = 0;
        let mut partitions = 0;

        for (partition, batch) in repositories.chunks(partition_size).enumerate() {
            partitions += 1;

            let Some(results) = self.source.fetch_many(batch, token).await else {
                error!("Partition {} could not be fetched, aborting run", partition);
                return Err(ReconcileError::Fetch { partition });
            };

            let partition_changed = results
                .iter()
                .zip(batch)
                .filter(|(after, before)| after != before)
                .count();

            if partition_changed > 0 {
                self.store.update(&results).await.map_err(|source| {
                    error!("Partition {} could not be persisted: {}", partition, source);
                    ReconcileError::Persist { partition, source }
                })?;
            }

            debug!(
                "Partition {}: {} repositories, {} changed",
                partition,
                batch.len(),
                partition_changed
            );

            changed += partition_changed;
            updated.extend(results);
        }

        let report = ReconcileReport {
            repositories: updated,
            changed,
            partitions,
            duration: start_time.elapsed(),
        };

        info!(
            "Reconciliation completed in {:.2}s: {} partitions, {} changed",
            report.duration.as_secs_f64(),
            report.partitions,
            report.changed
        );

        Ok(report)
    }
}
