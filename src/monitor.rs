//! Periodic Monitor - one background check of every tracked repository

use crate::auth::TokenProvider;
use crate::notify::Notifier;
use crate::reconcile::ReconciliationEngine;
use crate::store::RepositoryStore;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one monitor job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    Success,
    Failure,
}

/// Checks the whole tracked set and notifies about new releases
pub struct PeriodicMonitor {
    tokens: Arc<dyn TokenProvider>,
    store: Arc<dyn RepositoryStore>,
    engine: ReconciliationEngine,
    notifier: Arc<dyn Notifier>,
}

impl PeriodicMonitor {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        store: Arc<dyn RepositoryStore>,
        engine: ReconciliationEngine,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tokens,
            store,
            engine,
            notifier,
        }
    }

    /// Run one job
    pub async fn run_once(&self) -> JobResult {
        let Some(token) = self.tokens.access_token().await.filter(|t| !t.is_empty()) else {
            warn!("Skipping release check, not signed in");
            return JobResult::Failure;
        };

        let repositories = match self.store.get_all().await {
            Ok(repositories) => repositories,
            Err(e) => {
                error!("Failed to load tracked repositories: {}", e);
                return JobResult::Failure;
            }
        };

        match self.engine.reconcile(&repositories, &token).await {
            Ok(report) => {
                if report.changed > 0 {
                    self.notifier.notify(report.changed).await;
                } else {
                    info!("All {} repositories are up to date", repositories.len());
                }
                JobResult::Success
            }
            Err(e) => {
                error!("Release check failed: {}", e);
                JobResult::Failure
            }
        }
    }
}
