//! Wiring of the production collaborators from configuration

use crate::auth::{GitHubAuth, TokenProvider};
use crate::config::Config;
use crate::fetcher::{ReleaseFetcher, ReleaseSource};
use crate::github::GraphQlClient;
use crate::monitor::PeriodicMonitor;
use crate::notify;
use crate::rate_limit::RateLimiter;
use crate::reconcile::ReconciliationEngine;
use crate::state::StateDb;
use crate::store::RepositoryStore;
use crate::tracker::Tracker;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Shared handles for one process
pub struct App {
    pub config: Arc<Config>,
    pub db: Arc<StateDb>,
    source: Arc<dyn ReleaseSource>,
    tokens: Arc<dyn TokenProvider>,
}

impl App {
    /// Open the database and build the GitHub clients named in `config`
    pub fn new(config: Config) -> Result<Self> {
        let db = StateDb::open_at(&config.database_path())
            .context("Failed to open state database")?;
        let client = GraphQlClient::from_config(&config)?;
        let tokens = GitHubAuth::new(&config);

        Ok(Self::with_parts(
            config,
            Arc::new(db),
            Arc::new(ReleaseFetcher::new(client, Arc::new(RateLimiter::new()))),
            Arc::new(tokens),
        ))
    }

    pub fn with_parts(
        config: Config,
        db: Arc<StateDb>,
        source: Arc<dyn ReleaseSource>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            db,
            source,
            tokens,
        }
    }

    fn store(&self) -> Arc<dyn RepositoryStore> {
        self.db.clone()
    }

    pub fn tracker(&self) -> Tracker {
        Tracker::new(self.source.clone(), self.store(), self.tokens.clone())
    }

    pub fn monitor(&self) -> Result<PeriodicMonitor> {
        let engine = ReconciliationEngine::new(self.source.clone(), self.store())
            .with_partition_size(self.config.monitor.partition_size);
        let notifier = notify::from_config(&self.config.notifications)?;

        Ok(PeriodicMonitor::new(
            self.tokens.clone(),
            self.store(),
            engine,
            notifier,
        ))
    }
}
