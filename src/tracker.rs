//! User-triggered operations on the tracked repository list
//!
//! Every operation reports a closed outcome enum; details of failures are
//! logged here and not passed on.

use crate::auth::TokenProvider;
use crate::fetcher::ReleaseSource;
use crate::model::{is_valid_owner, is_valid_repository_name, TrackedRepository};
use crate::reconcile::ReconciliationEngine;
use crate::store::{Page, PageQuery, RepositoryStore};
use crate::error::StoreError;
use crate::transfer;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Success(TrackedRepository),
    Failure,
    /// The repository does not exist, is not accessible or has no release
    NotFound,
    /// Owner or name breaks GitHub's naming rules
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Number of repositories with a new release
    Success(usize),
    Failure,
    /// Everything is already up to date
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Success(usize),
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Success(String),
    Failure,
}

/// Interactive update path
pub struct Tracker {
    source: Arc<dyn ReleaseSource>,
    store: Arc<dyn RepositoryStore>,
    tokens: Arc<dyn TokenProvider>,
    engine: ReconciliationEngine,
}

impl Tracker {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        store: Arc<dyn RepositoryStore>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let engine = ReconciliationEngine::new(source.clone(), store.clone());
        Self {
            source,
            store,
            tokens,
            engine,
        }
    }

    /// Start tracking `owner/name` at its current latest release
    pub async fn add(&self, owner: &str, name: &str) -> AddOutcome {
        let owner = owner.trim();
        let name = name.trim();

        if !is_valid_owner(owner) || !is_valid_repository_name(name) {
            warn!("Rejecting invalid repository name {}/{}", owner, name);
            return AddOutcome::Invalid;
        }

        let Some(token) = self.tokens.access_token().await else {
            return AddOutcome::Failure;
        };

        let Some(repository) = self.source.fetch_one(owner, name, &token).await else {
            return AddOutcome::NotFound;
        };

        match self.store.insert(std::slice::from_ref(&repository)).await {
            Ok(()) => {
                info!("Now tracking {}", repository.full_name());
                AddOutcome::Success(repository)
            }
            Err(e) => {
                error!("Failed to save {}: {}", repository.full_name(), e);
                AddOutcome::Failure
            }
        }
    }

    pub async fn delete(&self, repository: &TrackedRepository) -> DeleteOutcome {
        match self.store.delete(repository).await {
            Ok(()) => {
                info!("Stopped tracking {}", repository.full_name());
                DeleteOutcome::Success
            }
            Err(e) => {
                error!("Failed to remove {}: {}", repository.full_name(), e);
                DeleteOutcome::Failure
            }
        }
    }

    /// Check the given repositories for new releases in one batch
    pub async fn refresh(&self, visible: &[TrackedRepository]) -> UpdateOutcome {
        let Some(token) = self.tokens.access_token().await else {
            return UpdateOutcome::Failure;
        };

        match self.engine.reconcile_visible(visible, &token).await {
            Ok(report) if report.is_latest() => UpdateOutcome::Latest,
            Ok(report) => UpdateOutcome::Success(report.changed),
            Err(e) => {
                error!("Refresh failed: {}", e);
                UpdateOutcome::Failure
            }
        }
    }

    /// One page of the tracked list
    pub async fn page(&self, query: &PageQuery) -> Result<Page, StoreError> {
        self.store.get_page(query).await
    }

    /// Track every repository in an exported document
    pub async fn import(&self, json: &str) -> ImportOutcome {
        let repositories = match transfer::parse(json) {
            Ok(repositories) => repositories,
            Err(e) => {
                error!("Import failed: {:#}", e);
                return ImportOutcome::Failure;
            }
        };

        if repositories.is_empty() {
            warn!("Import document contains no repositories");
            return ImportOutcome::Failure;
        }

        match self.store.insert(&repositories).await {
            Ok(()) => {
                info!("Imported {} repositories", repositories.len());
                ImportOutcome::Success(repositories.len())
            }
            Err(e) => {
                error!("Import failed: {}", e);
                ImportOutcome::Failure
            }
        }
    }

    /// Render every tracked repository as JSON
    pub async fn export(&self) -> ExportOutcome {
        let repositories = match self.store.get_all().await {
            Ok(repositories) => repositories,
            Err(e) => {
                error!("Export failed: {}", e);
                return ExportOutcome::Failure;
            }
        };

        if repositories.is_empty() {
            warn!("Nothing to export, no repositories are tracked");
            return ExportOutcome::Failure;
        }

        match transfer::render(&repositories) {
            Ok(json) => ExportOutcome::Success(json),
            Err(e) => {
                error!("Export failed: {:#}", e);
                ExportOutcome::Failure
            }
        }
    }
}
