//! Release fetcher - turns GraphQL release queries into tracked repository
//! records
//!
//! Every failure at this layer (rate budget denied, transport, parse, GraphQL
//! errors, repository without releases) is logged where it happens and
//! surfaced as `None`.

use crate::github::{
    GraphQlClient, RateLimitData, ReleaseNode, RepositoriesQueryData, RepositoryNode,
    RepositoryQueryData, REPOSITORIES_QUERY, REPOSITORY_QUERY,
};
use crate::model::{compare_timestamps, TrackedRepository};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use serde_json::json;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Source of current release state for tracked repositories
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Look up a repository by owner and name, with its latest release
    async fn fetch_one(&self, owner: &str, name: &str, token: &str) -> Option<TrackedRepository>;

    /// Fetch the latest release of every repository in one batch.
    ///
    /// The result has the same length and order as `repositories`; an entry
    /// differs from its input only if a strictly newer release was found.
    async fn fetch_many(
        &self,
        repositories: &[TrackedRepository],
        token: &str,
    ) -> Option<Vec<TrackedRepository>>;
}

/// [`ReleaseSource`] backed by the GitHub GraphQL API
pub struct ReleaseFetcher {
    client: GraphQlClient,
    rate_limiter: Arc<RateLimiter>,
}

impl ReleaseFetcher {
    pub fn new(client: GraphQlClient, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }

    fn record_rate_limit(&self, rate_limit: Option<&RateLimitData>) {
        if let Some(rate_limit) = rate_limit {
            self.rate_limiter
                .set(rate_limit.remaining, rate_limit.reset_at);
        }
    }
}

#[async_trait]
impl ReleaseSource for ReleaseFetcher {
    async fn fetch_one(&self, owner: &str, name: &str, token: &str) -> Option<TrackedRepository> {
        if !self.rate_limiter.verify(1) {
            warn!("Rate budget exhausted, not looking up {}/{}", owner, name);
            return None;
        }

        debug!("Fetching latest release of {}/{}", owner, name);

        let variables = json!({
            "owner": owner,
            "name": name,
        });

        let response = match self
            .client
            .execute::<RepositoryQueryData>(REPOSITORY_QUERY, variables, token)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to fetch {}/{}: {}", owner, name, e);
                return None;
            }
        };

        self.record_rate_limit(response.data.as_ref().and_then(|d| d.rate_limit.as_ref()));

        if response.has_errors() {
            info!(
                "GitHub reported errors for {}/{}: {}",
                owner,
                name,
                response.error_summary()
            );
            return None;
        }

        let node = response.data?.repository?;
        let id = node.id?;
        let Some(release) = node.latest_release else {
            info!("{}/{} has no releases", owner, name);
            return None;
        };

        let author = release.author.unwrap_or_default();

        Some(TrackedRepository {
            id,
            owner: owner.to_string(),
            name: name.to_string(),
            author_avatar_url: author.avatar_url.unwrap_or_default(),
            author_html_url: author.url.unwrap_or_default(),
            latest_release_html_url: release.url.unwrap_or_default(),
            latest_release_name: release.name.unwrap_or_default(),
            latest_release_timestamp: release.published_at.unwrap_or_default(),
        })
    }

    async fn fetch_many(
        &self,
        repositories: &[TrackedRepository],
        token: &str,
    ) -> Option<Vec<TrackedRepository>> {
        if repositories.is_empty() {
            return Some(Vec::new());
        }

        if !self.rate_limiter.verify(repositories.len() as u64) {
            warn!(
                "Rate budget exhausted, not checking {} repositories",
                repositories.len()
            );
            return None;
        }

        debug!("Fetching latest releases of {} repositories", repositories.len());

        let ids: Vec<&str> = repositories.iter().map(|r| r.id.as_str()).collect();
        let variables = json!({ "ids": ids });

        let response = match self
            .client
            .execute::<RepositoriesQueryData>(REPOSITORIES_QUERY, variables, token)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to fetch releases for {} repositories: {}", repositories.len(), e);
                return None;
            }
        };

        self.record_rate_limit(response.data.as_ref().and_then(|d| d.rate_limit.as_ref()));

        if response.has_errors() {
            warn!(
                "GitHub reported errors, discarding batch: {}",
                response.error_summary()
            );
            return None;
        }

        let nodes = response.data?.nodes;
        if nodes.len() != repositories.len() {
            error!(
                "GitHub returned {} nodes for {} ids, discarding batch",
                nodes.len(),
                repositories.len()
            );
            return None;
        }

        Some(
            repositories
                .iter()
                .zip(nodes)
                .map(|(current, node)| merge_release(current, node))
                .collect(),
        )
    }
}

/// Apply a fetched node to its stored repository if it carries a newer release
fn merge_release(current: &TrackedRepository, node: Option<RepositoryNode>) -> TrackedRepository {
    let Some(node) = node else {
        debug!("No node returned for {}", current.full_name());
        return current.clone();
    };

    let Some(release) = node.latest_release else {
        debug!("{} has no release", current.full_name());
        return current.clone();
    };

    let Some(candidate) = release.published_at.as_deref() else {
        return current.clone();
    };

    match compare_timestamps(candidate, &current.latest_release_timestamp) {
        Some(Ordering::Greater) => {}
        Some(_) => return current.clone(),
        None => {
            warn!(
                "Cannot compare release timestamps for {} ({:?} vs {:?})",
                current.full_name(),
                candidate,
                current.latest_release_timestamp
            );
            return current.clone();
        }
    }

    info!(
        "New release for {}: {} ({})",
        current.full_name(),
        release.name.as_deref().unwrap_or(""),
        candidate
    );

    updated_copy(current, node.owner.map(|o| o.login), node.name, release)
}

fn updated_copy(
    current: &TrackedRepository,
    owner: Option<String>,
    name: Option<String>,
    release: ReleaseNode,
) -> TrackedRepository {
    let author = release.author.unwrap_or_default();

    TrackedRepository {
        id: current.id.clone(),
        owner: owner.unwrap_or_else(|| current.owner.clone()),
        name: name.unwrap_or_else(|| current.name.clone()),
        author_avatar_url: author.avatar_url.unwrap_or_default(),
        author_html_url: author.url.unwrap_or_default(),
        latest_release_html_url: release.url.unwrap_or_default(),
        latest_release_name: release.name.unwrap_or_default(),
        latest_release_timestamp: release.published_at.unwrap_or_default(),
    }
}
