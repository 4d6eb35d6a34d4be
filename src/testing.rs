//! In-process fakes shared by the unit tests

use crate::error::StoreError;
use crate::fetcher::ReleaseSource;
use crate::model::{is_newer_release, TrackedRepository};
use crate::state::StateDb;
use crate::store::{Page, PageQuery, RepositoryStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn repo(id: &str, timestamp: &str) -> TrackedRepository {
    TrackedRepository {
        id: id.to_string(),
        owner: "owner".to_string(),
        name: format!("repo-{}", id.to_lowercase()),
        author_avatar_url: "https://avatars.example/old".to_string(),
        author_html_url: "https://github.com/old".to_string(),
        latest_release_html_url: format!("https://github.com/owner/{}/releases/old", id),
        latest_release_name: "old".to_string(),
        latest_release_timestamp: timestamp.to_string(),
    }
}

/// Release source answering from a fixed table and recording each batch
#[derive(Default)]
pub struct ScriptedSource {
    releases: HashMap<String, String>,
    known: HashMap<(String, String), TrackedRepository>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedSource {
    /// Report `timestamp` as the latest release of repository `id`
    pub fn with_release(mut self, id: &str, timestamp: &str) -> Self {
        self.releases.insert(id.to_string(), timestamp.to_string());
        self
    }

    /// Make `fetch_one` find this repository
    pub fn with_repository(mut self, repository: TrackedRepository) -> Self {
        self.known.insert(
            (repository.owner.clone(), repository.name.clone()),
            repository,
        );
        self
    }

    /// Ids of every `fetch_many` batch, in call order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleaseSource for ScriptedSource {
    async fn fetch_one(&self, owner: &str, name: &str, _token: &str) -> Option<TrackedRepository> {
        self.known
            .get(&(owner.to_string(), name.to_string()))
            .cloned()
    }

    async fn fetch_many(
        &self,
        repositories: &[TrackedRepository],
        _token: &str,
    ) -> Option<Vec<TrackedRepository>> {
        self.calls
            .lock()
            .unwrap()
            .push(repositories.iter().map(|r| r.id.clone()).collect());

        Some(
            repositories
                .iter()
                .map(|r| match self.releases.get(&r.id) {
                    Some(ts) if is_newer_release(ts, &r.latest_release_timestamp) => {
                        TrackedRepository {
                            latest_release_name: format!("release {}", ts),
                            latest_release_timestamp: ts.clone(),
                            ..r.clone()
                        }
                    }
                    _ => r.clone(),
                })
                .collect(),
        )
    }
}

/// SQLite store whose n-th `update` call (0-based) fails
pub struct FailingStore {
    inner: StateDb,
    fail_on: usize,
    updates: AtomicUsize,
}

impl FailingStore {
    pub fn new(seed: &[TrackedRepository], fail_on: usize) -> Self {
        let inner = StateDb::open_in_memory().unwrap();
        inner.insert_repositories(seed).unwrap();
        Self {
            inner,
            fail_on,
            updates: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &StateDb {
        &self.inner
    }
}

#[async_trait]
impl RepositoryStore for FailingStore {
    async fn get_all(&self) -> Result<Vec<TrackedRepository>, StoreError> {
        self.inner.get_all().await
    }

    async fn get_page(&self, query: &PageQuery) -> Result<Page, StoreError> {
        self.inner.get_page(query).await
    }

    async fn insert(&self, batch: &[TrackedRepository]) -> Result<(), StoreError> {
        self.inner.insert(batch).await
    }

    async fn update(&self, batch: &[TrackedRepository]) -> Result<(), StoreError> {
        if self.updates.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.update(batch).await
    }

    async fn delete(&self, repository: &TrackedRepository) -> Result<(), StoreError> {
        self.inner.delete(repository).await
    }
}
