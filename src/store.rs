//! Repository store contract

use crate::error::StoreError;
use crate::model::{SortOrder, TrackedRepository};
use async_trait::async_trait;

/// Default number of rows per page when listing
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A request for one page of tracked repositories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub sort: SortOrder,
    /// Case-insensitive substring matched against owner or name
    pub filter: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            sort: SortOrder::default(),
            filter: None,
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of tracked repositories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<TrackedRepository>,
    pub offset: usize,
    /// Rows matching the filter across all pages
    pub total: usize,
}

impl Page {
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len()) < self.total
    }
}

/// Persistent storage of tracked repositories.
///
/// Implementations never panic on I/O problems; they log and return
/// [`StoreError`]. `update` must be all-or-nothing for the batch it is given.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Every tracked repository, in no particular order
    async fn get_all(&self) -> Result<Vec<TrackedRepository>, StoreError>;

    /// A sorted, filtered page
    async fn get_page(&self, query: &PageQuery) -> Result<Page, StoreError>;

    /// Insert or replace repositories by id
    async fn insert(&self, batch: &[TrackedRepository]) -> Result<(), StoreError>;

    /// Overwrite existing repositories by id, atomically
    async fn update(&self, batch: &[TrackedRepository]) -> Result<(), StoreError>;

    /// Remove one repository
    async fn delete(&self, repository: &TrackedRepository) -> Result<(), StoreError>;
}
