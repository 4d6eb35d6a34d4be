//! State Management - SQLite-based persistence for tracked repositories and
//! settings
//!
//! The database is stored in XDG_DATA_HOME/releasewatch/state.db

use crate::error::StoreError;
use crate::model::TrackedRepository;
use crate::store::{Page, PageQuery, RepositoryStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

const REPOSITORY_COLUMNS: &str = "id, owner, name, author_avatar_url, author_html_url, \
     latest_release_html_url, latest_release_name, latest_release_timestamp";

/// State database manager
pub struct StateDb {
    conn: Mutex<Connection>,
}

impl StateDb {
    /// Open or create the state database at its default location
    pub fn open() -> Result<Self> {
        let db_path = Self::default_db_path();
        Self::open_at(&db_path)
    }

    /// Open or create the state database at a specific path
    pub fn open_at(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;

        info!("State database opened at {}", path.display());
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Get the default database path
    pub fn default_db_path() -> PathBuf {
        let data_dir = if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
            PathBuf::from(data_home)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".local/share")
        } else {
            PathBuf::from("/tmp")
        };

        data_dir.join("releasewatch").join("state.db")
    }

    /// A poisoned lock means a writer panicked mid-statement
    fn conn(&self) -> std::result::Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                r#"
                -- Tracked repositories
                CREATE TABLE IF NOT EXISTS repositories (
                    id TEXT PRIMARY KEY NOT NULL,
                    owner TEXT NOT NULL,
                    name TEXT NOT NULL,
                    author_avatar_url TEXT NOT NULL DEFAULT '',
                    author_html_url TEXT NOT NULL DEFAULT '',
                    latest_release_html_url TEXT NOT NULL DEFAULT '',
                    latest_release_name TEXT NOT NULL DEFAULT '',
                    latest_release_timestamp TEXT NOT NULL DEFAULT ''
                );

                -- Key/value settings
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_repos_owner ON repositories(owner COLLATE NOCASE);
                CREATE INDEX IF NOT EXISTS idx_repos_name ON repositories(name COLLATE NOCASE);
                "#,
            )
            .context("Failed to initialize database schema")?;

        debug!("Database schema initialized");
        Ok(())
    }

    fn row_to_repository(row: &Row<'_>) -> rusqlite::Result<TrackedRepository> {
        Ok(TrackedRepository {
            id: row.get(0)?,
            owner: row.get(1)?,
            name: row.get(2)?,
            author_avatar_url: row.get(3)?,
            author_html_url: row.get(4)?,
            latest_release_html_url: row.get(5)?,
            latest_release_name: row.get(6)?,
            latest_release_timestamp: row.get(7)?,
        })
    }

    // =========================================================================
    // Repository Operations
    // =========================================================================

    pub fn all_repositories(&self) -> std::result::Result<Vec<TrackedRepository>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM repositories", REPOSITORY_COLUMNS))?;

        let repos = stmt
            .query_map([], Self::row_to_repository)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(repos)
    }

    pub fn repository_page(&self, query: &PageQuery) -> std::result::Result<Page, StoreError> {
        let conn = self.conn()?;

        let pattern = query
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| format!("%{}%", escape_like(f)));

        let where_clause = if pattern.is_some() {
            "WHERE owner LIKE ?1 ESCAPE '\\' OR name LIKE ?1 ESCAPE '\\'"
        } else {
            ""
        };

        let total: i64 = match &pattern {
            Some(p) => conn.query_row(
                &format!("SELECT COUNT(*) FROM repositories {}", where_clause),
                params![p],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))?,
        };

        // Owner and name as tie breakers keep paging stable
        let sql = format!(
            "SELECT {} FROM repositories {} ORDER BY {}, owner COLLATE NOCASE, name COLLATE NOCASE, id LIMIT {} OFFSET {}",
            REPOSITORY_COLUMNS,
            where_clause,
            query.sort.sql(),
            query.limit.min(i64::MAX as usize),
            query.offset.min(i64::MAX as usize)
        );

        let mut stmt = conn.prepare(&sql)?;
        let items = match &pattern {
            Some(p) => stmt
                .query_map(params![p], Self::row_to_repository)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], Self::row_to_repository)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };

        Ok(Page {
            items,
            offset: query.offset,
            total: total as usize,
        })
    }

    pub fn get_repository(
        &self,
        id: &str,
    ) -> std::result::Result<Option<TrackedRepository>, StoreError> {
        let repo = self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM repositories WHERE id = ?1", REPOSITORY_COLUMNS),
                params![id],
                Self::row_to_repository,
            )
            .optional()?;
        Ok(repo)
    }

    /// Look up a repository by its owner/name pair (case-insensitive)
    pub fn find_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> std::result::Result<Option<TrackedRepository>, StoreError> {
        let repo = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM repositories WHERE owner = ?1 COLLATE NOCASE AND name = ?2 COLLATE NOCASE",
                    REPOSITORY_COLUMNS
                ),
                params![owner, name],
                Self::row_to_repository,
            )
            .optional()?;
        Ok(repo)
    }

    pub fn insert_repositories(
        &self,
        batch: &[TrackedRepository],
    ) -> std::result::Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO repositories ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                REPOSITORY_COLUMNS
            ))?;
            for repo in batch {
                stmt.execute(params![
                    repo.id,
                    repo.owner,
                    repo.name,
                    repo.author_avatar_url,
                    repo.author_html_url,
                    repo.latest_release_html_url,
                    repo.latest_release_name,
                    repo.latest_release_timestamp,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Inserted {} repositories", batch.len());
        Ok(())
    }

    /// Overwrite every repository in `batch` inside one transaction.
    ///
    /// Rows that are no longer tracked are skipped, matching an UPDATE on a
    /// missing key.
    pub fn update_repositories(
        &self,
        batch: &[TrackedRepository],
    ) -> std::result::Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                UPDATE repositories SET
                    owner = ?2,
                    name = ?3,
                    author_avatar_url = ?4,
                    author_html_url = ?5,
                    latest_release_html_url = ?6,
                    latest_release_name = ?7,
                    latest_release_timestamp = ?8
                WHERE id = ?1
                "#,
            )?;
            for repo in batch {
                updated += stmt.execute(params![
                    repo.id,
                    repo.owner,
                    repo.name,
                    repo.author_avatar_url,
                    repo.author_html_url,
                    repo.latest_release_html_url,
                    repo.latest_release_name,
                    repo.latest_release_timestamp,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Updated {} of {} repositories", updated, batch.len());
        Ok(())
    }

    pub fn delete_repository(&self, id: &str) -> std::result::Result<(), StoreError> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])?;

        if deleted == 0 {
            return Err(StoreError::NotTracked(id.to_string()));
        }

        debug!("Deleted repository {}", id);
        Ok(())
    }

    // =========================================================================
    // Settings Operations
    // =========================================================================

    pub fn get_setting(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put_setting(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        self.conn()?.execute(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = ?2
            "#,
            params![key, value],
        )?;
        debug!("Stored setting {} = {}", key, value);
        Ok(())
    }
}

/// Escape LIKE wildcards in user input
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Log a store failure where it happens and hand it on
fn logged<T>(
    operation: &str,
    result: std::result::Result<T, StoreError>,
) -> std::result::Result<T, StoreError> {
    if let Err(e) = &result {
        error!("Repository store {} failed: {}", operation, e);
    }
    result
}

#[async_trait]
impl RepositoryStore for StateDb {
    async fn get_all(&self) -> std::result::Result<Vec<TrackedRepository>, StoreError> {
        logged("read", self.all_repositories())
    }

    async fn get_page(&self, query: &PageQuery) -> std::result::Result<Page, StoreError> {
        logged("page read", self.repository_page(query))
    }

    async fn insert(&self, batch: &[TrackedRepository]) -> std::result::Result<(), StoreError> {
        logged("insert", self.insert_repositories(batch))
    }

    async fn update(&self, batch: &[TrackedRepository]) -> std::result::Result<(), StoreError> {
        logged("update", self.update_repositories(batch))
    }

    async fn delete(&self, repository: &TrackedRepository) -> std::result::Result<(), StoreError> {
        logged("delete", self.delete_repository(&repository.id))
    }
}
