//! Error types for release fetching, persistence and reconciliation

use thiserror::Error;

/// Failures talking to the GitHub GraphQL endpoint
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read
    #[error("GraphQL request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status
    #[error("GraphQL request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape
    #[error("Failed to parse GraphQL response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures reported by a repository store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The targeted repository does not exist
    #[error("Repository {0} is not tracked")]
    NotTracked(String),

    #[error("Store is unavailable: {0}")]
    Unavailable(String),
}

/// Why a reconciliation run was aborted
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// `fetch_many` returned nothing for this partition (rate limited,
    /// transport failure or GraphQL errors)
    #[error("Fetching releases failed for partition {partition}")]
    Fetch { partition: usize },

    /// Writing the partition back to the store failed
    #[error("Persisting partition {partition} failed: {source}")]
    Persist {
        partition: usize,
        #[source]
        source: StoreError,
    },
}
