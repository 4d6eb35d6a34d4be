//! releasewatch - GitHub release monitoring daemon
//!
//! releasewatch keeps the latest release of every repository you track,
//! checks GitHub for newer releases on a schedule and tells you when some
//! were published.
//!
//! ## Modules
//!
//! - [`rate_limit`]: local copy of the GraphQL rate budget
//! - [`github`] and [`fetcher`]: release queries against the GraphQL API
//! - [`reconcile`]: partitioned fetch, diff and persist of release state
//! - [`store`] and [`state`]: the repository store contract and its SQLite
//!   implementation
//! - [`monitor`] and [`daemon`]: the periodic background check
//! - [`tracker`]: add, remove, refresh, import and export on user request
//! - [`auth`], [`notify`], [`settings`], [`transfer`], [`config`]: supporting
//!   collaborators

pub mod app;
pub mod auth;
pub mod config;
pub mod daemon;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod rate_limit;
pub mod reconcile;
pub mod settings;
pub mod state;
pub mod store;
pub mod tracker;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use app::App;
pub use config::Config;
pub use daemon::Daemon;
pub use model::{SortOrder, TrackedRepository};
pub use monitor::{JobResult, PeriodicMonitor};
pub use rate_limit::RateLimiter;
pub use reconcile::{ReconcileReport, ReconciliationEngine};
pub use state::StateDb;
pub use tracker::Tracker;
