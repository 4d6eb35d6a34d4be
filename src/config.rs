use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::github::DEFAULT_GRAPHQL_URL;
use crate::reconcile::DEFAULT_PARTITION_SIZE;
use crate::state::StateDb;

/// Main configuration structure for releasewatch
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// GitHub authentication and endpoint settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Local state database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Periodic monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Update notifications
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token"

    /// GraphQL endpoint
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Database configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite file location
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Periodic monitor configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    /// Repositories per batched release query
    #[serde(default = "default_partition_size")]
    pub partition_size: usize,

    /// PID file location
    #[serde(default = "default_pid_file")]
    pub pid_file: String,

    /// Log file location
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// Notification configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotificationConfig {
    /// Notify when the periodic monitor finds new releases
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Program and arguments to run; `{count}` is replaced by the number of
    /// updated repositories. Empty means log only.
    #[serde(default)]
    pub command: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_graphql_url() -> String {
    DEFAULT_GRAPHQL_URL.to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_partition_size() -> usize {
    DEFAULT_PARTITION_SIZE
}
fn default_database_path() -> String {
    StateDb::default_db_path().to_string_lossy().into_owned()
}
fn default_pid_file() -> String {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        format!("{}/releasewatch.pid", runtime_dir)
    } else {
        "/tmp/releasewatch.pid".to_string()
    }
}

fn default_log_file() -> String {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        format!("{}/releasewatch/daemon.log", data_home)
    } else if let Ok(home) = std::env::var("HOME") {
        format!("{}/.local/share/releasewatch/daemon.log", home)
    } else {
        "/tmp/releasewatch-daemon.log".to_string()
    }
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            graphql_url: default_graphql_url(),
            timeout: default_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            partition_size: default_partition_size(),
            pid_file: default_pid_file(),
            log_file: default_log_file(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            command: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_or_create(&config_path)
    }

    /// Load configuration from `path`, writing the defaults there first if the
    /// file does not exist yet
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            // Create default config
            let mut config = Self::default();

            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            // Save default config
            config.save(config_path)?;
            config.expand_paths()?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("releasewatch").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.database.path = shellexpand::full(&self.database.path)
            .context("Failed to expand database path")?
            .into_owned();

        self.monitor.pid_file = shellexpand::full(&self.monitor.pid_file)
            .context("Failed to expand pid_file path")?
            .into_owned();

        self.monitor.log_file = shellexpand::full(&self.monitor.log_file)
            .context("Failed to expand log_file path")?
            .into_owned();

        Ok(())
    }

    /// Reject values the rest of the program cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.monitor.partition_size == 0 {
            anyhow::bail!("monitor.partition_size must be at least 1");
        }
        if !matches!(self.github.auth_method.as_str(), "auto" | "gh_cli" | "token") {
            anyhow::bail!(
                "Unknown github.auth_method '{}' (expected auto, gh_cli or token)",
                self.github.auth_method
            );
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.database.path)
    }
}
