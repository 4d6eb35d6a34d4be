//! Update notifications raised by the periodic monitor

use crate::config::NotificationConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Tells the user that repositories have new releases
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, update_count: usize);
}

/// Writes a log record per notification
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, update_count: usize) {
        info!("{} repositories have new releases", update_count);
    }
}

/// Used when notifications are turned off
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn notify(&self, update_count: usize) {
        debug!(
            "Notifications disabled, not announcing {} updated repositories",
            update_count
        );
    }
}

/// Runs an external program such as `notify-send`
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    /// Build from `[program, args...]`; `{count}` in any argument is replaced
    /// with the number of updated repositories
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("Notification command is empty"))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn render_args(&self, update_count: usize) -> Vec<String> {
        let count = update_count.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{count}", &count))
            .collect()
    }

    async fn run(&self, update_count: usize) -> Result<()> {
        let status = Command::new(&self.program)
            .args(self.render_args(update_count))
            .status()
            .await
            .with_context(|| format!("Failed to run notification command '{}'", self.program))?;

        if !status.success() {
            return Err(anyhow!(
                "Notification command '{}' exited with {}",
                self.program,
                status
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, update_count: usize) {
        match self.run(update_count).await {
            Ok(()) => debug!("Notification command '{}' succeeded", self.program),
            Err(e) => warn!("{:#}", e),
        }
    }
}

/// Pick the notifier the configuration asks for
pub fn from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    if !config.enabled {
        return Ok(Arc::new(SilentNotifier));
    }
    if config.command.is_empty() {
        return Ok(Arc::new(LogNotifier));
    }
    Ok(Arc::new(CommandNotifier::new(&config.command)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_count_substituted() {
        let notifier =
            CommandNotifier::new(&command(&["notify-send", "releasewatch", "{count} new releases"]))
                .unwrap();
        assert_eq!(
            notifier.render_args(3),
            vec!["releasewatch".to_string(), "3 new releases".to_string()]
        );
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(CommandNotifier::new(&[]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runs() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("count");
        let script = format!("echo {{count}} > {}", marker.display());

        let notifier = CommandNotifier::new(&command(&["sh", "-c", &script])).unwrap();
        notifier.run(7).await.unwrap();

        let written = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(written.trim(), "7");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_is_an_error() {
        let notifier = CommandNotifier::new(&command(&["false"])).unwrap();
        assert!(notifier.run(1).await.is_err());
        // The trait method only logs
        notifier.notify(1).await;
    }

    #[test]
    fn test_from_config() {
        let mut config = NotificationConfig::default();
        assert!(from_config(&config).is_ok());

        config.command = command(&["notify-send", "{count}"]);
        assert!(from_config(&config).is_ok());

        config.enabled = false;
        config.command.clear();
        assert!(from_config(&config).is_ok());
    }
}
