//! Daemon Infrastructure - background service running the periodic monitor
//!
//! The daemon runs one release check right away, then sleeps for the
//! persisted monitor interval and repeats. The interval is read again before
//! every sleep so `releasewatch interval set` takes effect without a restart.
//! SIGINT and SIGTERM stop the loop; a check in progress is dropped, and
//! partitions it already committed stay committed.

use crate::config::Config;
use crate::monitor::{JobResult, PeriodicMonitor};
use crate::settings::{self, MonitorInterval};
use crate::state::StateDb;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Daemon state and control
pub struct Daemon {
    monitor: PeriodicMonitor,
    db: Arc<StateDb>,
    shutdown_sender: broadcast::Sender<()>,
    pid_file_path: Option<PathBuf>,
    stats: Arc<DaemonStats>,
}

/// Counters for completed monitor jobs
#[derive(Debug, Default)]
pub struct DaemonStats {
    successful_runs: AtomicU64,
    failed_runs: AtomicU64,
}

impl DaemonStats {
    fn record(&self, result: JobResult) {
        match result {
            JobResult::Success => self.successful_runs.fetch_add(1, Ordering::SeqCst),
            JobResult::Failure => self.failed_runs.fetch_add(1, Ordering::SeqCst),
        };
    }

    pub fn successful_runs(&self) -> u64 {
        self.successful_runs.load(Ordering::SeqCst)
    }

    pub fn failed_runs(&self) -> u64 {
        self.failed_runs.load(Ordering::SeqCst)
    }
}

/// What `daemon status` reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub pid: Option<u32>,
    pub interval: MonitorInterval,
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new(config: &Config, db: Arc<StateDb>, monitor: PeriodicMonitor) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);

        let pid_file_path = if !config.monitor.pid_file.is_empty() {
            Some(PathBuf::from(&config.monitor.pid_file))
        } else {
            None
        };

        Self {
            monitor,
            db,
            shutdown_sender,
            pid_file_path,
            stats: Arc::new(DaemonStats::default()),
        }
    }

    /// Start the daemon in the foreground
    pub async fn run(&self) -> Result<()> {
        info!("Starting releasewatch daemon");

        // Write PID file if configured
        self.write_pid_file().context("Failed to write PID file")?;

        // Subscribe before the signal task can send
        let shutdown_receiver = self.shutdown_sender.subscribe();

        let shutdown_sender = self.shutdown_sender.clone();
        let signal_task = tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("Shutdown signal received, stopping daemon...");
            let _ = shutdown_sender.send(());
        });

        let result = self.daemon_loop(shutdown_receiver).await;

        signal_task.abort();
        self.cleanup().context("Failed to cleanup daemon")?;

        result
    }

    /// Main daemon loop - runs the monitor job, then sleeps for the interval
    async fn daemon_loop(&self, mut shutdown_receiver: broadcast::Receiver<()>) -> Result<()> {
        loop {
            debug!("Starting scheduled release check");

            let result = tokio::select! {
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown requested during release check");
                    break;
                }
                result = self.monitor.run_once() => result,
            };

            self.stats.record(result);
            match result {
                JobResult::Success => info!("Release check succeeded"),
                JobResult::Failure => warn!("Release check failed"),
            }

            let interval = self.current_interval();
            info!("Next release check in {}", interval);

            tokio::select! {
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown signal received in daemon loop");
                    break;
                }
                _ = tokio::time::sleep(interval.as_duration()) => {}
            }
        }

        info!("Daemon loop exiting");
        Ok(())
    }

    fn current_interval(&self) -> MonitorInterval {
        settings::monitor_interval(&self.db).unwrap_or_else(|e| {
            error!("Failed to read monitor interval, using default: {}", e);
            MonitorInterval::default()
        })
    }

    /// Write PID file for daemon process management
    fn write_pid_file(&self) -> Result<()> {
        if let Some(pid_file) = &self.pid_file_path {
            let pid = std::process::id();

            // Create parent directories if they don't exist
            if let Some(parent) = pid_file.parent() {
                fs::create_dir_all(parent).context("Failed to create PID file directory")?;
            }

            fs::write(pid_file, pid.to_string()).context("Failed to write PID file")?;

            info!("PID file written: {} (PID: {})", pid_file.display(), pid);
        }

        Ok(())
    }

    /// Remove PID file and perform cleanup
    fn cleanup(&self) -> Result<()> {
        if let Some(pid_file) = &self.pid_file_path {
            if pid_file.exists() {
                fs::remove_file(pid_file).context("Failed to remove PID file")?;
                info!("PID file removed: {}", pid_file.display());
            }
        }

        info!(
            "Daemon cleanup completed ({} successful, {} failed checks)",
            self.stats.successful_runs(),
            self.stats.failed_runs()
        );
        Ok(())
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("Failed to listen for Ctrl+C: {}", e);
                        }
                        debug!("SIGINT received");
                    }
                    _ = terminate.recv() => debug!("SIGTERM received"),
                }
                return;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        // Without a signal source the daemon only stops when killed
        std::future::pending::<()>().await;
    }
    debug!("Ctrl+C received");
}

/// Detach from the terminal (Unix platforms).
///
/// Must run before the async runtime is started: forking a process that
/// already owns runtime threads leaves the child without them.
#[cfg(unix)]
pub fn daemonize(config: &Config) -> Result<()> {
    use daemonize::Daemonize;

    let mut daemonize = Daemonize::new().working_directory("/");

    if !config.monitor.pid_file.is_empty() {
        let pid_path = Path::new(&config.monitor.pid_file);
        if let Some(parent) = pid_path.parent() {
            fs::create_dir_all(parent).context("Failed to create PID file directory")?;
        }
        daemonize = daemonize.pid_file(pid_path);
    }

    if !config.monitor.log_file.is_empty() {
        let log_path = Path::new(&config.monitor.log_file);
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent).context("Failed to create log directory")?;
        }
        let log_file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .context("Failed to create log file")?;
        daemonize = daemonize.stdout(log_file.try_clone()?).stderr(log_file);
    }

    daemonize.start().context("Failed to daemonize process")?;
    Ok(())
}

fn read_pid(pid_file: &Path) -> Result<u32> {
    let pid_str = fs::read_to_string(pid_file).context("Failed to read PID file")?;
    pid_str.trim().parse().context("Invalid PID in PID file")
}

/// Stop a running daemon by sending it SIGTERM
pub fn stop(config: &Config) -> Result<bool> {
    let Some(pid) = running_pid(config)? else {
        warn!("PID file not found, daemon may not be running");
        return Ok(false);
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .context("Failed to send SIGTERM to daemon process")?;
    }

    #[cfg(not(unix))]
    {
        warn!("Daemon stop not implemented for this platform");
        return Ok(false);
    }

    info!("Shutdown signal sent to daemon process {}", pid);
    Ok(true)
}

/// PID of the running daemon, if any. A stale PID file is removed.
pub fn running_pid(config: &Config) -> Result<Option<u32>> {
    if config.monitor.pid_file.is_empty() {
        return Ok(None);
    }

    let pid_file = PathBuf::from(&config.monitor.pid_file);
    if !pid_file.exists() {
        return Ok(None);
    }

    let pid = read_pid(&pid_file)?;

    // Check if process is actually running
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal;
        use nix::unistd::Pid;

        match signal::kill(Pid::from_raw(pid as i32), None) {
            Ok(_) => Ok(Some(pid)),
            Err(Errno::ESRCH) => {
                // Process doesn't exist, remove stale PID file
                let _ = fs::remove_file(&pid_file);
                Ok(None)
            }
            Err(_) => Ok(Some(pid)), // Assume running if we can't check
        }
    }

    #[cfg(not(unix))]
    {
        // On non-Unix platforms, just check if PID file exists
        Ok(Some(pid))
    }
}

pub fn status(config: &Config, db: &StateDb) -> Result<DaemonStatus> {
    Ok(DaemonStatus {
        pid: running_pid(config)?,
        interval: settings::monitor_interval(db)?,
    })
}
