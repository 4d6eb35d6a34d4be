use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use releasewatch::auth;
use releasewatch::config::LoggingConfig;
use releasewatch::daemon;
use releasewatch::settings::{self, MonitorInterval};
use releasewatch::store::{PageQuery, DEFAULT_PAGE_SIZE};
use releasewatch::tracker::{AddOutcome, DeleteOutcome, ExportOutcome, ImportOutcome, UpdateOutcome};
use releasewatch::{App, Config, Daemon, JobResult, SortOrder};

#[derive(Parser)]
#[command(name = "releasewatch")]
#[command(about = "Watch GitHub repositories for new releases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking a repository (owner/name or GitHub URL)
    Add { repository: String },

    /// Stop tracking a repository
    Remove { repository: String },

    /// List tracked repositories
    List {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Check the listed page of repositories for new releases
    Refresh {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Run one full release check in the foreground
    Check,

    /// Import repositories from a JSON export
    Import { file: PathBuf },

    /// Export tracked repositories as JSON
    Export { file: PathBuf },

    /// Show or change the monitor interval
    Interval {
        #[command(subcommand)]
        interval_command: Option<IntervalCommands>,
    },

    /// Manage authentication
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Run as daemon
    Daemon {
        #[command(subcommand)]
        daemon_command: DaemonCommands,
    },
}

#[derive(clap::Args)]
struct PageArgs {
    /// Sort order
    #[arg(long, value_enum, default_value_t = SortOrder::OwnerAsc)]
    sort: SortOrder,

    /// Only repositories whose owner or name contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Repositories per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    per_page: usize,
}

impl PageArgs {
    fn query(&self) -> PageQuery {
        let limit = self.per_page.max(1);
        PageQuery {
            sort: self.sort,
            filter: self.filter.clone(),
            offset: self.page.saturating_sub(1).saturating_mul(limit),
            limit,
        }
    }
}

#[derive(Subcommand)]
enum IntervalCommands {
    /// Show the current interval
    Show,

    /// Change the interval (15m, 30m, 1h, 2h, 4h, 8h, 16h or 1d)
    Set { interval: MonitorInterval },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Set up authentication
    Setup,

    /// Show and verify the current authentication
    Status,
}

#[derive(Subcommand)]
enum DaemonCommands {
    /// Start the daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,
    },

    /// Stop running daemon
    Stop,

    /// Show daemon status
    Status,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config.as_deref())?;

    let background = matches!(
        cli.command,
        Commands::Daemon {
            daemon_command: DaemonCommands::Start { foreground: false }
        }
    );

    if background && !start_background(&config)? {
        return Ok(ExitCode::FAILURE);
    }

    init_logging(&config.logging, cli.verbose, background)?;
    info!("Starting releasewatch v{}", env!("CARGO_PKG_VERSION"));

    // Built by hand so that daemonizing above happens before any runtime
    // thread exists
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(cli.command, config))
}

/// Initialize logging from configuration and verbosity
fn init_logging(logging: &LoggingConfig, verbose: bool, background: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Background output goes to the log file
    let ansi = logging.color && !background;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "full" {
        registry.with(fmt::layer().with_ansi(ansi)).init();
    } else {
        registry.with(fmt::layer().compact().with_ansi(ansi)).init();
    }

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Detach into the background. Returns false if a daemon is already running.
fn start_background(config: &Config) -> Result<bool> {
    println!("🚀 Starting releasewatch daemon...");

    if let Some(pid) = daemon::running_pid(config)? {
        println!("⚠️  Daemon is already running (PID {})", pid);
        println!("   Use 'releasewatch daemon stop' to stop it first");
        return Ok(false);
    }

    #[cfg(unix)]
    {
        println!("✅ Daemon starting in background");
        println!("   PID file: {}", config.monitor.pid_file);
        println!("   Log file: {}", config.monitor.log_file);
        daemon::daemonize(config)?;
        Ok(true)
    }

    #[cfg(not(unix))]
    {
        println!("❌ Background daemon mode not supported on this platform");
        println!("   Use --foreground to run in foreground mode");
        Ok(false)
    }
}

async fn run(command: Commands, config: Config) -> Result<ExitCode> {
    let app = App::new(config)?;
    match command {
        Commands::Add { repository } => cmd_add(&app, &repository).await,
        Commands::Remove { repository } => cmd_remove(&app, &repository).await,
        Commands::List { page } => cmd_list(&app, &page).await,
        Commands::Refresh { page } => cmd_refresh(&app, &page).await,
        Commands::Check => cmd_check(&app).await,
        Commands::Import { file } => cmd_import(&app, &file).await,
        Commands::Export { file } => cmd_export(&app, &file).await,
        Commands::Interval { interval_command } => cmd_interval(&app, interval_command),
        Commands::Daemon { daemon_command } => cmd_daemon(daemon_command, &app).await,
        Commands::Auth { auth_command } => cmd_auth(auth_command, &app.config).await,
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Split `owner/name`, also accepting a GitHub URL
fn parse_repository_arg(input: &str) -> Option<(String, String)> {
    let trimmed = input.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let path = ["https://github.com/", "http://github.com/", "github.com/"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);

    let (owner, name) = path.split_once('/')?;
    if name.contains('/') {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}

/// Start tracking a repository
async fn cmd_add(app: &App, repository: &str) -> Result<ExitCode> {
    let (owner, name) = parse_repository_arg(repository).unwrap_or_default();

    match app.tracker().add(&owner, &name).await {
        AddOutcome::Success(repo) => {
            println!("✅ Now tracking {}", repo.full_name());
            if repo.has_release() {
                println!(
                    "   Latest release: {} ({})",
                    repo.latest_release_name, repo.latest_release_timestamp
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        AddOutcome::Invalid => {
            println!("❌ '{}' is not a valid owner/name", repository);
            Ok(ExitCode::FAILURE)
        }
        AddOutcome::NotFound => {
            println!(
                "❌ {}/{} was not found, is not accessible or has no releases",
                owner, name
            );
            Ok(ExitCode::FAILURE)
        }
        AddOutcome::Failure => {
            println!("❌ Could not add {}/{}", owner, name);
            println!("   Check authentication with: releasewatch auth status");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Stop tracking a repository
async fn cmd_remove(app: &App, repository: &str) -> Result<ExitCode> {
    let Some((owner, name)) = parse_repository_arg(repository) else {
        println!("❌ '{}' is not a valid owner/name", repository);
        return Ok(ExitCode::FAILURE);
    };

    let Some(repo) = app.db.find_repository(&owner, &name)? else {
        println!("⚠️  {}/{} is not tracked", owner, name);
        return Ok(ExitCode::FAILURE);
    };

    match app.tracker().delete(&repo).await {
        DeleteOutcome::Success => {
            println!("✅ Stopped tracking {}", repo.full_name());
            Ok(ExitCode::SUCCESS)
        }
        DeleteOutcome::Failure => {
            println!("❌ Could not remove {}", repo.full_name());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print one page of tracked repositories
async fn cmd_list(app: &App, page: &PageArgs) -> Result<ExitCode> {
    let query = page.query();
    let listing = app.tracker().page(&query).await?;

    if listing.total == 0 {
        println!("No repositories tracked");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Repositories ({}):", listing.total);
    for repo in &listing.items {
        if repo.has_release() {
            println!(
                "  📦 {}  {}  ({})",
                repo.full_name(),
                repo.latest_release_name,
                repo.latest_release_timestamp
            );
        } else {
            println!("  📦 {}  (no release)", repo.full_name());
        }
    }

    let pages = listing.total.div_ceil(query.limit);
    println!("Page {} of {}", page.page.max(1), pages);
    if listing.has_more() {
        println!("   Next page: --page {}", page.page.max(1).saturating_add(1));
    }
    Ok(ExitCode::SUCCESS)
}

/// Check one page of repositories for new releases
async fn cmd_refresh(app: &App, page: &PageArgs) -> Result<ExitCode> {
    let tracker = app.tracker();
    let listing = tracker.page(&page.query()).await?;

    if listing.items.is_empty() {
        println!("No repositories to refresh");
        return Ok(ExitCode::SUCCESS);
    }

    println!("🔍 Checking {} repositories...", listing.items.len());
    match tracker.refresh(&listing.items).await {
        UpdateOutcome::Success(count) => {
            println!("🎉 {} repositories have new releases", count);
            Ok(ExitCode::SUCCESS)
        }
        UpdateOutcome::Latest => {
            println!("✅ All up to date");
            Ok(ExitCode::SUCCESS)
        }
        UpdateOutcome::Failure => {
            println!("❌ Refresh failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Run the periodic job once
async fn cmd_check(app: &App) -> Result<ExitCode> {
    println!("🔍 Checking all tracked repositories...");
    let result = app.monitor()?.run_once().await;
    match result {
        JobResult::Success => println!("✅ Release check complete"),
        JobResult::Failure => println!("❌ Release check failed"),
    }
    Ok(exit_code(result == JobResult::Success))
}

async fn cmd_import(app: &App, file: &Path) -> Result<ExitCode> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    match app.tracker().import(&json).await {
        ImportOutcome::Success(count) => {
            println!("✅ Imported {} repositories", count);
            Ok(ExitCode::SUCCESS)
        }
        ImportOutcome::Failure => {
            println!("❌ Import failed: {} has no usable repositories", file.display());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn cmd_export(app: &App, file: &Path) -> Result<ExitCode> {
    let ExportOutcome::Success(json) = app.tracker().export().await else {
        println!("❌ Nothing to export");
        return Ok(ExitCode::FAILURE);
    };

    if let Err(e) = std::fs::write(file, json) {
        // Do not leave a truncated export behind
        if file.exists() {
            if let Err(remove_error) = std::fs::remove_file(file) {
                warn!("Failed to remove partial export: {}", remove_error);
            }
        }
        return Err(e).with_context(|| format!("Failed to write {}", file.display()));
    }

    println!("✅ Exported to {}", file.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_interval(app: &App, interval_command: Option<IntervalCommands>) -> Result<ExitCode> {
    match interval_command.unwrap_or(IntervalCommands::Show) {
        IntervalCommands::Show => {
            let interval = settings::monitor_interval(&app.db)?;
            println!("Monitor interval: {}", interval);
        }
        IntervalCommands::Set { interval } => {
            settings::set_monitor_interval(&app.db, interval)?;
            println!("✅ Monitor interval set to {}", interval);
            if daemon::running_pid(&app.config)?.is_some() {
                println!("   The running daemon uses it after its current wait");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Handle authentication commands
async fn cmd_auth(auth_command: AuthCommands, config: &Config) -> Result<ExitCode> {
    match auth_command {
        AuthCommands::Setup => auth::setup_authentication().await?,
        AuthCommands::Status => auth::test_authentication(config).await?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Handle daemon commands
async fn cmd_daemon(daemon_command: DaemonCommands, app: &App) -> Result<ExitCode> {
    let config = app.config.as_ref();

    match daemon_command {
        DaemonCommands::Start { foreground } => {
            if foreground {
                if let Some(pid) = daemon::running_pid(config)? {
                    println!("⚠️  Daemon is already running (PID {})", pid);
                    return Ok(ExitCode::FAILURE);
                }
                println!("🖥️  Running in foreground mode (Ctrl+C to stop)");
            }

            let daemon = Daemon::new(config, app.db.clone(), app.monitor()?);
            daemon.run().await?;
        }

        DaemonCommands::Stop => {
            println!("🛑 Stopping releasewatch daemon...");

            if !daemon::stop(config)? {
                println!("⚠️  No daemon appears to be running");
                return Ok(ExitCode::FAILURE);
            }

            println!("✅ Daemon stop signal sent");
        }

        DaemonCommands::Status => {
            println!("📊 releasewatch Daemon Status");

            let status = daemon::status(config, &app.db)?;
            match status.pid {
                Some(pid) => {
                    println!("   🟢 Status: Running (PID {})", pid);
                    println!("   🔄 Check interval: {}", status.interval);
                    if !config.monitor.log_file.is_empty() {
                        println!("   📄 Log file: {}", config.monitor.log_file);
                    }
                }
                None => {
                    println!("   🔴 Status: Not running");
                    println!("   🔄 Check interval: {}", status.interval);
                    println!("   💡 Use 'releasewatch daemon start' to start the daemon");
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository_arg() {
        assert_eq!(
            parse_repository_arg("rust-lang/rust"),
            Some(("rust-lang".to_string(), "rust".to_string()))
        );
        assert_eq!(
            parse_repository_arg("https://github.com/tokio-rs/tokio.git"),
            Some(("tokio-rs".to_string(), "tokio".to_string()))
        );
        assert_eq!(parse_repository_arg("rust"), None);
        assert_eq!(parse_repository_arg("a/b/c"), None);
    }

    #[test]
    fn test_page_args_offset() {
        let args = PageArgs {
            sort: SortOrder::NameAsc,
            filter: None,
            page: 3,
            per_page: 10,
        };
        let query = args.query();
        assert_eq!(query.offset, 20);
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn test_page_args_huge_values_saturate() {
        let args = PageArgs {
            sort: SortOrder::OwnerAsc,
            filter: None,
            page: usize::MAX,
            per_page: usize::MAX,
        };
        let query = args.query();
        assert_eq!(query.offset, usize::MAX);
        assert_eq!(query.limit, usize::MAX);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
