//! GitHub authentication - token discovery and verification
//!
//! Tokens come from the GitHub CLI or from `GITHUB_TOKEN`, depending on
//! `github.auth_method`. They are handed to callers as plain strings and are
//! never written to logs.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use std::env;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Supplies the access token used for GitHub requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` when the user is not signed in
    async fn access_token(&self) -> Option<String>;
}

/// GitHub authentication strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
}

/// Token provider following the configured `auth_method`
#[derive(Debug, Clone)]
pub struct GitHubAuth {
    auth_method: String,
}

impl GitHubAuth {
    pub fn new(config: &Config) -> Self {
        Self {
            auth_method: config.github.auth_method.clone(),
        }
    }

    /// Detect and obtain GitHub authentication
    pub async fn detect(&self) -> Result<(AuthStrategy, String)> {
        match self.auth_method.as_str() {
            "auto" => {
                // Try GitHub CLI first, then environment token
                if let Ok(token) = Self::try_github_cli().await {
                    Ok((AuthStrategy::GitHubCLI, token))
                } else if let Ok(token) = Self::try_environment_token() {
                    Ok((AuthStrategy::EnvironmentToken, token))
                } else {
                    Err(anyhow!(
                        "No GitHub authentication found. Please either:\n\
                         1. Install and authenticate GitHub CLI: gh auth login\n\
                         2. Set GITHUB_TOKEN environment variable\n\
                         3. Run: releasewatch auth setup"
                    ))
                }
            }
            "gh_cli" => {
                let token = Self::try_github_cli()
                    .await
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                Ok((AuthStrategy::GitHubCLI, token))
            }
            "token" => {
                let token = Self::try_environment_token()
                    .context("GITHUB_TOKEN environment variable not found or invalid")?;
                Ok((AuthStrategy::EnvironmentToken, token))
            }
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    /// Try to get token from GitHub CLI
    async fn try_github_cli() -> Result<String> {
        debug!("Attempting GitHub CLI authentication");

        // Check if gh CLI is installed
        if !is_command_available("gh").await {
            return Err(anyhow!("GitHub CLI (gh) is not installed"));
        }

        let token_output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .await
            .context("Failed to get GitHub CLI token")?;

        if !token_output.status.success() {
            return Err(anyhow!(
                "GitHub CLI is not authenticated. Run: gh auth login"
            ));
        }

        let token = String::from_utf8(token_output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(anyhow!("GitHub CLI returned empty token"));
        }

        debug!("Successfully obtained token from GitHub CLI");
        Ok(token)
    }

    /// Try to get token from environment variable
    fn try_environment_token() -> Result<String> {
        debug!("Attempting environment variable authentication");

        let token = env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable not set")?;
        let token = token.trim().to_string();

        if token.is_empty() {
            return Err(anyhow!("GITHUB_TOKEN is empty"));
        }

        if !looks_like_github_token(&token) {
            warn!("GITHUB_TOKEN doesn't look like a GitHub token (expected a ghp_, gho_, ghs_ or github_pat_ prefix)");
        }

        debug!("Successfully found GITHUB_TOKEN environment variable");
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for GitHubAuth {
    async fn access_token(&self) -> Option<String> {
        match self.detect().await {
            Ok((strategy, token)) => {
                debug!("Using authentication strategy: {:?}", strategy);
                Some(token)
            }
            Err(e) => {
                warn!("No access token available: {:#}", e);
                None
            }
        }
    }
}

/// A fixed token, for embedding and tests
#[derive(Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Option<String> {
        let token = self.0.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

fn looks_like_github_token(token: &str) -> bool {
    ["ghp_", "gho_", "ghs_", "ghu_", "github_pat_"]
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

/// Check if a command is available in PATH
async fn is_command_available(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Fetch the login of the user the token belongs to
pub async fn verify_token(token: &str) -> Result<String> {
    let client = Octocrab::builder()
        .personal_token(token.to_string())
        .build()
        .context("Failed to create GitHub client")?;

    let user = client
        .current()
        .user()
        .await
        .context("Failed to get current user information. Check your authentication.")?;

    info!("Authenticated as GitHub user: {}", user.login);
    Ok(user.login)
}

/// Interactive authentication setup guide
pub async fn setup_authentication() -> Result<()> {
    println!("🔧 releasewatch Authentication Setup");
    println!();

    // Check if gh CLI is available
    if is_command_available("gh").await {
        println!("✅ GitHub CLI (gh) is installed");

        // Check if already authenticated
        if Command::new("gh")
            .args(["auth", "status"])
            .output()
            .await?
            .status
            .success()
        {
            println!("✅ GitHub CLI is already authenticated");
        } else {
            println!("🔄 GitHub CLI needs authentication");
            println!("Run: gh auth login");
        }
        return Ok(());
    }

    // Suggest GitHub CLI installation
    println!("❌ GitHub CLI (gh) is not installed");
    println!();
    println!("Recommended setup:");
    println!("1. Install GitHub CLI:");

    #[cfg(target_os = "macos")]
    println!("   brew install gh");

    #[cfg(target_os = "linux")]
    println!("   See: https://github.com/cli/cli/blob/trunk/docs/install_linux.md");

    #[cfg(target_os = "windows")]
    println!("   winget install --id GitHub.cli");

    println!();
    println!("2. Authenticate:");
    println!("   gh auth login");
    println!();
    println!("Alternative: Set GITHUB_TOKEN environment variable");
    println!("   export GITHUB_TOKEN=your_token_here");
    println!("   and set github.auth_method to \"token\" in the config file");

    Ok(())
}

/// Test current authentication
pub async fn test_authentication(config: &Config) -> Result<()> {
    println!("🔍 Testing GitHub authentication...");

    let auth = GitHubAuth::new(config);
    let (strategy, token) = match auth.detect().await {
        Ok(found) => found,
        Err(e) => {
            println!("❌ Authentication failed: {}", e);
            println!();
            println!("To fix this, run: releasewatch auth setup");
            return Ok(());
        }
    };

    match verify_token(&token).await {
        Ok(login) => {
            println!("✅ Authentication successful");
            println!("   Method: {:?}", strategy);
            println!("   Username: {}", login);
        }
        Err(e) => {
            println!("❌ Token was rejected: {:#}", e);
            println!();
            println!("To fix this, run: releasewatch auth setup");
        }
    }

    Ok(())
}
