//! Common test utilities and helpers for releasewatch tests
#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use std::path::PathBuf;
use std::process::{Command, Output};

/// Isolated config, database and runtime files for one CLI test
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_graphql_url("http://127.0.0.1:9/graphql")
    }

    /// Point the GraphQL client at `graphql_url`, usually a mock server
    pub fn with_graphql_url(graphql_url: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().display().to_string();

        let config = format!(
            r#"
github:
  auth_method: "token"
  graphql_url: "{graphql_url}"
  timeout: 5
database:
  path: "{root}/data/state.db"
monitor:
  partition_size: 10
  pid_file: "{root}/run/releasewatch.pid"
  log_file: "{root}/data/daemon.log"
notifications:
  enabled: false
logging:
  level: "warn"
  color: false
"#
        );

        let config_file = temp_dir.child("config.yml");
        config_file
            .write_str(&config)
            .expect("Failed to write test config");

        Self {
            config_path: config_file.path().to_path_buf(),
            temp_dir,
        }
    }

    /// The binary with this environment's config and no ambient credentials
    pub fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_releasewatch"));
        command
            .arg("--config")
            .arg(&self.config_path)
            .env_remove("GITHUB_TOKEN")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.temp_dir.path())
            .env("XDG_DATA_HOME", self.temp_dir.path());
        command
    }

    /// Run with the given arguments
    pub fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("Failed to execute releasewatch")
    }

    /// Run with a token in the environment
    pub fn run_with_token(&self, args: &[&str]) -> Output {
        self.command()
            .env("GITHUB_TOKEN", "ghp_integration_test")
            .args(args)
            .output()
            .expect("Failed to execute releasewatch")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Write `content` to a file in the environment and return its path
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let file = self.temp_dir.child(name);
        file.write_str(content).expect("Failed to write test file");
        file.path().to_path_buf()
    }

    /// Import the standard two-repository fixture
    pub fn seed(&self) {
        let file = self.write_file("seed.json", SEED_REPOSITORIES);
        let output = self.run(&["import", file.to_str().unwrap()]);
        assert!(output.status.success(), "seed import failed: {}", stdout(&output));
    }
}

/// Two tracked repositories with known releases
pub const SEED_REPOSITORIES: &str = r#"[
    {
        "id": "R_tokio",
        "owner": "tokio-rs",
        "name": "tokio",
        "authorAvatarUrl": "https://avatars.githubusercontent.com/u/1",
        "authorHtmlUrl": "https://github.com/carllerche",
        "latestReleaseHtmlUrl": "https://github.com/tokio-rs/tokio/releases/tag/tokio-1.38.0",
        "latestReleaseName": "Tokio v1.38.0",
        "latestReleaseTimestamp": "2024-05-30T12:00:00Z"
    },
    {
        "id": "R_rust",
        "owner": "rust-lang",
        "name": "rust",
        "authorAvatarUrl": "https://avatars.githubusercontent.com/u/2",
        "authorHtmlUrl": "https://github.com/rust-lang",
        "latestReleaseHtmlUrl": "https://github.com/rust-lang/rust/releases/tag/1.79.0",
        "latestReleaseName": "Rust 1.79.0",
        "latestReleaseTimestamp": "2024-06-13T15:00:00Z"
    }
]"#;

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}

pub fn assert_contains_any(text: &str, expected: &[&str]) {
    let found = expected.iter().any(|item| text.contains(item));
    assert!(
        found,
        "Expected text to contain at least one of {:?}, but it didn't. Text: {}",
        expected,
        text
    );
}
