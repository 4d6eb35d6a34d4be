//! JSON import and export of tracked repositories
//!
//! The format is a plain JSON array of repository objects using the camelCase
//! field names of [`TrackedRepository`].

use crate::model::{is_valid_owner, is_valid_repository_name, parse_timestamp, TrackedRepository};
use anyhow::{bail, Context, Result};

/// Parse an exported document
pub fn parse(json: &str) -> Result<Vec<TrackedRepository>> {
    let repositories: Vec<TrackedRepository> =
        serde_json::from_str(json).context("Failed to parse repository list")?;

    for repo in &repositories {
        if repo.id.trim().is_empty() {
            bail!("Repository {} has no id", repo.full_name());
        }
        if !is_valid_owner(&repo.owner) || !is_valid_repository_name(&repo.name) {
            bail!("'{}' is not a valid owner/name", repo.full_name());
        }
        // A stored timestamp that never parses could never be replaced
        if !repo.latest_release_timestamp.is_empty()
            && parse_timestamp(&repo.latest_release_timestamp).is_none()
        {
            bail!(
                "Repository {} has an unreadable release time: {}",
                repo.full_name(),
                repo.latest_release_timestamp
            );
        }
    }

    Ok(repositories)
}

/// Render repositories as a pretty-printed JSON array
pub fn render(repositories: &[TrackedRepository]) -> Result<String> {
    serde_json::to_string_pretty(repositories).context("Failed to serialize repository list")
}
