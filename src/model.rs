//! Tracked repository records and the helpers that operate on them

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Longest GitHub user or organization name
pub const MAX_CHAR_OWNER: usize = 39;
/// Longest GitHub repository name
pub const MAX_CHAR_REPO: usize = 100;

/// A GitHub repository whose latest release is being monitored
///
/// Field names serialize in camelCase, which is also the JSON import/export
/// format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedRepository {
    /// Opaque node id assigned by GitHub
    pub id: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub author_avatar_url: String,
    #[serde(default)]
    pub author_html_url: String,
    #[serde(default)]
    pub latest_release_html_url: String,
    #[serde(default)]
    pub latest_release_name: String,
    /// RFC 3339 publish time of the latest release
    #[serde(default)]
    pub latest_release_timestamp: String,
}

impl TrackedRepository {
    /// Get display name (owner/name format)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Whether the release fields describe an actual release
    pub fn has_release(&self) -> bool {
        !self.latest_release_timestamp.is_empty()
    }
}

/// Parse an ISO-8601 / RFC 3339 date-time string
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

/// Compare two release timestamps as date-times.
///
/// Returns `None` if either side fails to parse.
pub fn compare_timestamps(candidate: &str, current: &str) -> Option<Ordering> {
    let candidate = parse_timestamp(candidate)?;
    let current = parse_timestamp(current)?;
    Some(candidate.cmp(&current))
}

/// True only if `candidate` is strictly later than `current`
pub fn is_newer_release(candidate: &str, current: &str) -> bool {
    compare_timestamps(candidate, current) == Some(Ordering::Greater)
}

/// Sort orders offered when listing tracked repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    OwnerAsc,
    OwnerDesc,
    NameAsc,
    NameDesc,
    ReleaseDateAsc,
    ReleaseDateDesc,
}

impl SortOrder {
    /// Column the order applies to
    pub fn column(&self) -> &'static str {
        match self {
            SortOrder::OwnerAsc | SortOrder::OwnerDesc => "owner",
            SortOrder::NameAsc | SortOrder::NameDesc => "name",
            SortOrder::ReleaseDateAsc | SortOrder::ReleaseDateDesc => "latest_release_timestamp",
        }
    }

    pub fn is_ascending(&self) -> bool {
        matches!(
            self,
            SortOrder::OwnerAsc | SortOrder::NameAsc | SortOrder::ReleaseDateAsc
        )
    }

    /// SQL ORDER BY clause body
    pub fn sql(&self) -> String {
        let direction = if self.is_ascending() { "ASC" } else { "DESC" };
        format!("{} COLLATE NOCASE {}", self.column(), direction)
    }
}

fn owner_pattern() -> &'static Regex {
    static OWNER: OnceLock<Regex> = OnceLock::new();
    OWNER.get_or_init(|| Regex::new(r"^[\p{L}\p{N}-]+$").expect("owner pattern is valid"))
}

fn name_pattern() -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^[\p{L}\p{N}._-]+$").expect("name pattern is valid"))
}

/// Check a GitHub user/organization name
pub fn is_valid_owner(owner: &str) -> bool {
    !owner.is_empty()
        && owner.chars().count() <= MAX_CHAR_OWNER
        && !owner.starts_with('-')
        && !owner.ends_with('-')
        && !owner.contains("--")
        && owner_pattern().is_match(owner)
}

/// Check a GitHub repository name
pub fn is_valid_repository_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_CHAR_REPO
        && name != "."
        && name != ".."
        && name_pattern().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn repo(timestamp: &str) -> TrackedRepository {
        TrackedRepository {
            id: "R_1".to_string(),
            owner: "rust-lang".to_string(),
            name: "rust".to_string(),
            author_avatar_url: String::new(),
            author_html_url: String::new(),
            latest_release_html_url: String::new(),
            latest_release_name: String::new(),
            latest_release_timestamp: timestamp.to_string(),
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(repo("").full_name(), "rust-lang/rust");
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(repo("2024-01-01T00:00:00Z")).unwrap();
        let object = json.as_object().unwrap();
        for key in [
            "id",
            "owner",
            "name",
            "authorAvatarUrl",
            "authorHtmlUrl",
            "latestReleaseHtmlUrl",
            "latestReleaseName",
            "latestReleaseTimestamp",
        ] {
            assert!(object.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_newer_uses_datetime_not_string_order() {
        // Lexically "2024-06-01T01:00:00+02:00" > "2024-06-01T00:30:00Z",
        // but it is an earlier instant.
        assert!(!is_newer_release(
            "2024-06-01T01:00:00+02:00",
            "2024-06-01T00:30:00Z"
        ));
        assert!(is_newer_release("2024-06-01T00:00:00Z", "2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_equal_and_older_are_not_newer() {
        assert!(!is_newer_release("2024-06-01T00:00:00Z", "2024-06-01T00:00:00Z"));
        assert!(!is_newer_release(
            "2024-06-01T02:00:00+02:00",
            "2024-06-01T00:00:00Z"
        ));
        assert!(!is_newer_release("2023-06-01T00:00:00Z", "2024-06-01T00:00:00Z"));
    }

    #[test]
    fn test_unparseable_is_not_newer() {
        assert!(!is_newer_release("yesterday", "2024-06-01T00:00:00Z"));
        assert!(!is_newer_release("2024-06-01T00:00:00Z", ""));
        assert_eq!(compare_timestamps("", ""), None);
    }

    #[quickcheck]
    fn prop_newer_iff_later(base: u32, offset: i32) -> bool {
        let base = DateTime::<chrono::Utc>::from_timestamp(base as i64, 0).unwrap();
        let other = base + chrono::Duration::seconds(offset as i64);
        is_newer_release(&other.to_rfc3339(), &base.to_rfc3339()) == (offset > 0)
    }

    #[test]
    fn test_valid_owner() {
        assert!(is_valid_owner("rust-lang"));
        assert!(is_valid_owner("ghost"));
        assert!(!is_valid_owner(""));
        assert!(!is_valid_owner("-lead"));
        assert!(!is_valid_owner("trail-"));
        assert!(!is_valid_owner("dou--ble"));
        assert!(!is_valid_owner("under_score"));
        assert!(!is_valid_owner(&"a".repeat(MAX_CHAR_OWNER + 1)));
    }

    #[test]
    fn test_valid_repository_name() {
        assert!(is_valid_repository_name("tokio"));
        assert!(is_valid_repository_name("serde_json.rs-fork"));
        assert!(!is_valid_repository_name(""));
        assert!(!is_valid_repository_name("."));
        assert!(!is_valid_repository_name(".."));
        assert!(!is_valid_repository_name("with space"));
        assert!(!is_valid_repository_name(&"a".repeat(MAX_CHAR_REPO + 1)));
    }

    #[test]
    fn test_sort_order_sql() {
        assert_eq!(SortOrder::default(), SortOrder::OwnerAsc);
        assert_eq!(SortOrder::OwnerAsc.sql(), "owner COLLATE NOCASE ASC");
        assert_eq!(SortOrder::NameDesc.sql(), "name COLLATE NOCASE DESC");
        assert_eq!(
            SortOrder::ReleaseDateDesc.sql(),
            "latest_release_timestamp COLLATE NOCASE DESC"
        );
    }
}
