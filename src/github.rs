//! GitHub GraphQL transport and the release query payloads

use crate::config::Config;
use crate::error::FetchError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Public GitHub GraphQL endpoint
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Latest release of a single repository, looked up by owner and name
pub const REPOSITORY_QUERY: &str = r#"
query($owner: String!, $name: String!) {
    rateLimit {
        remaining
        resetAt
    }
    repository(owner: $owner, name: $name) {
        id
        name
        owner {
            login
        }
        latestRelease {
            name
            url
            publishedAt
            author {
                avatarUrl
                url
            }
        }
    }
}
"#;

/// Latest releases of many repositories, looked up by node id.
///
/// `nodes` answers positionally: entry `i` belongs to id `i`.
pub const REPOSITORIES_QUERY: &str = r#"
query($ids: [ID!]!) {
    rateLimit {
        remaining
        resetAt
    }
    nodes(ids: $ids) {
        ... on Repository {
            id
            name
            owner {
                login
            }
            latestRelease {
                name
                url
                publishedAt
                author {
                    avatarUrl
                    url
                }
            }
        }
    }
}
"#;

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

impl<T> GraphQlResponse<T> {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Joined error messages, for logging
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitData {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryQueryData {
    pub rate_limit: Option<RateLimitData>,
    pub repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoriesQueryData {
    pub rate_limit: Option<RateLimitData>,
    #[serde(default)]
    pub nodes: Vec<Option<RepositoryNode>>,
}

/// A repository node; every field is optional because `nodes` may resolve an
/// id to something that is not a repository.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub id: Option<String>,
    pub name: Option<String>,
    pub owner: Option<OwnerNode>,
    pub latest_release: Option<ReleaseNode>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerNode {
    pub login: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseNode {
    pub name: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub author: Option<AuthorNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorNode {
    pub avatar_url: Option<String>,
    pub url: Option<String>,
}

/// Minimal GraphQL client: one POST per query with a bearer token
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GraphQlClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("releasewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Create a client for the endpoint named in the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.github.graphql_url.clone(),
            Duration::from_secs(config.github.timeout),
        )
    }

    /// Execute a query and decode the envelope.
    ///
    /// GraphQL-level errors are returned inside the envelope, not as `Err`,
    /// so callers can still read the rate-limit fields.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        token: &str,
    ) -> std::result::Result<GraphQlResponse<T>, FetchError> {
        let body = json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("GraphQL response received ({} bytes)", text.len());
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_repositories_with_null_node() {
        let json = r#"{
            "data": {
                "rateLimit": { "remaining": 4999, "resetAt": "2024-06-01T01:00:00Z" },
                "nodes": [
                    { "id": "R_1", "name": "rust", "owner": { "login": "rust-lang" },
                      "latestRelease": { "name": "1.79.0", "url": "https://x", "publishedAt": "2024-06-13T00:00:00Z",
                                         "author": { "avatarUrl": "https://a", "url": "https://u" } } },
                    null,
                    {}
                ]
            }
        }"#;

        let response: GraphQlResponse<RepositoriesQueryData> = serde_json::from_str(json).unwrap();
        assert!(!response.has_errors());

        let data = response.data.unwrap();
        assert_eq!(data.rate_limit.unwrap().remaining, 4999);
        assert_eq!(data.nodes.len(), 3);
        assert!(data.nodes[1].is_none());
        assert!(data.nodes[2].as_ref().unwrap().latest_release.is_none());
        let release = data.nodes[0].as_ref().unwrap().latest_release.as_ref().unwrap();
        assert_eq!(release.published_at.as_deref(), Some("2024-06-13T00:00:00Z"));
    }

    #[test]
    fn test_decode_errors() {
        let json = r#"{
            "data": { "rateLimit": null, "repository": null },
            "errors": [ { "message": "Could not resolve to a Repository" }, { "message": "second" } ]
        }"#;

        let response: GraphQlResponse<RepositoryQueryData> = serde_json::from_str(json).unwrap();
        assert!(response.has_errors());
        assert_eq!(
            response.error_summary(),
            "Could not resolve to a Repository, second"
        );
    }

    #[tokio::test]
    async fn test_execute_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "rateLimit": { "remaining": 1, "resetAt": "2024-06-01T00:00:00Z" }, "repository": null }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            GraphQlClient::new(format!("{}/graphql", server.uri()), Duration::from_secs(5)).unwrap();
        let response = client
            .execute::<RepositoryQueryData>(REPOSITORY_QUERY, json!({}), "secret")
            .await
            .unwrap();

        assert!(response.data.unwrap().repository.is_none());
    }

    #[tokio::test]
    async fn test_execute_maps_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let client = GraphQlClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let result = client
            .execute::<RepositoryQueryData>(REPOSITORY_QUERY, json!({}), "bad")
            .await;

        match result {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Bad credentials");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_execute_maps_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = GraphQlClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let result = client
            .execute::<RepositoryQueryData>(REPOSITORY_QUERY, json!({}), "token")
            .await;

        assert!(matches!(result, Err(FetchError::Parse(_))));
    }
}
