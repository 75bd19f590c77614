//! GitHub REST client for listing the files of a repository's default branch.

use crate::{check_status, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

#[derive(Clone)]
pub struct GitHubConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub api_timeout: Duration,
    pub tree_timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            api_timeout: Duration::from_secs(10),
            tree_timeout: Duration::from_secs(30),
        }
    }
}

/// A file reported by a hosting API listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    pub size: Option<u64>,
}

/// Result of listing a repository: the files plus the branch they were read from.
#[derive(Debug, Clone)]
pub struct RepoListing {
    pub branch: String,
    pub files: Vec<RemoteFile>,
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    cfg: GitHubConfig,
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Deserialize)]
struct BranchInfo {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    tree: TreeRef,
}

#[derive(Deserialize)]
struct TreeRef {
    sha: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

impl GitHubClient {
    pub fn new(client: Client, cfg: GitHubConfig) -> Self {
        Self { client, cfg }
    }

    pub fn has_token(&self) -> bool {
        self.cfg.token.is_some()
    }

    /// Default branch → branch tree SHA → recursive tree; only blobs are returned.
    pub async fn list_files(&self, owner: &str, repo: &str) -> Result<RepoListing, ProviderError> {
        let base = self.cfg.api_base.trim_end_matches('/');

        let info: RepoInfo = self
            .get_json(&format!("{base}/repos/{owner}/{repo}"), self.cfg.api_timeout)
            .await?;
        let branch = info.default_branch;

        let branch_info: BranchInfo = self
            .get_json(
                &format!("{base}/repos/{owner}/{repo}/branches/{branch}"),
                self.cfg.api_timeout,
            )
            .await?;
        let tree_sha = branch_info.commit.commit.tree.sha;

        let tree: TreeResponse = self
            .get_json(
                &format!("{base}/repos/{owner}/{repo}/git/trees/{tree_sha}?recursive=1"),
                self.cfg.tree_timeout,
            )
            .await?;
        if tree.truncated {
            tracing::warn!(owner, repo, "GitHub tree listing was truncated");
        }

        let files = tree
            .tree
            .into_iter()
            .filter(|e| e.kind == "blob")
            .map(|e| RemoteFile {
                path: e.path,
                size: e.size,
            })
            .collect();
        Ok(RepoListing { branch, files })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<T, ProviderError> {
        let mut builder = self
            .client
            .get(url)
            .timeout(timeout)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.cfg.token {
            builder = builder.header("Authorization", format!("token {token}"));
        }
        let resp = builder.send().await.map_err(ProviderError::from_reqwest)?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: Option<&str>) -> GitHubClient {
        GitHubClient::new(
            Client::new(),
            GitHubConfig {
                api_base: server.uri(),
                token: token.map(str::to_string),
                ..GitHubConfig::default()
            },
        )
    }

    async fn mount_repo(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"default_branch": "trunk"})),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/branches/trunk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "commit": {"commit": {"tree": {"sha": "abc123"}}}
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/abc123"))
            .and(query_param("recursive", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tree": [
                    {"path": "src", "type": "tree"},
                    {"path": "src/lib.rs", "type": "blob", "size": 42},
                    {"path": "README.md", "type": "blob", "size": 7},
                    {"path": "vendor/sub", "type": "commit"}
                ]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn lists_only_blobs_on_default_branch() {
        let server = MockServer::start().await;
        mount_repo(&server).await;

        let listing = client(&server, None).list_files("octo", "demo").await.unwrap();
        assert_eq!(listing.branch, "trunk");
        assert_eq!(
            listing.files,
            vec![
                RemoteFile {
                    path: "src/lib.rs".into(),
                    size: Some(42)
                },
                RemoteFile {
                    path: "README.md".into(),
                    size: Some(7)
                },
            ]
        );
    }

    #[tokio::test]
    async fn sends_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo"))
            .and(header("authorization", "token ghp_x"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server, Some("ghp_x"))
            .list_files("octo", "demo")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn rate_limit_is_detectable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(r#"{"message":"API rate limit exceeded"}"#),
            )
            .mount(&server)
            .await;

        let err = client(&server, None)
            .list_files("octo", "demo")
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn exhausted_rate_limit_header_is_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_string(r#"{"message":"Forbidden"}"#),
            )
            .mount(&server)
            .await;

        let err = client(&server, None)
            .list_files("octo", "demo")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { status: 403, .. }));
        assert!(err.is_rate_limited());
        assert_eq!(err.to_string(), r#"HTTP 403: {"message":"Forbidden"}"#);
    }

    #[tokio::test]
    async fn plain_forbidden_is_not_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "42")
                    .set_body_string("Forbidden"),
            )
            .mount(&server)
            .await;

        let err = client(&server, None)
            .list_files("octo", "demo")
            .await
            .unwrap_err();
        assert!(!err.is_rate_limited());
    }
}
