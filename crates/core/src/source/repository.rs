//! GitHub repositories and Hugging Face Spaces as indexable sources.

use super::exclude::is_excluded;
use super::{LoadedItem, SourceError};
use crate::models::{IndexedItem, SourceType};
use providers::content::ContentFetcher;
use providers::github::{GitHubClient, RemoteFile};
use providers::huggingface::HuggingFaceClient;
use providers::ProviderError;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoHost {
    GitHub,
    HuggingFace,
}

impl RepoHost {
    fn label(&self) -> &'static str {
        match self {
            RepoHost::GitHub => "GitHub repository",
            RepoHost::HuggingFace => "Hugging Face Space",
        }
    }
}

/// Owner and name extracted from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub host: RepoHost,
    pub owner: String,
    pub repo: String,
    /// The URL as given, minus surrounding whitespace. Part of every item id.
    pub url: String,
}

/// Accepts `https://github.com/o/r(.git)`, `https://huggingface.co/spaces/o/r`, and the same
/// forms without a scheme. Owner and repo are the last two path segments.
pub fn parse_repo_url(input: &str) -> Result<RepoRef, SourceError> {
    let url = input.trim();
    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("https://{url}")).ok())
        .ok_or(SourceError::InvalidRepoUrl)?;

    let host_name = parsed.host_str().unwrap_or_default().to_lowercase();
    let host = if host_name.contains("huggingface.co") {
        RepoHost::HuggingFace
    } else if host_name.contains("github.com") {
        RepoHost::GitHub
    } else {
        return Err(SourceError::InvalidRepoUrl);
    };

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [.., owner, repo] => {
            let repo = repo.strip_suffix(".git").unwrap_or(*repo);
            if repo.is_empty() {
                return Err(SourceError::InvalidRepoUrl);
            }
            Ok(RepoRef {
                host,
                owner: owner.to_string(),
                repo: repo.to_string(),
                url: url.to_string(),
            })
        }
        _ => Err(SourceError::InvalidRepoUrl),
    }
}

/// Clients shared by every repository run.
#[derive(Clone)]
pub struct RemoteClients {
    pub github: GitHubClient,
    pub huggingface: HuggingFaceClient,
    pub fetcher: ContentFetcher,
    pub github_raw: String,
    pub github_token: Option<String>,
}

/// A listed file with its resolved raw-content URL.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub file: RemoteFile,
    pub url: Url,
}

#[derive(Clone)]
pub struct RepositorySource {
    repo: RepoRef,
    clients: RemoteClients,
    snippet_chars: usize,
}

impl RepositorySource {
    pub fn open(url: &str, clients: RemoteClients, snippet_chars: usize) -> Result<Self, SourceError> {
        Ok(Self {
            repo: parse_repo_url(url)?,
            clients,
            snippet_chars,
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// Lists the repository, drops excluded paths, and resolves each file's download URL.
    pub async fn list(&self) -> Result<Vec<RemoteEntry>, SourceError> {
        let RepoRef {
            host, owner, repo, ..
        } = &self.repo;
        let (files, base) = match host {
            RepoHost::GitHub => {
                let listing = self
                    .clients
                    .github
                    .list_files(owner, repo)
                    .await
                    .map_err(|error| SourceError::GitHub {
                        rate_limit_hint: error.is_rate_limited() && !self.clients.github.has_token(),
                        error,
                    })?;
                let segments = [owner.as_str(), repo.as_str()]
                    .into_iter()
                    .chain(listing.branch.split('/'));
                let base = content_base(&self.clients.github_raw, segments)?;
                (listing.files, base)
            }
            RepoHost::HuggingFace => {
                let files = self
                    .clients
                    .huggingface
                    .list_space_files(owner, repo)
                    .await
                    .map_err(SourceError::HuggingFace)?;
                let base = content_base(
                    self.clients.huggingface.endpoint(),
                    ["spaces", owner.as_str(), repo.as_str(), "raw", "main"],
                )?;
                (files, base)
            }
        };

        if files.is_empty() {
            let token_hint = *host == RepoHost::GitHub && !self.clients.github.has_token();
            return Err(SourceError::Empty {
                what: host.label(),
                token_hint,
            });
        }

        // An all-excluded listing is not an error; the run completes with zero files.
        let entries: Vec<RemoteEntry> = files
            .into_iter()
            .filter(|f| !is_excluded(&f.path))
            .map(|file| RemoteEntry {
                url: file_url(&base, &file.path),
                file,
            })
            .collect();

        tracing::info!(repo = %self.repo.url, files = entries.len(), "repository listed");
        Ok(entries)
    }

    fn fetcher(&self) -> ContentFetcher {
        let token = match self.repo.host {
            RepoHost::GitHub => self.clients.github_token.clone(),
            RepoHost::HuggingFace => self.clients.huggingface.token().map(str::to_string),
        };
        self.clients.fetcher.clone().with_token(token)
    }

    /// Downloads one file. Errors are returned so the caller can skip and log them.
    pub async fn fetch(&self, entry: &RemoteEntry) -> Result<LoadedItem, ProviderError> {
        let text = self.fetcher().fetch_text(entry.url.as_str()).await?;
        let snippet: String = text.chars().take(self.snippet_chars).collect();
        let item = IndexedItem {
            relative_path: entry.file.path.clone(),
            full_path: entry.url.to_string(),
            is_dir: false,
            size_bytes: Some(entry.file.size.unwrap_or(text.len() as u64)),
            modified_time: now_epoch(),
            source_type: SourceType::Repository,
            repo_url: Some(self.repo.url.clone()),
        };
        Ok(LoadedItem {
            item,
            content: Some(snippet),
        })
    }

    /// Fetches a batch one file at a time, skipping files that fail.
    pub async fn load_batch(&self, entries: &[RemoteEntry]) -> Vec<LoadedItem> {
        let mut loaded = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.fetch(entry).await {
                Ok(item) => loaded.push(item),
                Err(err) => {
                    tracing::warn!(path = %entry.file.path, error = %err, "skipping remote file");
                }
            }
        }
        loaded
    }
}

fn content_base<'a>(
    root: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, SourceError> {
    let mut base = Url::parse(root).map_err(|_| SourceError::InvalidRepoUrl)?;
    base.path_segments_mut()
        .map_err(|_| SourceError::InvalidRepoUrl)?
        .pop_if_empty()
        .extend(segments);
    Ok(base)
}

/// Appends each `/`-separated component of `path`, percent-encoding as needed.
pub fn file_url(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segs) = url.path_segments_mut() {
        segs.pop_if_empty().extend(path.split('/'));
    }
    url
}

fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_github_forms() {
        let r = parse_repo_url("https://github.com/rust-lang/cargo").unwrap();
        assert_eq!(r.host, RepoHost::GitHub);
        assert_eq!((r.owner.as_str(), r.repo.as_str()), ("rust-lang", "cargo"));

        let r = parse_repo_url("  https://github.com/o/r.git/  ").unwrap();
        assert_eq!(r.repo, "r");
        assert_eq!(r.url, "https://github.com/o/r.git/");

        let r = parse_repo_url("github.com/o/r").unwrap();
        assert_eq!((r.owner.as_str(), r.repo.as_str()), ("o", "r"));
    }

    #[test]
    fn parses_huggingface_spaces() {
        let r = parse_repo_url("https://huggingface.co/spaces/acme/demo").unwrap();
        assert_eq!(r.host, RepoHost::HuggingFace);
        assert_eq!((r.owner.as_str(), r.repo.as_str()), ("acme", "demo"));
    }

    #[test]
    fn rejects_short_urls() {
        assert!(matches!(
            parse_repo_url("https://github.com/only-owner"),
            Err(SourceError::InvalidRepoUrl)
        ));
        assert!(parse_repo_url("https://example.com/o/r").is_err());
    }

    #[test]
    fn file_urls_encode_segments() {
        let base = content_base("https://raw.githubusercontent.com", ["o", "r", "main"]).unwrap();
        assert_eq!(base.as_str(), "https://raw.githubusercontent.com/o/r/main");
        let url = file_url(&base, "docs/read me#1.md");
        assert_eq!(
            url.as_str(),
            "https://raw.githubusercontent.com/o/r/main/docs/read%20me%231.md"
        );
    }
}
