//! Where items come from: a local directory or a hosted repository.

pub mod exclude;
pub mod local;
pub mod repository;

use crate::cancel::CancelFlag;
use crate::models::{IndexedItem, SourceType};
use local::LocalSource;
use providers::ProviderError;
use repository::{RemoteClients, RemoteEntry, RepositorySource};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Provided path is not a valid directory.")]
    InvalidLocalPath,
    #[error("Invalid repository URL format.")]
    InvalidRepoUrl,
    #[error("Error fetching from GitHub API: {error}. {}", rate_limit_note(.rate_limit_hint))]
    GitHub {
        error: ProviderError,
        rate_limit_hint: bool,
    },
    #[error("Error fetching from Hugging Face Hub: {0}")]
    HuggingFace(ProviderError),
    #[error("No files found in {what}.{}", token_note(.token_hint))]
    Empty {
        what: &'static str,
        token_hint: bool,
    },
    #[error("local walk failed: {0}")]
    Walk(String),
}

fn rate_limit_note(hint: &bool) -> &'static str {
    if *hint {
        "You may have hit the rate limit. Please set a GITHUB_TOKEN environment variable."
    } else {
        ""
    }
}

fn token_note(hint: &bool) -> &'static str {
    if *hint {
        " If this is a private repo or you've hit a rate limit, please set a GITHUB_TOKEN."
    } else {
        ""
    }
}

/// True when `input` names a GitHub or Hugging Face URL rather than a local path.
pub fn is_repository_url(input: &str) -> bool {
    let lower = input.to_lowercase();
    lower.contains("github.com") || lower.contains("huggingface.co")
}

/// An item ready for document building. `content` is `None` for directories.
#[derive(Debug, Clone)]
pub struct LoadedItem {
    pub item: IndexedItem,
    pub content: Option<String>,
}

/// Work discovered by [`Source::list`], processed later in batches.
#[derive(Debug, Clone)]
pub enum PendingEntry {
    Local(PathBuf),
    Remote(RemoteEntry),
}

#[derive(Clone)]
pub enum Source {
    Local(Arc<LocalSource>),
    Repository(Arc<RepositorySource>),
}

impl Source {
    /// Picks the source variant for `input` and validates it without touching the network.
    pub fn resolve(
        input: &str,
        excludes: globset::GlobSet,
        clients: &RemoteClients,
        snippet_chars: usize,
    ) -> Result<Self, SourceError> {
        if is_repository_url(input) {
            let repo = RepositorySource::open(input, clients.clone(), snippet_chars)?;
            Ok(Source::Repository(Arc::new(repo)))
        } else {
            let local = LocalSource::open(input, excludes, snippet_chars)?;
            Ok(Source::Local(Arc::new(local)))
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Source::Local(_) => SourceType::Local,
            Source::Repository(_) => SourceType::Repository,
        }
    }

    /// Enumerates pending work. `Ok(None)` means cancellation was observed mid-walk.
    pub async fn list(&self, cancel: &CancelFlag) -> Result<Option<Vec<PendingEntry>>, SourceError> {
        match self {
            Source::Local(local) => {
                let local = Arc::clone(local);
                let cancel = cancel.clone();
                let walked = tokio::task::spawn_blocking(move || local.walk(&cancel))
                    .await
                    .map_err(|e| SourceError::Walk(e.to_string()))?;
                Ok(walked.map(|paths| paths.into_iter().map(PendingEntry::Local).collect()))
            }
            Source::Repository(repo) => {
                let entries = repo.list().await?;
                Ok(Some(entries.into_iter().map(PendingEntry::Remote).collect()))
            }
        }
    }

    /// Materializes a batch. Entries that cannot be read are skipped.
    pub async fn load(&self, batch: &[PendingEntry]) -> Vec<LoadedItem> {
        match self {
            Source::Local(local) => {
                let paths: Vec<PathBuf> = batch
                    .iter()
                    .filter_map(|e| match e {
                        PendingEntry::Local(p) => Some(p.clone()),
                        PendingEntry::Remote(_) => None,
                    })
                    .collect();
                let local = Arc::clone(local);
                match tokio::task::spawn_blocking(move || local.load_batch(&paths)).await {
                    Ok(items) => items,
                    Err(err) => {
                        tracing::warn!(error = %err, "local batch loader panicked");
                        Vec::new()
                    }
                }
            }
            Source::Repository(repo) => {
                let entries: Vec<RemoteEntry> = batch
                    .iter()
                    .filter_map(|e| match e {
                        PendingEntry::Remote(r) => Some(r.clone()),
                        PendingEntry::Local(_) => None,
                    })
                    .collect();
                repo.load_batch(&entries).await
            }
        }
    }
}
