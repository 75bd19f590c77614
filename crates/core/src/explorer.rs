//! The public facade: build, query, inspect, and clear the index.

use crate::cancel::CancelFlag;
use crate::config::{RemoteConfig, ScanConfig};
use crate::filter::Filter;
use crate::indexer::{IndexContext, IndexRun, ProgressReporter};
use crate::models::SearchResult;
use crate::pipeline::remote_clients;
use crate::search;
use crate::source::exclude::build_globset;
use crate::vectorstore::VectorStore;
use anyhow::Context;
use futures::Stream;
use providers::EmbeddingProvider;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ExplorerSettings {
    pub scan: ScanConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Empty,
    Loaded(usize),
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStatus::Empty => write!(f, "Index is empty. Build the index to get started."),
            IndexStatus::Loaded(n) => write!(f, "Persistent index loaded with {n} items."),
        }
    }
}

pub struct SemanticExplorer {
    ctx: IndexContext,
    cancel: CancelFlag,
}

impl SemanticExplorer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: ExplorerSettings,
    ) -> anyhow::Result<Self> {
        let excludes = build_globset(&settings.scan.exclude).context("invalid scan.exclude pattern")?;
        let clients = remote_clients(&settings.remote)?;
        Ok(Self {
            ctx: IndexContext {
                store,
                embedder,
                clients,
                scan: settings.scan,
                excludes,
            },
            cancel: CancelFlag::new(),
        })
    }

    pub async fn status(&self) -> anyhow::Result<IndexStatus> {
        let count = self.ctx.store.count().await.context("counting indexed items")?;
        Ok(if count == 0 {
            IndexStatus::Empty
        } else {
            IndexStatus::Loaded(count)
        })
    }

    pub async fn get_status(&self) -> anyhow::Result<String> {
        Ok(self.status().await?.to_string())
    }

    /// Starts a run over a local directory or a GitHub / Hugging Face URL.
    ///
    /// Clears any earlier cancellation immediately; nothing else happens until the returned
    /// stream is polled. The stream always ends with an `Error: ...`, `Build cancelled. ...`, or
    /// `Index build complete. ...` message.
    pub fn index_directory(
        &self,
        target: &str,
        progress: Option<Box<dyn ProgressReporter>>,
    ) -> impl Stream<Item = String> + Send + 'static {
        self.cancel.reset();
        IndexRun::new(target, self.ctx.clone(), self.cancel.clone(), progress).into_stream()
    }

    pub async fn search(
        &self,
        query: &str,
        n: usize,
        filter: Option<Filter>,
    ) -> anyhow::Result<Vec<SearchResult>> {
        search::search(
            self.ctx.store.as_ref(),
            self.ctx.embedder.as_ref(),
            query,
            n,
            filter,
        )
        .await
    }

    /// Deletes every stored item and returns how many there were.
    pub async fn clear_index(&self) -> anyhow::Result<usize> {
        let count = self.ctx.store.count().await.context("counting indexed items")?;
        if count == 0 {
            return Ok(0);
        }
        let ids = self.ctx.store.ids().await.context("listing indexed ids")?;
        if !ids.is_empty() {
            self.ctx.store.delete(&ids).await.context("deleting indexed items")?;
        }
        tracing::info!(count, "index cleared");
        Ok(count)
    }

    pub fn cancel_indexing(&self) {
        tracing::info!("cancellation requested");
        self.cancel.cancel();
    }

    /// A handle that can cancel the current run from another task or a signal handler.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }
}
