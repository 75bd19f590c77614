//! Batch indexing as a lazily pulled stream of status messages.
//!
//! Each pull advances the run by one step: a phase change, one batch, or the final summary.
//! A batch announced with `Processing batch K...` is embedded and upserted on the following
//! pull, so a caller that cancels after seeing the announcement still gets that batch stored.

use crate::cancel::CancelFlag;
use crate::config::ScanConfig;
use crate::document::build_document;
use crate::embeddings::embed_texts;
use crate::models::SourceType;
use crate::source::repository::RemoteClients;
use crate::source::{is_repository_url, PendingEntry, Source};
use crate::vectorstore::{VectorRecord, VectorStore};
use anyhow::Context;
use futures::Stream;
use globset::GlobSet;
use providers::EmbeddingProvider;
use std::sync::Arc;

/// Receives `(fraction in [0, 1], description)` updates alongside the status stream.
pub trait ProgressReporter: Send {
    fn report(&mut self, fraction: f64, description: &str);
}

impl<F> ProgressReporter for F
where
    F: FnMut(f64, &str) + Send,
{
    fn report(&mut self, fraction: f64, description: &str) {
        self(fraction, description)
    }
}

/// Everything a run needs besides its target. Cheap to clone.
#[derive(Clone)]
pub struct IndexContext {
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub clients: RemoteClients,
    pub scan: ScanConfig,
    pub excludes: GlobSet,
}

enum Phase {
    Start,
    List(Result<Source, String>),
    Batches {
        source: Source,
        entries: Vec<PendingEntry>,
        offset: usize,
        announced: bool,
    },
    Done,
}

pub struct IndexRun {
    target: String,
    ctx: IndexContext,
    cancel: CancelFlag,
    progress: Option<Box<dyn ProgressReporter>>,
    phase: Phase,
}

impl IndexRun {
    pub fn new(
        target: impl Into<String>,
        ctx: IndexContext,
        cancel: CancelFlag,
        progress: Option<Box<dyn ProgressReporter>>,
    ) -> Self {
        Self {
            target: target.into(),
            ctx,
            cancel,
            progress,
            phase: Phase::Start,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        futures::stream::unfold(self, |mut run| async move {
            let status = run.next_status().await?;
            Some((status, run))
        })
    }

    fn report(&mut self, fraction: f64, description: &str) {
        if let Some(progress) = self.progress.as_mut() {
            progress.report(fraction, description);
        }
    }

    fn batch_size(&self, source_type: SourceType) -> usize {
        let size = match source_type {
            SourceType::Local => self.ctx.scan.local_batch_size,
            SourceType::Repository => self.ctx.scan.remote_batch_size,
        };
        size.max(1)
    }

    fn fail(&mut self, message: impl std::fmt::Display) -> Option<String> {
        self.phase = Phase::Done;
        Some(format!("Error: {message}"))
    }

    /// Advances the run by one step. `None` once the terminal message has been returned.
    pub async fn next_status(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Start => Some(self.start()),
            Phase::List(Ok(source)) => self.list(source).await,
            Phase::List(Err(message)) => self.fail(message),
            Phase::Batches {
                source,
                entries,
                offset,
                announced,
            } => self.step(source, entries, offset, announced).await,
            Phase::Done => None,
        }
    }

    fn start(&mut self) -> String {
        let remote = is_repository_url(&self.target);
        let resolved = Source::resolve(
            &self.target,
            self.ctx.excludes.clone(),
            &self.ctx.clients,
            self.ctx.scan.snippet_chars,
        );
        let msg = match (resolved, remote) {
            (Ok(source), _) => {
                match &source {
                    Source::Local(local) => {
                        tracing::info!(root = %local.root().display(), "indexing local directory")
                    }
                    Source::Repository(repo) => {
                        tracing::info!(url = %repo.repo().url, "indexing repository")
                    }
                }
                self.phase = Phase::List(Ok(source));
                if remote {
                    "Fetching repository file list..."
                } else {
                    "Scanning directories..."
                }
            }
            // Repository errors surface after the fetch announcement.
            (Err(err), true) => {
                tracing::warn!(input = %self.target, error = %err, "cannot parse repository url");
                self.phase = Phase::List(Err(err.to_string()));
                "Fetching repository file list..."
            }
            (Err(err), false) => {
                tracing::warn!(input = %self.target, error = %err, "cannot index target");
                self.phase = Phase::Done;
                return format!("Error: {err}");
            }
        };
        self.report(0.0, msg);
        msg.to_string()
    }

    async fn list(&mut self, source: Source) -> Option<String> {
        let entries = match source.list(&self.cancel).await {
            Ok(Some(entries)) => entries,
            Ok(None) => return self.finish().await,
            Err(err) => {
                tracing::warn!(input = %self.target, error = %err, "listing failed");
                return self.fail(err);
            }
        };
        let total = entries.len();
        tracing::info!(total, "listing complete");
        let (progress_msg, status) = match source.source_type() {
            SourceType::Local => (
                format!("Scan complete. Found {total} items."),
                format!("Scan complete. Found {total} items to process."),
            ),
            SourceType::Repository => {
                let msg = format!("Found {total} files to process.");
                (msg.clone(), msg)
            }
        };
        self.report(0.05, &progress_msg);
        self.phase = Phase::Batches {
            source,
            entries,
            offset: 0,
            announced: false,
        };
        Some(status)
    }

    async fn step(
        &mut self,
        source: Source,
        entries: Vec<PendingEntry>,
        mut offset: usize,
        announced: bool,
    ) -> Option<String> {
        let source_type = source.source_type();
        let batch_size = self.batch_size(source_type);
        let total = entries.len();

        if announced {
            let end = (offset + batch_size).min(total);
            if let Err(err) = process_batch(&self.ctx, &source, &entries[offset..end]).await {
                tracing::warn!(error = %format!("{err:#}"), offset, "batch failed, aborting run");
                return self.fail(format!("{err:#}"));
            }
            offset = end;
        }

        if self.cancel.is_cancelled() || offset >= total {
            return self.finish().await;
        }

        let batch_no = offset / batch_size + 1;
        let end = (offset + batch_size).min(total);
        let status = format!("Processing batch {batch_no}... ({end}/{total})");
        let fraction = match source_type {
            SourceType::Local => offset as f64 / total as f64,
            SourceType::Repository => offset as f64 / total as f64 * 0.95 + 0.05,
        };
        self.report(fraction, &status);
        self.phase = Phase::Batches {
            source,
            entries,
            offset,
            announced: true,
        };
        Some(status)
    }

    async fn finish(&mut self) -> Option<String> {
        self.phase = Phase::Done;
        let count = match self.ctx.store.count().await {
            Ok(count) => count,
            Err(err) => return Some(format!("Error: {err}")),
        };
        if self.cancel.is_cancelled() {
            tracing::info!(count, "index build cancelled");
            Some(format!(
                "Build cancelled. The database now contains {count} items."
            ))
        } else {
            tracing::info!(count, "index build complete");
            self.report(1.0, "Complete!");
            Some(format!(
                "Index build complete. The database now contains {count} items."
            ))
        }
    }
}

async fn process_batch(
    ctx: &IndexContext,
    source: &Source,
    batch: &[PendingEntry],
) -> anyhow::Result<()> {
    let loaded = source.load(batch).await;
    let docs: Vec<_> = loaded
        .iter()
        .map(|l| build_document(l, ctx.scan.snippet_chars))
        .collect();
    if docs.is_empty() {
        tracing::debug!(requested = batch.len(), "batch produced no documents");
        return Ok(());
    }

    let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
    let vectors = embed_texts(ctx.embedder.as_ref(), &texts).await?;
    let records: Vec<VectorRecord> = docs
        .into_iter()
        .zip(vectors)
        .map(|(doc, vector)| VectorRecord {
            id: doc.id,
            document: doc.text,
            vector,
            metadata: doc.metadata,
        })
        .collect();
    let stored = records.len();
    ctx.store
        .upsert(records)
        .await
        .context("vector store upsert failed")?;
    tracing::debug!(requested = batch.len(), stored, "batch stored");
    Ok(())
}
