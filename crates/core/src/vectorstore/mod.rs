//! Persistent keyed collections of (document, metadata, vector) triples.

mod memory;
mod qdrant;
mod sqlite;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;
pub use sqlite::SqliteVectorStore;

use crate::filter::{Filter, FilterError};
use providers::ProviderError;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

pub type Metadata = HashMap<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("vector store backend error: {0}")]
    Backend(String),
    #[error("metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("vector store lock poisoned")]
    Poisoned,
}

impl From<ProviderError> for VectorStoreError {
    fn from(err: ProviderError) -> Self {
        VectorStoreError::Backend(err.to_string())
    }
}

impl From<anyhow::Error> for VectorStoreError {
    fn from(err: anyhow::Error) -> Self {
        VectorStoreError::Backend(format!("{err:#}"))
    }
}

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub document: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// One ranked hit. `distance` is cosine distance, so lower is closer.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub distance: f32,
    pub metadata: Metadata,
}

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite by id.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError>;

    /// Up to `k` nearest records by ascending cosine distance. `filter` must be native
    /// (no `$contains`).
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError>;

    async fn ids(&self) -> Result<Vec<String>, VectorStoreError>;

    async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError>;

    async fn count(&self) -> Result<usize, VectorStoreError>;
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Brute-force ranking shared by the stores that keep vectors locally.
pub(crate) fn rank<'a, I>(
    candidates: I,
    query: &[f32],
    k: usize,
    filter: Option<&Filter>,
) -> Result<Vec<QueryMatch>, VectorStoreError>
where
    I: IntoIterator<Item = (&'a str, &'a [f32], &'a Metadata)>,
{
    if let Some(f) = filter {
        f.ensure_native()?;
    }
    let mut scored: Vec<QueryMatch> = candidates
        .into_iter()
        .filter(|(_, _, meta)| filter.map_or(true, |f| f.matches(meta)))
        .map(|(id, vector, meta)| QueryMatch {
            id: id.to_string(),
            distance: cosine_distance(query, vector),
            metadata: meta.clone(),
        })
        .collect();
    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(k);
    Ok(scored)
}
