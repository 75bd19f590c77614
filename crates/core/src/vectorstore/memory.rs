use super::{rank, Metadata, QueryMatch, VectorRecord, VectorStore, VectorStoreError};
use crate::filter::Filter;
use std::collections::HashMap;
use std::sync::RwLock;

struct StoredPoint {
    vector: Vec<f32>,
    metadata: Metadata,
}

/// Non-persistent store, handy for tests and one-shot runs.
#[derive(Default)]
pub struct InMemoryVectorStore {
    points: RwLock<HashMap<String, StoredPoint>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().map_err(|_| VectorStoreError::Poisoned)?;
        for r in records {
            points.insert(
                r.id,
                StoredPoint {
                    vector: r.vector,
                    metadata: r.metadata,
                },
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let points = self.points.read().map_err(|_| VectorStoreError::Poisoned)?;
        rank(
            points
                .iter()
                .map(|(id, p)| (id.as_str(), p.vector.as_slice(), &p.metadata)),
            vector,
            k,
            filter,
        )
    }

    async fn ids(&self) -> Result<Vec<String>, VectorStoreError> {
        let points = self.points.read().map_err(|_| VectorStoreError::Poisoned)?;
        let mut ids: Vec<String> = points.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().map_err(|_| VectorStoreError::Poisoned)?;
        for id in ids {
            points.remove(id);
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        let points = self.points.read().map_err(|_| VectorStoreError::Poisoned)?;
        Ok(points.len())
    }
}
