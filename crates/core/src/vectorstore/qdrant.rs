use super::{Metadata, QueryMatch, VectorRecord, VectorStore, VectorStoreError};
use crate::filter::Filter;
use providers::qdrant::{QdrantClient, QdrantPoint};
use tokio::sync::OnceCell;
use uuid::Uuid;

const ITEM_ID_KEY: &str = "item_id";
const DOCUMENT_KEY: &str = "document";

/// Qdrant point ids must be UUIDs or integers, so item ids are mapped through UUIDv5 and the
/// original id travels in the payload.
pub struct QdrantStore {
    client: QdrantClient,
    ready: OnceCell<()>,
}

impl QdrantStore {
    pub fn new(client: QdrantClient) -> Self {
        Self {
            client,
            ready: OnceCell::new(),
        }
    }

    pub fn point_id(item_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, item_id.as_bytes()).to_string()
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<(), VectorStoreError> {
        self.ready
            .get_or_try_init(|| async {
                self.client.ensure_collection(dimension as u64).await?;
                tracing::info!(collection = self.client.collection(), dimension, "qdrant collection ready");
                Ok::<(), VectorStoreError>(())
            })
            .await?;
        Ok(())
    }
}

fn split_payload(id: &serde_json::Value, payload: Option<serde_json::Value>) -> (String, Metadata) {
    let mut metadata: Metadata = match payload {
        Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Metadata::new(),
    };
    metadata.remove(DOCUMENT_KEY);
    let item_id = match metadata.remove(ITEM_ID_KEY) {
        Some(serde_json::Value::String(s)) => s,
        _ => match id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };
    (item_id, metadata)
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        self.ensure_collection(first.vector.len()).await?;
        let points = records
            .into_iter()
            .map(|r| {
                let mut payload = r.metadata;
                payload.insert(ITEM_ID_KEY.into(), serde_json::Value::String(r.id.clone()));
                payload.insert(DOCUMENT_KEY.into(), serde_json::Value::String(r.document));
                QdrantPoint {
                    id: Self::point_id(&r.id),
                    vector: r.vector,
                    payload,
                }
            })
            .collect();
        self.client.upsert(points).await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let native = filter.map(Filter::to_qdrant).transpose()?;
        let resp = self.client.search(vector.to_vec(), k as u64, native).await?;
        Ok(resp
            .result
            .into_iter()
            .map(|hit| {
                let (id, metadata) = split_payload(&hit.id, hit.payload);
                QueryMatch {
                    id,
                    distance: 1.0 - hit.score,
                    metadata,
                }
            })
            .collect())
    }

    async fn ids(&self) -> Result<Vec<String>, VectorStoreError> {
        let points = self.client.scroll_all().await?;
        Ok(points
            .into_iter()
            .map(|p| split_payload(&p.id, p.payload).0)
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let points = ids.iter().map(|id| Self::point_id(id)).collect();
        self.client.delete_points(points).await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.client.count().await? as usize)
    }
}
