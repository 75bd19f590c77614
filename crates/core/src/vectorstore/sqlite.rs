use super::{rank, Metadata, QueryMatch, VectorRecord, VectorStore, VectorStoreError};
use crate::filter::Filter;
use storage::items::{self, ItemRow};
use storage::SqlitePool;

/// Persistent store backed by the `items` table; queries scan the collection.
#[derive(Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorStore {
    /// Expects a pool that has already been migrated.
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    pub async fn open(database_path: &str, collection: &str) -> anyhow::Result<Self> {
        let pool = storage::connect(database_path).await?;
        storage::migrate(&pool).await?;
        Ok(Self::new(pool, collection))
    }
}

#[async_trait::async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), VectorStoreError> {
        let rows = records
            .into_iter()
            .map(|r| {
                Ok(ItemRow {
                    id: r.id,
                    document: r.document,
                    metadata_json: serde_json::to_string(&r.metadata)?,
                    vector: r.vector,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        items::upsert_items(&self.pool, &self.collection, &rows).await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let rows = items::load_items(&self.pool, &self.collection).await?;
        let parsed = rows
            .into_iter()
            .map(|row| {
                let meta: Metadata = serde_json::from_str(&row.metadata_json)?;
                Ok((row.id, row.vector, meta))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        rank(
            parsed
                .iter()
                .map(|(id, v, meta)| (id.as_str(), v.as_slice(), meta)),
            vector,
            k,
            filter,
        )
    }

    async fn ids(&self) -> Result<Vec<String>, VectorStoreError> {
        Ok(items::item_ids(&self.pool, &self.collection).await?)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let removed = items::delete_items(&self.pool, &self.collection, ids).await?;
        tracing::debug!(removed, collection = %self.collection, "deleted items");
        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(items::count_items(&self.pool, &self.collection).await? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db").join("index.db");
        let db = db.to_string_lossy();

        let store = SqliteVectorStore::open(&db, "files").await.unwrap();
        store
            .upsert(vec![VectorRecord {
                id: "local::/x/a.rs".into(),
                document: "Type: File. Path: a.rs.".into(),
                vector: vec![0.6, 0.8],
                metadata: [
                    ("relative_path".to_string(), json!("a.rs")),
                    ("is_dir".to_string(), json!(false)),
                ]
                .into(),
            }])
            .await
            .unwrap();

        let reopened = SqliteVectorStore::open(&db, "files").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let hits = reopened
            .query(&[0.6, 0.8], 3, Some(&Filter::eq("is_dir", false)))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].distance.abs() < 1e-5);
        assert_eq!(hits[0].metadata["relative_path"], json!("a.rs"));

        reopened.delete(&["local::/x/a.rs".to_string()]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
