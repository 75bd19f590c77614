//! Rows of a named item collection: id, document text, JSON metadata, and an f32 vector.

use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRow {
    pub id: String,
    pub document: String,
    pub metadata_json: String,
    pub vector: Vec<f32>,
}

/// Insert-or-overwrite by `(collection, id)` inside one transaction.
pub async fn upsert_items(
    pool: &SqlitePool,
    collection: &str,
    rows: &[ItemRow],
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO items (collection, id, document, metadata_json, vector, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, strftime('%s','now'))
            ON CONFLICT(collection, id) DO UPDATE SET
                document=excluded.document,
                metadata_json=excluded.metadata_json,
                vector=excluded.vector,
                updated_at=strftime('%s','now')
            "#,
        )
        .bind(collection)
        .bind(&row.id)
        .bind(&row.document)
        .bind(&row.metadata_json)
        .bind(encode_vector(&row.vector))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn load_items(pool: &SqlitePool, collection: &str) -> anyhow::Result<Vec<ItemRow>> {
    let rows = sqlx::query(
        "SELECT id, document, metadata_json, vector FROM items WHERE collection = ?1 ORDER BY id",
    )
    .bind(collection)
    .fetch_all(pool)
    .await?;
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let blob: Vec<u8> = row.try_get("vector")?;
        items.push(ItemRow {
            id: row.try_get("id")?,
            document: row.try_get("document")?,
            metadata_json: row.try_get("metadata_json")?,
            vector: decode_vector(&blob)?,
        });
    }
    Ok(items)
}

pub async fn item_ids(pool: &SqlitePool, collection: &str) -> anyhow::Result<Vec<String>> {
    let ids = sqlx::query_scalar("SELECT id FROM items WHERE collection = ?1 ORDER BY id")
        .bind(collection)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

pub async fn delete_items(
    pool: &SqlitePool,
    collection: &str,
    ids: &[String],
) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut removed = 0;
    for id in ids {
        let res = sqlx::query("DELETE FROM items WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        removed += res.rows_affected();
    }
    tx.commit().await?;
    Ok(removed)
}

pub async fn count_items(pool: &SqlitePool, collection: &str) -> anyhow::Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE collection = ?1")
        .bind(collection)
        .fetch_one(pool)
        .await?;
    Ok(count.max(0) as u64)
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> anyhow::Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        anyhow::bail!("corrupt vector blob of {} bytes", bytes.len());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect, migrate};

    fn row(id: &str, doc: &str, vector: Vec<f32>) -> ItemRow {
        ItemRow {
            id: id.into(),
            document: doc.into(),
            metadata_json: "{}".into(),
            vector,
        }
    }

    async fn open_pool(dir: &tempfile::TempDir) -> SqlitePool {
        let path = dir.path().join("nested").join("index.db");
        let pool = connect(&path.to_string_lossy()).await.unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir).await;

        upsert_items(&pool, "c", &[row("a", "one", vec![1.0, 2.0])])
            .await
            .unwrap();
        upsert_items(
            &pool,
            "c",
            &[row("a", "two", vec![3.0, 4.0]), row("b", "x", vec![0.5])],
        )
        .await
        .unwrap();

        assert_eq!(count_items(&pool, "c").await.unwrap(), 2);
        let items = load_items(&pool, "c").await.unwrap();
        assert_eq!(items[0], row("a", "two", vec![3.0, 4.0]));
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir).await;

        upsert_items(&pool, "left", &[row("a", "l", vec![1.0])])
            .await
            .unwrap();
        upsert_items(&pool, "right", &[row("a", "r", vec![1.0])])
            .await
            .unwrap();

        assert_eq!(item_ids(&pool, "left").await.unwrap(), vec!["a".to_string()]);
        assert_eq!(delete_items(&pool, "left", &["a".into()]).await.unwrap(), 1);
        assert_eq!(count_items(&pool, "left").await.unwrap(), 0);
        assert_eq!(count_items(&pool, "right").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn data_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        {
            let pool = open_pool(&dir).await;
            upsert_items(&pool, "c", &[row("a", "doc", vec![0.25])])
                .await
                .unwrap();
            pool.close().await;
        }
        let pool = open_pool(&dir).await;
        assert_eq!(count_items(&pool, "c").await.unwrap(), 1);
    }

    #[test]
    fn corrupt_blob_is_rejected() {
        assert!(decode_vector(&[1, 2, 3]).is_err());
        assert_eq!(
            decode_vector(&encode_vector(&[1.5, -2.0])).unwrap(),
            vec![1.5, -2.0]
        );
    }
}
