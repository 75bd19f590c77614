//! Two-stage query: native vector search, then the path-substring post-filter.

use crate::embeddings::embed_query;
use crate::filter::{Filter, PATH_FIELD};
use crate::models::{timestamp_to_local, IndexedItem, ItemKind, SearchResult};
use crate::vectorstore::{QueryMatch, VectorStore};
use anyhow::Context;
use providers::EmbeddingProvider;

pub const DEFAULT_RESULTS: usize = 20;

/// Candidates requested per wanted result, leaving room for post-filter losses.
pub const OVERFETCH_FACTOR: usize = 5;

pub async fn search(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    n: usize,
    filter: Option<Filter>,
) -> anyhow::Result<Vec<SearchResult>> {
    let total = store.count().await.context("counting indexed items")?;
    if total == 0 || n == 0 {
        return Ok(Vec::new());
    }

    let (native, needles) = match filter {
        Some(f) => f.split_path_contains(),
        None => (None, Vec::new()),
    };
    let k = n.saturating_mul(OVERFETCH_FACTOR).min(total);
    let vector = embed_query(embedder, query).await?;
    let candidates = store
        .query(&vector, k, native.as_ref())
        .await
        .context("vector store query failed")?;
    tracing::debug!(query, k, candidates = candidates.len(), needles = ?needles, "vector search");

    Ok(candidates
        .into_iter()
        .filter(|m| path_matches(m, &needles))
        .filter_map(to_result)
        .take(n)
        .collect())
}

fn path_matches(candidate: &QueryMatch, needles: &[String]) -> bool {
    if needles.is_empty() {
        return true;
    }
    let path = candidate
        .metadata
        .get(PATH_FIELD)
        .and_then(|v| v.as_str())
        .unwrap_or("");
    needles.iter().all(|n| path.contains(n.as_str()))
}

fn to_result(candidate: QueryMatch) -> Option<SearchResult> {
    let Some(item) = IndexedItem::from_metadata(&candidate.metadata) else {
        tracing::warn!(id = %candidate.id, "stored item has unreadable metadata, skipping");
        return None;
    };
    Some(SearchResult {
        similarity: 1.0 - candidate.distance,
        kind: if item.is_dir { ItemKind::Folder } else { ItemKind::File },
        size: if item.is_dir { None } else { item.size_bytes },
        modified: timestamp_to_local(item.modified_time),
        path: item.relative_path,
        full_path: item.full_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorstore::{InMemoryVectorStore, VectorRecord};
    use providers::hashing::HashingProvider;
    use serde_json::json;

    async fn seeded(paths: &[(&str, bool)]) -> (InMemoryVectorStore, HashingProvider) {
        let embedder = HashingProvider::new(64);
        let store = InMemoryVectorStore::new();
        let records = paths
            .iter()
            .map(|(p, is_dir)| VectorRecord {
                id: format!("local::/r/{p}"),
                document: p.to_string(),
                vector: embedder.embed_one(p),
                metadata: [
                    ("relative_path".to_string(), json!(p)),
                    ("full_path".to_string(), json!(format!("/r/{p}"))),
                    ("is_dir".to_string(), json!(is_dir)),
                    ("size_bytes".to_string(), json!(10)),
                    ("modified_time".to_string(), json!(1_700_000_000.0)),
                    ("source_type".to_string(), json!("local")),
                ]
                .into(),
            })
            .collect();
        store.upsert(records).await.unwrap();
        (store, embedder)
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let store = InMemoryVectorStore::new();
        let embedder = HashingProvider::new(8);
        let hits = search(&store, &embedder, "anything", 5, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn folders_have_no_size_and_similarity_is_one_minus_distance() {
        let (store, embedder) = seeded(&[("docs", true), ("docs/guide.md", false)]).await;
        let hits = search(&store, &embedder, "docs", 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "docs");
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
        assert_eq!(hits[0].kind, ItemKind::Folder);
        assert_eq!(hits[0].size, None);
        assert_eq!(hits[1].size, Some(10));
        assert_eq!(hits[1].full_path, "/r/docs/guide.md");
    }

    #[tokio::test]
    async fn path_contains_is_applied_after_retrieval() {
        let (store, embedder) = seeded(&[
            ("src/config.rs", false),
            ("tests/config.rs", false),
            ("src/main.rs", false),
            ("docs/config.md", false),
        ])
        .await;
        let filter = Filter::And(vec![
            Filter::path_contains("src/"),
            Filter::eq("is_dir", false),
        ]);
        let hits = search(&store, &embedder, "config", 10, Some(filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.path.contains("src/")));
    }

    #[tokio::test]
    async fn records_with_unreadable_metadata_are_skipped() {
        let (store, embedder) = seeded(&[("docs/guide.md", false)]).await;
        store
            .upsert(vec![VectorRecord {
                id: "stray".into(),
                document: "docs guide".into(),
                vector: embedder.embed_one("docs/guide.md"),
                metadata: [("relative_path".to_string(), json!("docs/stray.md"))].into(),
            }])
            .await
            .unwrap();
        let hits = search(&store, &embedder, "docs guide", 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "docs/guide.md");
    }

    #[tokio::test]
    async fn results_are_truncated_and_ordered() {
        let names: Vec<String> = (0..30).map(|i| format!("notes/file_{i}.txt")).collect();
        let entries: Vec<(&str, bool)> = names.iter().map(|n| (n.as_str(), false)).collect();
        let (store, embedder) = seeded(&entries).await;

        let hits = search(&store, &embedder, "file 7 notes", 5, None).await.unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }
}
