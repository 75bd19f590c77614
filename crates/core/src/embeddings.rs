use anyhow::Context;
use providers::EmbeddingProvider;

/// Embeds `texts` and checks that the provider returned one vector per input.
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> anyhow::Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let resp = provider
        .embed(texts)
        .await
        .context("embedding request failed")?;
    if resp.vectors.len() != texts.len() {
        anyhow::bail!(
            "embedding provider returned {} vectors for {} inputs",
            resp.vectors.len(),
            texts.len()
        );
    }
    Ok(resp.vectors)
}

pub async fn embed_query(provider: &dyn EmbeddingProvider, query: &str) -> anyhow::Result<Vec<f32>> {
    let mut vectors = embed_texts(provider, &[query.to_string()]).await?;
    vectors
        .pop()
        .ok_or_else(|| anyhow::anyhow!("embedding provider returned no vector"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::hashing::HashingProvider;
    use providers::{EmbedResponse, ProviderError};

    struct Short;

    #[async_trait::async_trait]
    impl EmbeddingProvider for Short {
        async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            Ok(EmbedResponse {
                vectors: vec![vec![1.0]],
            })
        }
    }

    #[tokio::test]
    async fn one_vector_per_text() {
        let provider = HashingProvider::new(16);
        let vectors = embed_texts(&provider, &["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 16));
        assert!(embed_texts(&provider, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn count_mismatch_is_an_error() {
        let err = embed_texts(&Short, &["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("returned 1 vectors for 2 inputs"));
    }

    #[tokio::test]
    async fn query_embedding_matches_document_embedding() {
        let provider = HashingProvider::new(32);
        let q = embed_query(&provider, "config loader").await.unwrap();
        let d = embed_texts(&provider, &["config loader".into()]).await.unwrap();
        assert_eq!(q, d[0]);
    }
}
