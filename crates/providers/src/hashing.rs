//! Offline embedding provider based on feature hashing.
//!
//! Each lowercase alphanumeric token and its character trigrams are hashed with blake3
//! into a fixed number of buckets, then the vector is L2-normalized. The output is
//! deterministic across runs and platforms, so indexes built with it stay comparable.

use crate::{EmbedResponse, EmbeddingProvider, ProviderError};

pub const DEFAULT_DIMENSION: usize = 384;

#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for token in tokens(text) {
            self.add_feature(&mut vector, token.as_bytes(), 1.0);
            let chars: Vec<char> = token.chars().collect();
            if chars.len() > 3 {
                for gram in chars.windows(3) {
                    let gram: String = gram.iter().collect();
                    self.add_feature(&mut vector, gram.as_bytes(), 0.5);
                }
            }
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = blake3::hash(feature);
        let bytes = hash.as_bytes();
        let mut idx = [0u8; 8];
        idx.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(idx) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts.iter().map(|t| self.embed_one(t)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn deterministic_and_normalized() {
        let p = HashingProvider::new(64);
        let a = p.embed_one("Type: File. Path: src main.rs");
        let b = p.embed_one("Type: File. Path: src main.rs");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let p = HashingProvider::new(16);
        assert!(p.embed_one("  ... ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn shared_tokens_score_higher() {
        let p = HashingProvider::default();
        let query = p.embed_one("invoice report");
        let close = p.embed_one("Type: File. Path: finance invoice_report.pdf");
        let far = p.embed_one("Type: Folder. Path: photos holiday");
        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[tokio::test]
    async fn embed_returns_one_vector_per_text() {
        let p = HashingProvider::new(32);
        let resp = p
            .embed(&["a".to_string(), "b".to_string(), String::new()])
            .await
            .unwrap();
        assert_eq!(resp.vectors.len(), 3);
        assert!(resp.vectors.iter().all(|v| v.len() == 32));
    }
}
