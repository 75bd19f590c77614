//! Provider abstractions for embeddings and the remote services the explorer talks to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod content;
pub mod github;
pub mod hashing;
pub mod huggingface;
pub mod openai;
pub mod qdrant;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// A 403/429 response whose `x-ratelimit-remaining` header reached zero.
    #[error("HTTP {status}: {body}")]
    RateLimited { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("file is too large ({} KB > {} KB)", kilobytes(.size), kilobytes(.limit))]
    TooLarge { size: u64, limit: u64 },
    #[error("file is too large (exceeded {} KB while streaming)", kilobytes(.limit))]
    ExceededWhileStreaming { limit: u64 },
    #[error("file appears to be binary")]
    Binary,
}

fn kilobytes(bytes: &u64) -> String {
    format!("{:.1}", *bytes as f64 / 1024.0)
}

impl ProviderError {
    /// True for GitHub-style throttling: an exhausted rate-limit header, a 429, or a 403
    /// mentioning a rate limit.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::Status { status, body } => {
                *status == 429 || (*status == 403 && body.to_lowercase().contains("rate limit"))
            }
            ProviderError::RequestFailed(msg) => msg.to_lowercase().contains("rate limit"),
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        ProviderError::RequestFailed(err.to_string())
    }
}

/// Turns a non-success response into [`ProviderError::Status`], keeping the body for diagnostics.
pub(crate) async fn check_status(
    resp: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let exhausted = resp
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    let body = resp.text().await.unwrap_or_default();
    if exhausted && matches!(status, 403 | 429) {
        return Err(ProviderError::RateLimited { status, body });
    }
    Err(ProviderError::Status { status, body })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    embeddings: HashMap<String, Arc<dyn EmbeddingProvider>>,
    pub preferred_embedding: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(mut self, name: &str, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_embedding(mut self, name: &str) -> Self {
        self.preferred_embedding = Some(name.to_string());
        self
    }

    pub fn embedding(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_embedding.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no embedding provider configured".into())
            })?;
        self.embeddings
            .get(&key)
            .cloned()
            .ok_or(ProviderError::UnknownProvider(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashingProvider;

    #[test]
    fn registry_uses_preferred_embedding() {
        let reg = ProviderRegistry::new()
            .with_embedding("hashing", Arc::new(HashingProvider::new(8)))
            .set_preferred_embedding("hashing");
        assert!(reg.embedding(None).is_ok());
        assert!(matches!(
            reg.embedding(Some("missing")),
            Err(ProviderError::UnknownProvider(name)) if name == "missing"
        ));
    }

    #[test]
    fn registry_without_preference_errors() {
        let reg = ProviderRegistry::new();
        assert!(reg.embedding(None).is_err());
    }

    #[test]
    fn rate_limit_detection() {
        let err = ProviderError::Status {
            status: 403,
            body: r#"{"message":"API rate limit exceeded for 1.2.3.4."}"#.into(),
        };
        assert!(err.is_rate_limited());
        let forbidden = ProviderError::Status {
            status: 403,
            body: "Forbidden".into(),
        };
        assert!(!forbidden.is_rate_limited());
        assert!(ProviderError::Status {
            status: 429,
            body: String::new()
        }
        .is_rate_limited());
    }

    #[test]
    fn too_large_message_reports_kilobytes() {
        let err = ProviderError::TooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(err.to_string(), "file is too large (2.0 KB > 1.0 KB)");
    }
}
