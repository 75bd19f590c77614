//! Builds providers, stores, and the explorer from configuration.

use crate::config::{AppConfig, RemoteConfig};
use crate::explorer::{ExplorerSettings, SemanticExplorer};
use crate::source::repository::RemoteClients;
use crate::vectorstore::{InMemoryVectorStore, QdrantStore, SqliteVectorStore, VectorStore};
use anyhow::Context;
use providers::content::ContentFetcher;
use providers::github::{GitHubClient, GitHubConfig};
use providers::hashing::HashingProvider;
use providers::huggingface::{HuggingFaceClient, HuggingFaceConfig};
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::qdrant::{QdrantClient, QdrantConfig};
use providers::ProviderRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com";
const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";

fn user_agent() -> String {
    format!("semantic-explorer/{}", env!("CARGO_PKG_VERSION"))
}

/// HTTP clients for the hosting APIs and raw downloads. GitHub rejects requests without a
/// User-Agent, so every client carries one.
pub fn remote_clients(cfg: &RemoteConfig) -> anyhow::Result<RemoteClients> {
    let http = reqwest::Client::builder()
        .user_agent(user_agent())
        .build()
        .context("building http client")?;
    let github = GitHubClient::new(
        http.clone(),
        GitHubConfig {
            api_base: cfg.github_api.clone(),
            token: cfg.github_token.clone(),
            api_timeout: Duration::from_secs(cfg.api_timeout_secs),
            tree_timeout: Duration::from_secs(cfg.tree_timeout_secs),
        },
    );
    let huggingface = HuggingFaceClient::new(
        http.clone(),
        HuggingFaceConfig {
            endpoint: cfg.huggingface_endpoint.clone(),
            token: cfg.hf_token.clone(),
            timeout: Duration::from_secs(cfg.api_timeout_secs),
        },
    );
    let fetcher = ContentFetcher::new(
        http,
        cfg.max_file_bytes,
        Duration::from_secs(cfg.content_timeout_secs),
    );
    Ok(RemoteClients {
        github,
        huggingface,
        fetcher,
        github_raw: cfg.github_raw.clone(),
        github_token: cfg.github_token.clone(),
    })
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Registers the offline `hashing` provider always, and `openai` when selected or when
/// `OPENAI_API_KEY` is set.
pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let emb = &config.embeddings;
    let mut reg = ProviderRegistry::new()
        .with_embedding("hashing", Arc::new(HashingProvider::new(emb.dimension)));

    let api_key = env_non_empty("OPENAI_API_KEY");
    if emb.provider == "openai" || api_key.is_some() {
        let base_url = emb
            .base_url
            .clone()
            .or_else(|| env_non_empty("OPENAI_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string());
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key,
            base_url,
            embedding_model: emb.model.clone(),
            timeout: Duration::from_secs(emb.timeout_secs),
        });
        reg = reg.with_embedding("openai", Arc::new(provider));
    }

    reg.set_preferred_embedding(&emb.provider)
}

pub async fn build_vector_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let vectors = &config.vectors;
    match vectors.provider.as_str() {
        "sqlite" => {
            let store = SqliteVectorStore::open(&config.database.path, &vectors.collection)
                .await
                .with_context(|| format!("opening index database {}", config.database.path))?;
            info!(path = %config.database.path, collection = %vectors.collection, "using sqlite vector store");
            Ok(Arc::new(store))
        }
        "qdrant" => {
            let url = vectors
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string());
            info!(%url, collection = %vectors.collection, "using qdrant vector store");
            let client = QdrantClient::new(QdrantConfig {
                url,
                collection: vectors.collection.clone(),
                api_key: env_non_empty("QDRANT_API_KEY"),
            });
            Ok(Arc::new(QdrantStore::new(client)))
        }
        "memory" => Ok(Arc::new(InMemoryVectorStore::new())),
        other => anyhow::bail!("unknown vector store provider: {other}"),
    }
}

pub async fn build_explorer(config: &AppConfig) -> anyhow::Result<SemanticExplorer> {
    let registry = build_registry(config);
    let embedder = registry
        .embedding(None)
        .context("resolving embedding provider")?;
    let store = build_vector_store(config).await?;
    SemanticExplorer::new(
        store,
        embedder,
        ExplorerSettings {
            scan: config.scan.clone(),
            remote: config.remote.clone(),
        },
    )
}
