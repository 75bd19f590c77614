use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub vectors: VectorConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".semantic-explorer/index.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hashing` (offline) or `openai` (any OpenAI-compatible endpoint).
    pub provider: String,
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: default_dimension(),
            base_url: None,
            timeout_secs: default_embed_timeout(),
        }
    }
}

fn default_dimension() -> usize {
    providers::hashing::DEFAULT_DIMENSION
}

fn default_embed_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// `sqlite` (default, persistent), `qdrant`, or `memory`.
    pub provider: String,
    pub url: Option<String>,
    pub collection: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            url: None,
            collection: "filesystem_index".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_local_batch")]
    pub local_batch_size: usize,
    #[serde(default = "default_remote_batch")]
    pub remote_batch_size: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    /// Extra glob patterns matched against local relative paths.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            local_batch_size: default_local_batch(),
            remote_batch_size: default_remote_batch(),
            snippet_chars: default_snippet_chars(),
            exclude: Vec::new(),
        }
    }
}

fn default_local_batch() -> usize {
    128
}

fn default_remote_batch() -> usize {
    50
}

fn default_snippet_chars() -> usize {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_github_api")]
    pub github_api: String,
    #[serde(default = "default_github_raw")]
    pub github_raw: String,
    #[serde(default = "default_hf_endpoint")]
    pub huggingface_endpoint: String,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
    #[serde(default = "default_tree_timeout")]
    pub tree_timeout_secs: u64,
    #[serde(default = "default_content_timeout")]
    pub content_timeout_secs: u64,
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default)]
    pub hf_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            github_api: default_github_api(),
            github_raw: default_github_raw(),
            huggingface_endpoint: default_hf_endpoint(),
            max_file_bytes: default_max_file_bytes(),
            api_timeout_secs: default_api_timeout(),
            tree_timeout_secs: default_tree_timeout(),
            content_timeout_secs: default_content_timeout(),
            github_token: None,
            hf_token: None,
        }
    }
}

impl RemoteConfig {
    /// Fills missing tokens from `GITHUB_TOKEN` / `HF_TOKEN`.
    pub fn with_env_tokens(mut self) -> Self {
        if self.github_token.is_none() {
            self.github_token = non_empty_env("GITHUB_TOKEN");
        }
        if self.hf_token.is_none() {
            self.hf_token = non_empty_env("HF_TOKEN");
        }
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_github_api() -> String {
    providers::github::DEFAULT_API_BASE.to_string()
}

fn default_github_raw() -> String {
    providers::github::DEFAULT_RAW_BASE.to_string()
}

fn default_hf_endpoint() -> String {
    providers::huggingface::DEFAULT_ENDPOINT.to_string()
}

fn default_max_file_bytes() -> u64 {
    providers::content::DEFAULT_MAX_BYTES
}

fn default_api_timeout() -> u64 {
    10
}

fn default_tree_timeout() -> u64 {
    30
}

fn default_content_timeout() -> u64 {
    15
}

/// Loads `path` (or the optional `config/default`) and applies `EXPLORER__*` env overrides.
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(config::Environment::with_prefix("EXPLORER").separator("__"));
    let cfg = settings.build()?;
    let mut app: AppConfig = cfg.try_deserialize()?;
    app.remote = app.remote.with_env_tokens();
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scan.local_batch_size, 128);
        assert_eq!(cfg.scan.remote_batch_size, 50);
        assert_eq!(cfg.scan.snippet_chars, 500);
        assert_eq!(cfg.remote.max_file_bytes, 1_000_000);
        assert_eq!(cfg.vectors.provider, "sqlite");
        assert_eq!(cfg.embeddings.provider, "hashing");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explorer.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[vectors]\nprovider = \"memory\"\ncollection = \"t\"\n\n[scan]\nlocal_batch_size = 7"
        )
        .unwrap();

        let cfg = load(Some(&path.to_string_lossy())).unwrap();
        assert_eq!(cfg.vectors.provider, "memory");
        assert_eq!(cfg.vectors.collection, "t");
        assert_eq!(cfg.scan.local_batch_size, 7);
        assert_eq!(cfg.scan.remote_batch_size, 50);
        assert_eq!(cfg.database.path, ".semantic-explorer/index.db");
    }
}
