//! Hugging Face Hub client for listing the files of a Space.

use crate::github::RemoteFile;
use crate::{check_status, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

#[derive(Clone)]
pub struct HuggingFaceConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct HuggingFaceClient {
    client: Client,
    cfg: HuggingFaceConfig,
}

#[derive(Deserialize)]
struct SpaceInfo {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Deserialize)]
struct Sibling {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, rename = "blobId")]
    blob_id: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(client: Client, cfg: HuggingFaceConfig) -> Self {
        Self { client, cfg }
    }

    pub fn endpoint(&self) -> &str {
        self.cfg.endpoint.trim_end_matches('/')
    }

    pub fn token(&self) -> Option<&str> {
        self.cfg.token.as_deref()
    }

    /// Files of `owner/repo` that have a resolved blob id.
    pub async fn list_space_files(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<RemoteFile>, ProviderError> {
        let url = format!(
            "{}/api/spaces/{owner}/{repo}?files_metadata=true",
            self.endpoint()
        );
        let mut builder = self.client.get(url).timeout(self.cfg.timeout);
        if let Some(token) = &self.cfg.token {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await.map_err(ProviderError::from_reqwest)?;
        let resp = check_status(resp).await?;
        let info: SpaceInfo = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(info
            .siblings
            .into_iter()
            .filter(|s| s.blob_id.is_some())
            .map(|s| RemoteFile {
                path: s.rfilename,
                size: s.size,
            })
            .collect())
    }
}
