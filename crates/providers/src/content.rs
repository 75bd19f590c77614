//! Raw file download with a byte cap and a binary sniff.

use crate::{check_status, ProviderError};
use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_MAX_BYTES: u64 = 1_000_000;

/// Bytes inspected for a NUL byte before a file is treated as binary.
const BINARY_SNIFF_BYTES: usize = 1024;

#[derive(Clone)]
pub struct ContentFetcher {
    client: Client,
    max_bytes: u64,
    timeout: Duration,
    token: Option<String>,
}

impl ContentFetcher {
    pub fn new(client: Client, max_bytes: u64, timeout: Duration) -> Self {
        Self {
            client,
            max_bytes,
            timeout,
            token: None,
        }
    }

    /// Sends `Authorization: Bearer <token>` with every download.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Downloads `url` as text.
    ///
    /// Fails with [`ProviderError::TooLarge`] when the server announces a body above the cap,
    /// with [`ProviderError::ExceededWhileStreaming`] when the cap is crossed mid-download,
    /// and with [`ProviderError::Binary`] when the first KiB contains a NUL byte.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn fetch_text(&self, url: &str) -> Result<String, ProviderError> {
        let mut builder = self.client.get(url).timeout(self.timeout);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await.map_err(ProviderError::from_reqwest)?;
        let resp = check_status(resp).await?;

        let announced = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(size) = announced {
            if size > self.max_bytes {
                return Err(ProviderError::TooLarge {
                    size,
                    limit: self.max_bytes,
                });
            }
        }

        let mut body: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ProviderError::from_reqwest)?;
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_bytes {
                return Err(ProviderError::ExceededWhileStreaming {
                    limit: self.max_bytes,
                });
            }
        }

        if looks_binary(&body) {
            return Err(ProviderError::Binary);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// NUL byte within the first KiB.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    head.contains(&0)
}
