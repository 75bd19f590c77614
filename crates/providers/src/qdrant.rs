use crate::{check_status, ProviderError};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    cfg: QdrantConfig,
}

const SCROLL_PAGE: u64 = 256;

impl QdrantClient {
    pub fn new(cfg: QdrantConfig) -> Self {
        Self {
            client: Client::new(),
            cfg,
        }
    }

    pub fn collection(&self) -> &str {
        &self.cfg.collection
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.cfg.url.trim_end_matches('/'),
            self.cfg.collection,
            suffix
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.cfg.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let resp = self
            .authorized(builder)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        check_status(resp).await
    }

    pub async fn collection_exists(&self) -> Result<bool, ProviderError> {
        let resp = self
            .authorized(self.client.get(self.collection_url("")))
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(resp).await?;
        Ok(true)
    }

    /// Creates the collection with cosine distance unless it already exists.
    pub async fn ensure_collection(&self, vector_size: u64) -> Result<(), ProviderError> {
        if self.collection_exists().await? {
            return Ok(());
        }
        let body = serde_json::json!({
            "vectors": {"size": vector_size, "distance": "Cosine"}
        });
        self.send(self.client.put(self.collection_url("")).json(&body))
            .await?;
        Ok(())
    }

    pub async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<serde_json::Value>,
    ) -> Result<QdrantSearchResponse, ProviderError> {
        #[derive(Serialize)]
        struct SearchRequest {
            vector: Vec<f32>,
            limit: u64,
            with_payload: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            filter: Option<serde_json::Value>,
        }
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
            filter,
        };
        let resp = self
            .send(
                self.client
                    .post(self.collection_url("/points/search"))
                    .json(&body),
            )
            .await?;
        resp.json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    pub async fn upsert(&self, points: Vec<QdrantPoint>) -> Result<(), ProviderError> {
        let req = QdrantUpsert { points };
        self.send(
            self.client
                .put(self.collection_url("/points?wait=true"))
                .json(&req),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_points(&self, ids: Vec<String>) -> Result<(), ProviderError> {
        #[derive(Serialize)]
        struct DeletePoints {
            points: Vec<String>,
        }
        self.send(
            self.client
                .post(self.collection_url("/points/delete?wait=true"))
                .json(&DeletePoints { points: ids }),
        )
        .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, ProviderError> {
        #[derive(Deserialize)]
        struct CountResult {
            count: u64,
        }
        #[derive(Deserialize)]
        struct CountResponse {
            result: CountResult,
        }
        let resp = self
            .authorized(
                self.client
                    .post(self.collection_url("/points/count"))
                    .json(&serde_json::json!({"exact": true})),
            )
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let resp = check_status(resp).await?;
        let parsed: CountResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parsed.result.count)
    }

    /// Pages through every point, returning ids and payloads (no vectors).
    pub async fn scroll_all(&self) -> Result<Vec<ScrolledPoint>, ProviderError> {
        #[derive(Serialize)]
        struct ScrollRequest {
            limit: u64,
            with_payload: bool,
            with_vector: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            offset: Option<serde_json::Value>,
        }
        #[derive(Deserialize)]
        struct ScrollPage {
            points: Vec<ScrolledPoint>,
            next_page_offset: Option<serde_json::Value>,
        }
        #[derive(Deserialize)]
        struct ScrollResponse {
            result: ScrollPage,
        }

        if !self.collection_exists().await? {
            return Ok(vec![]);
        }
        let mut out = Vec::new();
        let mut offset = None;
        loop {
            let body = ScrollRequest {
                limit: SCROLL_PAGE,
                with_payload: true,
                with_vector: false,
                offset: offset.take(),
            };
            let resp = self
                .send(
                    self.client
                        .post(self.collection_url("/points/scroll"))
                        .json(&body),
                )
                .await?;
            let page: ScrollResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
            out.extend(page.result.points);
            match page.result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Serialize)]
pub struct QdrantUpsert {
    pub points: Vec<QdrantPoint>,
}

#[derive(Debug, Serialize)]
pub struct QdrantPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct QdrantSearchResponse {
    pub result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchResult {
    pub id: serde_json::Value,
    pub score: f32,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ScrolledPoint {
    pub id: serde_json::Value,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> QdrantClient {
        QdrantClient::new(QdrantConfig {
            url: server.uri(),
            collection: "files".into(),
            api_key: Some("secret".into()),
        })
    }

    #[tokio::test]
    async fn count_of_missing_collection_is_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/files/points/count"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        assert_eq!(client(&server).count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_sends_filter_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/files/points/search"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(serde_json::json!({
                "limit": 3,
                "filter": {"must": [{"key": "is_dir", "match": {"value": false}}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [{"id": "u1", "score": 0.9, "payload": {"relative_path": "a.rs"}}]
            })))
            .mount(&server)
            .await;

        let filter = serde_json::json!({"must": [{"key": "is_dir", "match": {"value": false}}]});
        let resp = client(&server)
            .search(vec![1.0, 0.0], 3, Some(filter))
            .await
            .unwrap();
        assert_eq!(resp.result.len(), 1);
        assert!((resp.result[0].score - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn ensure_collection_creates_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/files"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/files"))
            .and(body_partial_json(serde_json::json!({
                "vectors": {"size": 4, "distance": "Cosine"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).ensure_collection(4).await.unwrap();
    }

    #[tokio::test]
    async fn scroll_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": {}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections/files/points/scroll"))
            .and(body_partial_json(serde_json::json!({"offset": "p2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"points": [{"id": "p2", "payload": {}}], "next_page_offset": null}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections/files/points/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"points": [{"id": "p1", "payload": {}}], "next_page_offset": "p2"}
            })))
            .mount(&server)
            .await;

        let points = client(&server).scroll_all().await.unwrap();
        assert_eq!(points.len(), 2);
    }
}
