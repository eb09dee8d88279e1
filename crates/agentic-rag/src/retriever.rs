//! Vector index seam.
//!
//! The index is a black-box nearest-neighbor service; this module defines
//! the trait the retriever adapter consumes plus an HTTP implementation.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

/// One nearest-neighbor hit as returned by the index, before citation
/// tagging or budget enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub passage: String,
    pub score: f32,
    pub document_id: String,
    pub document_name: String,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top-k search. `doc_ids` restricts hits to those documents; `None`
    /// or an empty slice means no filter.
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        doc_ids: Option<&[String]>,
    ) -> anyhow::Result<Vec<RetrievedChunk>>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    embedding: &'a [f32],
    k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc_ids: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RetrievedChunk>,
}

pub struct HttpVectorIndex {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpVectorIndex {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.retriever_url.clone(),
            Duration::from_secs(config.retrieve_timeout_seconds),
        )
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        doc_ids: Option<&[String]>,
    ) -> anyhow::Result<Vec<RetrievedChunk>> {
        // An empty filter set means the caller wants no filter at all.
        let doc_ids = doc_ids.filter(|ids| !ids.is_empty());
        let request = SearchRequest { embedding, k, doc_ids };

        let response = self
            .http_client
            .post(self.search_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("vector index request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("vector index returned {}: {}", status, body));
        }

        let search_response: SearchResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("failed to parse index response: {}", e))?;

        debug!("Vector index returned {} hits (k={})", search_response.results.len(), k);
        Ok(search_response.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_parses_hits_in_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results":[
                    {"passage":"Refunds take 14 days.","score":0.91,"document_id":"docA","document_name":"policy.pdf"},
                    {"passage":"Contact support first.","score":0.77,"document_id":"docA","document_name":"policy.pdf"}
                ]}"#,
            )
            .create_async()
            .await;

        let index = HttpVectorIndex::new(server.url(), Duration::from_secs(5));
        let hits = index.search(&[0.1, 0.2], 2, None).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document_id, "docA");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn search_surfaces_index_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/search")
            .with_status(503)
            .with_body("index warming up")
            .create_async()
            .await;

        let index = HttpVectorIndex::new(server.url(), Duration::from_secs(5));
        let err = index.search(&[0.1], 3, None).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
