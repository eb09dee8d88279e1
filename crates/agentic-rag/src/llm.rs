//! Generation backend seam.
//!
//! The orchestration pipeline only ever talks to `GenerationBackend`;
//! `HttpGenerationClient` proxies to an OpenAI-compatible server
//! (`/v1/chat/completions` and `/v1/embeddings`).
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

/// External generation capability: text given a prompt, vector given text.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        messages: &[PromptMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> anyhow::Result<String>;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct HttpGenerationClient {
    backend_url: String,
    llm_model: String,
    embed_model: String,
    http_client: reqwest::Client,
}

impl HttpGenerationClient {
    pub fn new(
        backend_url: impl Into<String>,
        llm_model: impl Into<String>,
        embed_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend_url: backend_url.into(),
            llm_model: llm_model.into(),
            embed_model: embed_model.into(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.backend_url.clone(),
            config.llm_model.clone(),
            config.embed_model.clone(),
            Duration::from_secs(config.generate_timeout_seconds),
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.backend_url)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.backend_url)
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationClient {
    async fn generate(
        &self,
        messages: &[PromptMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        debug!("Generation request ({} messages, max_tokens={})", messages.len(), max_tokens);
        let request = ChatCompletionRequest {
            model: &self.llm_model,
            messages,
            max_tokens,
            temperature,
            stream: false,
        };

        let response = self
            .http_client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("generation backend request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("generation backend returned {}: {}", status, body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("failed to parse completion response: {}", e))?;

        let content = completion
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(content)
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embed_model,
            input: vec![text],
        };

        let response = self
            .http_client
            .post(self.embeddings_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("embedding request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("embedding endpoint returned {}: {}", status, body));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("failed to parse embedding response: {}", e))?;

        let embedding = embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow::anyhow!("embedding response contained no vectors"))?;

        debug!("Generated query embedding (dim={})", embedding.len());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_parses_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"Hello there."}}]}"#,
            )
            .create_async()
            .await;

        let client =
            HttpGenerationClient::new(server.url(), "test-llm", "test-embed", Duration::from_secs(5));
        let answer = client
            .generate(&[PromptMessage::user("hi")], 0.0, 32)
            .await
            .unwrap();

        assert_eq!(answer, "Hello there.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_surfaces_backend_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("backend exploded")
            .create_async()
            .await;

        let client =
            HttpGenerationClient::new(server.url(), "test-llm", "test-embed", Duration::from_secs(5));
        let err = client
            .generate(&[PromptMessage::user("hi")], 0.0, 32)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn embed_returns_first_vector() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.1,0.2,0.3]}]}"#)
            .create_async()
            .await;

        let client =
            HttpGenerationClient::new(server.url(), "test-llm", "test-embed", Duration::from_secs(5));
        let embedding = client.embed("refund policy").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_rejects_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let client =
            HttpGenerationClient::new(server.url(), "test-llm", "test-embed", Duration::from_secs(5));
        assert!(client.embed("anything").await.is_err());
    }
}
