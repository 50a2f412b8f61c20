//! Embedding provider backed by an OpenAI-compatible HTTP endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::types::RagError;

/// Talks to any service exposing the `POST <base>/embeddings` contract:
/// hosted APIs as well as local servers (llama.cpp, vLLM, LocalAI).
///
/// Failures (unreachable endpoint, non-success status, malformed body,
/// wrong vector count) surface as [`RagError::Embedding`]; the provider
/// never fabricates vectors.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    /// Creates a provider for `model` served under `base_url`.
    ///
    /// An empty base URL or model name is a configuration error, caught
    /// here so a misconfigured deployment fails at startup rather than on
    /// its first embed call.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, RagError> {
        let base_url = base_url.into();
        let model = model.into();
        if base_url.trim().is_empty() {
            return Err(RagError::Config(
                "embedding endpoint base URL must not be empty".into(),
            ));
        }
        if model.trim().is_empty() {
            return Err(RagError::Config(
                "embedding model name must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key: None,
        })
    }

    /// Attaches a bearer token to every request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let mut request = self.client.post(&url).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "embedding request failed ({status}): {body}"
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| RagError::Embedding(err.to_string()))?;
        if body.data.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "endpoint returned {} embeddings for {} inputs",
                body.data.len(),
                texts.len()
            )));
        }
        Ok(body.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn embeds_through_the_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .json_body_partial(r#"{"model": "test-model"}"#);
                then.status(200).json_body(serde_json::json!({
                    "data": [
                        {"embedding": [0.1, 0.2]},
                        {"embedding": [0.3, 0.4]}
                    ]
                }));
            })
            .await;

        let provider = HttpEmbeddingProvider::new(server.base_url(), "test-model").unwrap();
        let vectors = provider.embed_batch(&texts(&["a", "b"])).await.unwrap();

        mock.assert_async().await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 2);
    }

    #[tokio::test]
    async fn server_error_is_not_masked() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(500).body("model not loaded");
            })
            .await;

        let provider = HttpEmbeddingProvider::new(server.base_url(), "test-model").unwrap();
        let result = provider.embed_batch(&texts(&["a"])).await;
        assert!(matches!(result, Err(RagError::Embedding(_))));
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200)
                    .json_body(serde_json::json!({"data": [{"embedding": [0.5]}]}));
            })
            .await;

        let provider = HttpEmbeddingProvider::new(server.base_url(), "test-model").unwrap();
        let result = provider.embed_batch(&texts(&["a", "b"])).await;
        assert!(matches!(result, Err(RagError::Embedding(_))));
    }

    #[test]
    fn empty_endpoint_or_model_fails_fast() {
        assert!(matches!(
            HttpEmbeddingProvider::new("", "model"),
            Err(RagError::Config(_))
        ));
        assert!(matches!(
            HttpEmbeddingProvider::new("http://localhost:8080/v1", "  "),
            Err(RagError::Config(_))
        ));
    }
}
