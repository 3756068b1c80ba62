//! Embedding client abstraction and adapters.
//!
//! Ingestion and retrieval must embed with the same provider and model;
//! mismatched models silently degrade relevance. Both paths therefore share
//! one client built from configuration at startup.

use crate::config::{EmbeddingProvider, get_config};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider returned a payload that could not be interpreted.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
///
/// Implementations return exactly one vector per input text, in input order.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbeddingClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
}

impl OpenAiEmbeddingClient {
    /// Build a client from the loaded configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        let http = Client::builder()
            .user_agent("askdocs/embeddings")
            .build()
            .expect("Failed to construct reqwest::Client for embeddings");
        Self {
            http,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.embedding_model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }
        let expected = texts.len();

        let mut request = self.http.post(self.endpoint()).json(&json!({
            "model": self.model,
            "input": texts,
        }));
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|error| {
            EmbeddingClientError::GenerationFailed(format!(
                "failed to reach embedding provider at {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "embedding provider returned {status}: {body}"
            )));
        }

        let body: EmbeddingsResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode embedding response: {error}"
            ))
        })?;

        if body.data.len() != expected {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {expected} embeddings, received {}",
                body.data.len()
            )));
        }

        // The provider reports input positions explicitly; restore input order
        // rather than trusting response ordering.
        let mut items = body.data;
        items.sort_by_key(|item| item.index);
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }
}

/// Deterministic embedding client for development and tests.
///
/// Encodes text by folding bytes into a fixed-dimension vector and
/// L2-normalizing the result. Identical inputs always produce identical
/// vectors, which keeps the idempotence properties of the pipeline observable
/// without a live provider.
pub struct DeterministicEmbeddingClient {
    dimension: usize,
}

impl DeterministicEmbeddingClient {
    /// Construct a client producing vectors of the given dimension.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];
        if text.is_empty() || self.dimension == 0 {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let slot = idx % self.dimension;
            embedding[slot] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for DeterministicEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedding_client() -> Box<dyn EmbeddingClient + Send + Sync> {
    let config = get_config();
    match config.embedding_provider {
        EmbeddingProvider::OpenAI => Box::new(OpenAiEmbeddingClient::from_config()),
        EmbeddingProvider::Deterministic => Box::new(DeterministicEmbeddingClient::new(
            config.embedding_dimension,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn openai_client_restores_input_order() {
        let server = MockServer::start_async().await;
        let client = OpenAiEmbeddingClient {
            http: Client::builder()
                .user_agent("askdocs-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: Some("secret".into()),
            model: "text-embedding-3-small".into(),
        };

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer secret");
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ],
                    "model": "text-embedding-3-small"
                }));
            })
            .await;

        let embeddings = client
            .generate_embeddings(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn openai_client_rejects_count_mismatch() {
        let server = MockServer::start_async().await;
        let client = OpenAiEmbeddingClient {
            http: Client::builder()
                .user_agent("askdocs-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
            model: "text-embedding-3-small".into(),
        };

        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [0.5] }],
                    "model": "text-embedding-3-small"
                }));
            })
            .await;

        let error = client
            .generate_embeddings(vec!["a".into(), "b".into()])
            .await
            .expect_err("count mismatch");
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn deterministic_client_is_stable_and_normalized() {
        let client = DeterministicEmbeddingClient::new(64);
        let first = client
            .generate_embeddings(vec!["hello world".into()])
            .await
            .expect("embeddings");
        let second = client
            .generate_embeddings(vec!["hello world".into()])
            .await
            .expect("embeddings");

        assert_eq!(first, second);
        let norm: f32 = first[0].iter().map(|value| value * value).sum::<f32>();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn deterministic_client_rejects_empty_input() {
        let client = DeterministicEmbeddingClient::new(8);
        let error = client
            .generate_embeddings(Vec::new())
            .await
            .expect_err("empty input");
        assert!(matches!(error, EmbeddingClientError::GenerationFailed(_)));
    }
}
