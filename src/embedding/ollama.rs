use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{EmbeddingError, QueryEmbedder};
use crate::constants::validate_embedding_dim;

/// Query embedder backed by an Ollama server (`POST /api/embeddings`).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Unreachable {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
            dimension,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_send_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            EmbeddingError::Unreachable {
                url: self.endpoint.clone(),
                reason: err.to_string(),
            }
        }
    }
}

impl QueryEmbedder for OllamaEmbedder {
    #[instrument(skip_all, fields(model = %self.model, text_len = text.len()))]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| EmbeddingError::BadResponse {
                    reason: e.to_string(),
                })?;

        validate_embedding_dim(parsed.embedding.len(), self.dimension)?;
        debug!(dim = parsed.embedding.len(), "Embedded query");
        Ok(parsed.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
