use std::time::Duration;

use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ServiceTarget};
use tracing::{debug, instrument};

use super::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single chat exchange: system instructions plus the conversation so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system: String,
    pub turns: Vec<Turn>,
}

impl ModelRequest {
    /// Text of the first user turn (the assessment prompt).
    pub fn prompt(&self) -> &str {
        self.turns
            .iter()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or_default()
    }
}

/// Generative model used by the judge.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Returns the raw text of the model's reply.
    async fn complete(&self, request: &ModelRequest) -> Result<String, BackendError>;

    /// Identifier recorded on every assessment.
    fn model_id(&self) -> &str;
}

/// `genai`-backed model client pointed at an Ollama server.
pub struct GenaiBackend {
    client: Client,
    model: String,
    options: ChatOptions,
    timeout: Duration,
}

impl std::fmt::Debug for GenaiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiBackend")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GenaiBackend {
    pub fn new(
        ollama_url: &str,
        model: impl Into<String>,
        temperature: f64,
        top_p: f64,
        timeout: Duration,
    ) -> Self {
        let endpoint = format!("{}/v1/", ollama_url.trim_end_matches('/'));
        let resolver = ServiceTargetResolver::from_resolver_fn(
            move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                Ok(ServiceTarget {
                    endpoint: Endpoint::from_owned(endpoint.clone()),
                    auth: AuthData::from_single(""),
                    model: target.model,
                })
            },
        );
        let client = Client::builder()
            .with_service_target_resolver(resolver)
            .build();

        Self {
            client,
            model: model.into(),
            options: ChatOptions::default()
                .with_temperature(temperature)
                .with_top_p(top_p),
            timeout,
        }
    }
}

#[async_trait]
impl ModelBackend for GenaiBackend {
    #[instrument(skip_all, fields(model = %self.model, turns = request.turns.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<String, BackendError> {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(ChatMessage::system(request.system.clone()));
        for turn in &request.turns {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(turn.content.clone()),
                Role::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }

        let call = self
            .client
            .exec_chat(&self.model, ChatRequest::new(messages), Some(&self.options));

        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| BackendError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| BackendError::Unavailable {
                model: self.model.clone(),
                reason: e.to_string(),
            })?;

        let text = response.first_text().unwrap_or_default().to_string();
        debug!(chars = text.len(), "Model replied");
        Ok(text)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
