use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{EmbedError, EmbedResult, Embedder};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Extra attempts after the first for 429, 5xx, and network failures.
    pub max_retries: u32,
    /// First backoff step; doubles per attempt up to 32 steps.
    pub retry_base: Duration,
}

impl OpenAiEmbedderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base: Duration::from_secs(1),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, retry_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base = retry_base;
        self
    }
}

/// [`Embedder`] backed by the `OpenAI` embeddings endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    endpoint: String,
    config: OpenAiEmbedderConfig,
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
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Builds the embedder.
    ///
    /// # Errors
    /// Returns `EmbedError::Auth` when the API key is blank, or
    /// `EmbedError::Transport` if the HTTP client cannot be constructed.
    pub fn new(config: OpenAiEmbedderConfig) -> EmbedResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EmbedError::Auth("embedding API key is empty".to_string()));
        }
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let endpoint = format!("{}/v1/embeddings", config.base_url.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.retry_base * (1_u32 << (attempt - 1).min(5))
    }

    async fn request_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Attempt> {
        let body = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| Attempt::Retry(EmbedError::from(err)))?;

        let status = response.status();
        if status.is_success() {
            let parsed: EmbeddingResponse = response
                .json()
                .await
                .map_err(|err| Attempt::Fail(EmbedError::InvalidResponse(err.to_string())))?;
            return order_embeddings(parsed, texts.len()).map_err(Attempt::Fail);
        }

        let text = response.text().await.unwrap_or_default();
        let detail = format!("HTTP {status}: {}", text.trim());
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Attempt::Retry(EmbedError::Transport(detail)));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Attempt::Fail(EmbedError::Auth(detail)));
        }
        Err(Attempt::Fail(EmbedError::Transport(detail)))
    }
}

enum Attempt {
    Retry(EmbedError),
    Fail(EmbedError),
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
            match self.request_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(Attempt::Fail(err)) => return Err(err),
                Err(Attempt::Retry(err)) => {
                    warn!(attempt, error = %err, "embedding request failed; retrying");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            EmbedError::Transport("embedding failed after retries".to_string())
        }))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn order_embeddings(response: EmbeddingResponse, expected: usize) -> EmbedResult<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(EmbedError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            response.data.len()
        )));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in response.data {
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            EmbedError::InvalidResponse(format!("embedding index {} out of range", item.index))
        })?;
        *slot = Some(item.embedding);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.ok_or_else(|| EmbedError::InvalidResponse(format!("missing embedding {idx}")))
        })
        .collect()
}
