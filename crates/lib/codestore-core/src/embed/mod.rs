//! Text embedding providers.

pub mod openai;
pub mod tokens;

use std::{error::Error, fmt};

use async_trait::async_trait;

pub use openai::{OpenAiEmbedder, OpenAiEmbedderConfig};
pub use tokens::{MAX_INPUT_TOKENS, MAX_REQUEST_TOKENS, TokenCounter, plan_batches};

#[derive(Debug)]
pub enum EmbedError {
    Transport(String),
    Auth(String),
    InvalidResponse(String),
    Tokenizer(String),
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "embedding provider transport error: {message}"),
            Self::Auth(message) => write!(f, "embedding provider rejected credentials: {message}"),
            Self::InvalidResponse(message) => write!(f, "invalid embedding response: {message}"),
            Self::Tokenizer(message) => write!(f, "token encoder unavailable: {message}"),
        }
    }
}

impl Error for EmbedError {}

impl From<reqwest::Error> for EmbedError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type EmbedResult<T> = Result<T, EmbedError>;

/// Turns text into vectors for similarity ranking.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `texts`, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;
}

/// Truncates `text` to at most `max_chars` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}
