//! Token accounting for embedding requests.

use std::ops::Range;
use std::sync::OnceLock;

use tiktoken_rs::{CoreBPE, cl100k_base};

use super::{EmbedError, EmbedResult, truncate_chars};

/// Largest input, in tokens, the embeddings endpoint accepts.
pub const MAX_INPUT_TOKENS: usize = 8_191;

/// Largest sum of input tokens the embeddings endpoint accepts per request.
pub const MAX_REQUEST_TOKENS: usize = 300_000;

static ENCODER: OnceLock<CoreBPE> = OnceLock::new();

/// Counts tokens with the `cl100k_base` encoding used by the OpenAI
/// embedding models.
pub struct TokenCounter {
    bpe: &'static CoreBPE,
}

impl TokenCounter {
    /// Loads the shared encoder on first use.
    ///
    /// # Errors
    /// Returns `EmbedError::Tokenizer` if the encoding tables cannot be loaded.
    pub fn cl100k() -> EmbedResult<Self> {
        if let Some(bpe) = ENCODER.get() {
            return Ok(Self { bpe });
        }
        let loaded = cl100k_base().map_err(|err| EmbedError::Tokenizer(err.to_string()))?;
        Ok(Self {
            bpe: ENCODER.get_or_init(|| loaded),
        })
    }

    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Cuts `text` on a char boundary until it fits in `max_tokens`.
    ///
    /// Returns the kept prefix and its token count.
    #[must_use]
    pub fn truncate<'a>(&self, text: &'a str, max_tokens: usize) -> (&'a str, usize) {
        let mut kept = text;
        let mut tokens = self.count(kept);
        while tokens > max_tokens {
            let chars = kept.chars().count();
            // Shrink in proportion, always dropping at least one char.
            let target = (chars * max_tokens / tokens).min(chars - 1);
            kept = truncate_chars(kept, target);
            tokens = self.count(kept);
        }
        (kept, tokens)
    }
}

/// Splits inputs into consecutive request batches.
///
/// Each batch holds at most `max_items` inputs and at most `max_tokens`
/// tokens in total. An input larger than `max_tokens` travels alone.
#[must_use]
pub fn plan_batches(
    token_counts: &[usize],
    max_items: usize,
    max_tokens: usize,
) -> Vec<Range<usize>> {
    let max_items = max_items.max(1);
    let mut batches = Vec::new();
    let mut start = 0;
    let mut running = 0;
    for (idx, &count) in token_counts.iter().enumerate() {
        let full = idx - start == max_items || (idx > start && running + count > max_tokens);
        if full {
            batches.push(start..idx);
            start = idx;
            running = 0;
        }
        running += count;
    }
    if start < token_counts.len() {
        batches.push(start..token_counts.len());
    }
    batches
}
