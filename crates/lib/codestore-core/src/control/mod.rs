use std::{error::Error, fmt, sync::Arc};

use async_trait::async_trait;
use codestore_store::models::{CodeFileRecord, RankedCodeFile};
use serde::{Deserialize, Serialize};
use surrealdb::Connection;

use crate::embed::{EmbedError, Embedder, MAX_INPUT_TOKENS, MAX_REQUEST_TOKENS, TokenCounter};
use crate::ingest::ExtensionFilter;
use crate::source::{RepositoryRef, SourceError, SourceHost};
use crate::store::{StoreError, SurrealCodeStore};

pub mod ingest;
pub mod query;

pub use ingest::IngestReport;

#[derive(Debug)]
pub enum ControlError {
    Source(SourceError),
    Embed(EmbedError),
    Store(StoreError),
    InvalidInput(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(err) => write!(f, "{err}"),
            Self::Embed(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
        }
    }
}

impl Error for ControlError {}

impl From<SourceError> for ControlError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}

impl From<EmbedError> for ControlError {
    fn from(err: EmbedError) -> Self {
        Self::Embed(err)
    }
}

impl From<StoreError> for ControlError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Coarse failure class reported to tool callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Auth,
    Decode,
    NotFound,
    Store,
    InvalidInput,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Auth => "auth",
            Self::Decode => "decode",
            Self::NotFound => "not_found",
            Self::Store => "store",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ControlError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Source(err) => match err {
                SourceError::Transport(_) => ErrorKind::Transport,
                SourceError::Auth(_) => ErrorKind::Auth,
                SourceError::NotFound(_) => ErrorKind::NotFound,
                SourceError::Decode(_) => ErrorKind::Decode,
                SourceError::InvalidInput(_) => ErrorKind::InvalidInput,
            },
            Self::Embed(err) => match err {
                EmbedError::Auth(_) => ErrorKind::Auth,
                EmbedError::Transport(_)
                | EmbedError::InvalidResponse(_)
                | EmbedError::Tokenizer(_) => ErrorKind::Transport,
            },
            Self::Store(err) => match err {
                StoreError::Surreal(_) => ErrorKind::Store,
                StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            },
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

/// The five repository operations served to tool callers.
#[async_trait]
pub trait Codestore: Send + Sync {
    /// Walks the repository and replaces its indexed files.
    async fn ingest(&self, repository: &str) -> ControlResult<IngestReport>;

    /// Files whose path matches `*fragment*`.
    async fn find_by_path_substring(
        &self,
        repository: &str,
        fragment: &str,
    ) -> ControlResult<Vec<CodeFileRecord>>;

    /// Every indexed file of the repository.
    async fn read_all(&self, repository: &str) -> ControlResult<Vec<CodeFileRecord>>;

    /// Indexed files touched by a commit, excluding removals.
    async fn read_latest_commit_files(
        &self,
        repository: &str,
        commit_reference: &str,
    ) -> ControlResult<Vec<CodeFileRecord>>;

    /// Files ranked by embedding similarity to `query`.
    async fn semantic_search(
        &self,
        repository: &str,
        query: &str,
        limit: Option<usize>,
    ) -> ControlResult<Vec<RankedCodeFile>>;
}

/// Tunables shared by every control-plane operation.
#[derive(Debug, Clone)]
pub struct ControlOptions {
    /// Owner applied to bare repository names.
    pub default_owner: String,
    pub page_size: usize,
    pub search_limit: usize,
    /// Inputs per embedding request.
    pub embed_batch_size: usize,
    /// Tokens kept from each input; capped at [`MAX_INPUT_TOKENS`].
    pub embed_max_tokens: usize,
    /// Tokens summed across one request; capped at [`MAX_REQUEST_TOKENS`].
    pub embed_batch_tokens: usize,
    pub filter: ExtensionFilter,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            default_owner: String::new(),
            page_size: 100,
            search_limit: 10,
            embed_batch_size: 64,
            embed_max_tokens: 8_000,
            embed_batch_tokens: 250_000,
            filter: ExtensionFilter::default(),
        }
    }
}

impl ControlOptions {
    #[must_use]
    pub fn with_default_owner(mut self, owner: impl Into<String>) -> Self {
        self.default_owner = owner.into();
        self
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn with_search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }

    #[must_use]
    pub const fn with_embedding_budget(
        mut self,
        batch_size: usize,
        max_tokens: usize,
        batch_tokens: usize,
    ) -> Self {
        self.embed_batch_size = batch_size;
        self.embed_max_tokens = max_tokens;
        self.embed_batch_tokens = batch_tokens;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ExtensionFilter) -> Self {
        self.filter = filter;
        self
    }
}

pub struct CodestoreControlPlane<C: Connection> {
    store: SurrealCodeStore<C>,
    source: Arc<dyn SourceHost>,
    embedder: Arc<dyn Embedder>,
    options: ControlOptions,
}

impl<C: Connection> Clone for CodestoreControlPlane<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            source: Arc::clone(&self.source),
            embedder: Arc::clone(&self.embedder),
            options: self.options.clone(),
        }
    }
}

impl<C: Connection> CodestoreControlPlane<C> {
    pub fn with_store(
        store: SurrealCodeStore<C>,
        source: Arc<dyn SourceHost>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            store,
            source,
            embedder,
            options: ControlOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ControlOptions) -> Self {
        self.options = options;
        self
    }

    fn resolve_repository(&self, repository: &str) -> ControlResult<RepositoryRef> {
        Ok(RepositoryRef::resolve(repository, &self.options.default_owner)?)
    }

    /// Truncates one embedding input to the configured token budget.
    fn fit_input<'a>(&self, counter: &TokenCounter, text: &'a str) -> (&'a str, usize) {
        counter.truncate(text, self.options.embed_max_tokens.clamp(1, MAX_INPUT_TOKENS))
    }

    fn batch_token_budget(&self) -> usize {
        self.options.embed_batch_tokens.clamp(1, MAX_REQUEST_TOKENS)
    }
}

#[async_trait]
impl<C: Connection> Codestore for CodestoreControlPlane<C> {
    async fn ingest(&self, repository: &str) -> ControlResult<IngestReport> {
        self.ingest_repository(repository).await
    }

    async fn find_by_path_substring(
        &self,
        repository: &str,
        fragment: &str,
    ) -> ControlResult<Vec<CodeFileRecord>> {
        self.find_files_by_path(repository, fragment).await
    }

    async fn read_all(&self, repository: &str) -> ControlResult<Vec<CodeFileRecord>> {
        self.read_all_files(repository).await
    }

    async fn read_latest_commit_files(
        &self,
        repository: &str,
        commit_reference: &str,
    ) -> ControlResult<Vec<CodeFileRecord>> {
        self.read_commit_files(repository, commit_reference).await
    }

    async fn semantic_search(
        &self,
        repository: &str,
        query: &str,
        limit: Option<usize>,
    ) -> ControlResult<Vec<RankedCodeFile>> {
        self.search_similar(repository, query, limit).await
    }
}
