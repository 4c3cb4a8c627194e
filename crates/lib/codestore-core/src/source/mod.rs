//! Source-host interfaces and the GitHub implementation.
//!
//! The ingest walk only needs three calls from a hosting service: list a
//! directory, fetch a file, and describe a commit.

pub mod github;

use std::{error::Error, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use github::{GitHubClient, GitHubClientConfig};

#[derive(Debug)]
pub enum SourceError {
    Transport(String),
    Auth(String),
    NotFound(String),
    Decode(String),
    InvalidInput(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "source host transport error: {message}"),
            Self::Auth(message) => write!(f, "source host rejected credentials: {message}"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::Decode(message) => write!(f, "decode error: {message}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
        }
    }
}

impl Error for SourceError {}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Fully qualified repository coordinates on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    /// Resolves caller input into `owner/name`.
    ///
    /// `owner/name` is taken as-is; a bare `name` is owned by `default_owner`.
    ///
    /// # Errors
    /// Returns `SourceError::InvalidInput` for empty input or more than two segments.
    pub fn resolve(input: &str, default_owner: &str) -> SourceResult<Self> {
        let trimmed = input.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(SourceError::InvalidInput("repository is required".to_string()));
        }
        let mut segments = trimmed.split('/');
        let first = segments.next().unwrap_or_default().trim();
        let second = segments.next().map(str::trim);
        if segments.next().is_some() {
            return Err(SourceError::InvalidInput(format!(
                "repository must be `owner/name` or `name`, got `{trimmed}`"
            )));
        }
        match second {
            Some(name) if !first.is_empty() && !name.is_empty() => Ok(Self {
                owner: first.to_string(),
                name: name.to_string(),
            }),
            Some(_) => Err(SourceError::InvalidInput(format!(
                "repository has an empty segment: `{trimmed}`"
            ))),
            None => {
                let owner = default_owner.trim();
                if owner.is_empty() {
                    return Err(SourceError::InvalidInput(format!(
                        "repository `{first}` has no owner and no default account is configured"
                    )));
                }
                Ok(Self {
                    owner: owner.to_string(),
                    name: first.to_string(),
                })
            }
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ContentEntry {
    /// Browsable address of the entry, falling back to its API address.
    #[must_use]
    pub fn source_url(&self) -> String {
        self.html_url
            .clone()
            .or_else(|| self.url.clone())
            .unwrap_or_default()
    }
}

/// A file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: String,
}

impl ChangedFile {
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.status == "removed"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

/// Read access to a hosted code repository.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Lists the entries of a directory; `""` is the repository root.
    async fn list_directory(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> SourceResult<Vec<ContentEntry>>;

    /// Fetches the raw bytes of a file.
    async fn fetch_file(&self, repo: &RepositoryRef, entry: &ContentEntry) -> SourceResult<Vec<u8>>;

    /// Resolves a commit reference (sha, branch, or tag) and lists its files.
    async fn get_commit(&self, repo: &RepositoryRef, reference: &str) -> SourceResult<CommitInfo>;
}
