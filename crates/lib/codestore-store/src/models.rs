use serde::{Deserialize, Serialize};

use crate::schema::KIND_FILE;

/// One indexed source file, as returned to tool callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeFileRecord {
    pub file_path: String,
    pub source_url: String,
    pub kind: String,
    pub repository_name: String,
    pub content: String,
}

impl CodeFileRecord {
    /// Builds a file record; `kind` is always [`KIND_FILE`].
    #[must_use]
    pub fn file(
        repository_name: impl Into<String>,
        file_path: impl Into<String>,
        source_url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            source_url: source_url.into(),
            kind: KIND_FILE.to_string(),
            repository_name: repository_name.into(),
            content: content.into(),
        }
    }
}

/// Persisted form of a code file, including its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCodeFile {
    pub file_path: String,
    pub source_url: String,
    pub kind: String,
    pub repository_name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Model that produced `embedding`; vectors are only compared within one model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<String>,
}

impl StoredCodeFile {
    #[must_use]
    pub fn from_record(record: CodeFileRecord) -> Self {
        Self {
            file_path: record.file_path,
            source_url: record.source_url,
            kind: record.kind,
            repository_name: record.repository_name,
            content: record.content,
            embedding: None,
            embedding_model: None,
            blob_sha: None,
            ingested_at: None,
        }
    }

    /// Attaches an embedding and the model that produced it.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>, model: impl Into<String>) -> Self {
        self.embedding = Some(embedding);
        self.embedding_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_blob_sha(mut self, blob_sha: Option<String>) -> Self {
        self.blob_sha = blob_sha;
        self
    }

    #[must_use]
    pub fn with_ingested_at(mut self, ingested_at: impl Into<String>) -> Self {
        self.ingested_at = Some(ingested_at.into());
        self
    }

    /// Drops storage-only fields.
    #[must_use]
    pub fn into_record(self) -> CodeFileRecord {
        CodeFileRecord {
            file_path: self.file_path,
            source_url: self.source_url,
            kind: self.kind,
            repository_name: self.repository_name,
            content: self.content,
        }
    }
}

/// A code file returned by similarity search, with its cosine score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedCodeFile {
    pub file_path: String,
    pub source_url: String,
    pub kind: String,
    pub repository_name: String,
    pub content: String,
    pub score: f64,
}
