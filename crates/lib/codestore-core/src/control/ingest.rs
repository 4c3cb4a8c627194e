use std::collections::HashSet;

use chrono::Utc;
use codestore_store::models::{CodeFileRecord, StoredCodeFile};
use serde::{Deserialize, Serialize};
use surrealdb::Connection;
use tracing::{debug, info};

use crate::embed::{EmbedError, TokenCounter, plan_batches};
use crate::ingest::{WalkedFile, walk_repository};

use super::{CodestoreControlPlane, ControlError, ControlResult};

/// Summary of one ingestion sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub repository: String,
    pub files_written: usize,
    /// Files dropped by the extension denylist.
    pub files_skipped: usize,
    /// Previously indexed files that no longer exist upstream.
    pub files_removed: usize,
}

impl<C: Connection> CodestoreControlPlane<C> {
    /// Walks a repository and replaces its indexed files.
    ///
    /// Nothing is written until the walk and every embedding call have
    /// succeeded; then upserts and deletions land in one transaction.
    ///
    /// # Errors
    /// Returns `ControlError` if the repository name is invalid, the walk or
    /// a file decode fails, embedding fails, or the store write fails.
    pub async fn ingest_repository(&self, repository: &str) -> ControlResult<IngestReport> {
        let repo = self.resolve_repository(repository)?;
        let repository_name = repo.full_name();
        info!(repository = %repository_name, "starting ingestion sweep");

        let walk = walk_repository(self.source.as_ref(), &repo, &self.options.filter).await?;
        let embeddings = self.embed_files(&walk.files).await?;

        let ingested_at = Utc::now().to_rfc3339();
        let model = self.embedder.model_name();
        let files: Vec<StoredCodeFile> = walk
            .files
            .into_iter()
            .zip(embeddings)
            .map(|(file, embedding)| {
                let source_url = file.entry.source_url();
                let record = CodeFileRecord::file(
                    &repository_name,
                    file.entry.path,
                    source_url,
                    file.content,
                );
                let stored = StoredCodeFile::from_record(record)
                    .with_blob_sha(file.entry.sha)
                    .with_ingested_at(ingested_at.as_str());
                match embedding {
                    Some(vector) => stored.with_embedding(vector, model),
                    None => stored,
                }
            })
            .collect();

        let fresh: HashSet<&str> = files.iter().map(|file| file.file_path.as_str()).collect();
        let stale: Vec<String> = self
            .store
            .list_paths(&repository_name)
            .await?
            .into_iter()
            .filter(|path| !fresh.contains(path.as_str()))
            .collect();

        let report = IngestReport {
            repository: repository_name.clone(),
            files_written: files.len(),
            files_skipped: walk.skipped,
            files_removed: stale.len(),
        };
        self.store
            .replace_repository_files(&repository_name, files, stale)
            .await?;

        info!(
            repository = %report.repository,
            written = report.files_written,
            skipped = report.files_skipped,
            removed = report.files_removed,
            "ingestion sweep complete"
        );
        Ok(report)
    }

    /// Embeds file contents in batches; blank files get no embedding.
    ///
    /// Each input is cut to the per-input token budget, and a batch closes
    /// when it reaches the item limit or its token total would exceed the
    /// per-request budget.
    async fn embed_files(&self, files: &[WalkedFile]) -> ControlResult<Vec<Option<Vec<f32>>>> {
        let mut embeddings: Vec<Option<Vec<f32>>> = vec![None; files.len()];
        let pending: Vec<usize> = files
            .iter()
            .enumerate()
            .filter(|(_, file)| !file.content.trim().is_empty())
            .map(|(idx, _)| idx)
            .collect();
        if pending.is_empty() {
            return Ok(embeddings);
        }

        let counter = TokenCounter::cl100k()?;
        let mut texts: Vec<String> = Vec::with_capacity(pending.len());
        let mut token_counts: Vec<usize> = Vec::with_capacity(pending.len());
        for &idx in &pending {
            let (text, tokens) = self.fit_input(&counter, &files[idx].content);
            texts.push(text.to_string());
            token_counts.push(tokens);
        }

        let batches = plan_batches(
            &token_counts,
            self.options.embed_batch_size,
            self.batch_token_budget(),
        );
        for range in batches {
            let batch = &pending[range.clone()];
            let tokens: usize = token_counts[range.clone()].iter().sum();
            let vectors = self.embedder.embed(&texts[range]).await?;
            if vectors.len() != batch.len() {
                return Err(ControlError::Embed(EmbedError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                ))));
            }
            for (&idx, vector) in batch.iter().zip(vectors) {
                embeddings[idx] = Some(vector);
            }
            debug!(
                batch = batch.len(),
                tokens,
                model = self.embedder.model_name(),
                "embedded batch"
            );
        }
        Ok(embeddings)
    }
}
