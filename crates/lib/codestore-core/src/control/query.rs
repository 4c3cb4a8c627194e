use std::collections::HashSet;

use codestore_store::models::{CodeFileRecord, RankedCodeFile};
use surrealdb::Connection;
use tracing::debug;

use crate::embed::{EmbedError, TokenCounter};

use super::{CodestoreControlPlane, ControlError, ControlResult};

impl<C: Connection> CodestoreControlPlane<C> {
    /// Finds files whose path contains `fragment`, ordered by path.
    ///
    /// # Errors
    /// Returns `ControlError` if the repository name is invalid or the store query fails.
    pub async fn find_files_by_path(
        &self,
        repository: &str,
        fragment: &str,
    ) -> ControlResult<Vec<CodeFileRecord>> {
        let repo = self.resolve_repository(repository)?;
        let records = self
            .store
            .search_path_contains(&repo.full_name(), fragment)
            .await?;
        debug!(repository = %repo, fragment, matches = records.len(), "path search");
        Ok(records)
    }

    /// Reads every indexed file of a repository.
    ///
    /// # Errors
    /// Returns `ControlError` if the repository name is invalid or a page query fails.
    pub async fn read_all_files(&self, repository: &str) -> ControlResult<Vec<CodeFileRecord>> {
        let repo = self.resolve_repository(repository)?;
        let records = self
            .store
            .list_all(&repo.full_name(), self.options.page_size)
            .await?;
        Ok(records)
    }

    /// Reads the indexed files a commit added or modified.
    ///
    /// Files the commit touched that are not indexed yet are left out.
    ///
    /// # Errors
    /// Returns `ControlError` if the inputs are invalid, the commit cannot be
    /// resolved, or the store query fails.
    pub async fn read_commit_files(
        &self,
        repository: &str,
        commit_reference: &str,
    ) -> ControlResult<Vec<CodeFileRecord>> {
        let repo = self.resolve_repository(repository)?;
        if commit_reference.trim().is_empty() {
            return Err(ControlError::InvalidInput("commit_reference is required".to_string()));
        }
        let commit = self.source.get_commit(&repo, commit_reference).await?;
        let touched: HashSet<String> = commit
            .files
            .into_iter()
            .filter(|file| !file.is_removed())
            .map(|file| file.filename)
            .collect();
        debug!(repository = %repo, sha = %commit.sha, touched = touched.len(), "resolved commit");

        let records = self
            .store
            .list_all(&repo.full_name(), self.options.page_size)
            .await?;
        Ok(records
            .into_iter()
            .filter(|record| touched.contains(&record.file_path))
            .collect())
    }

    /// Ranks a repository's files by similarity to `query`.
    ///
    /// # Errors
    /// Returns `ControlError` if the inputs are invalid, embedding fails, or
    /// the store query fails.
    pub async fn search_similar(
        &self,
        repository: &str,
        query: &str,
        limit: Option<usize>,
    ) -> ControlResult<Vec<RankedCodeFile>> {
        let repo = self.resolve_repository(repository)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(ControlError::InvalidInput("query is required".to_string()));
        }
        let limit = limit.unwrap_or(self.options.search_limit);
        if limit == 0 {
            return Err(ControlError::InvalidInput("limit must be positive".to_string()));
        }

        let counter = TokenCounter::cl100k()?;
        let text = self.fit_input(&counter, query).0.to_string();
        let vector = self
            .embedder
            .embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ControlError::Embed(EmbedError::InvalidResponse(
                    "no embedding returned for query".to_string(),
                ))
            })?;
        let ranked = self
            .store
            .nearest(&repo.full_name(), self.embedder.model_name(), vector, limit)
            .await?;
        Ok(ranked)
    }
}
