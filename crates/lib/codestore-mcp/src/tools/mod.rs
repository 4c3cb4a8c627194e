//! MCP tool modules.
//!
//! Tools are grouped by domain: index reads, index refresh, and
//! contextual help.

pub mod ingest;
pub mod query;
mod context;

#[cfg(test)]
pub mod fake {
    use async_trait::async_trait;
    use codestore_core::control::{Codestore, ControlError, ControlResult, IngestReport};
    use codestore_core::source::SourceError;
    use codestore_store::models::{CodeFileRecord, RankedCodeFile};

    /// Canned codestore answers for exercising the tool layer.
    #[derive(Default)]
    pub struct FakeCodestore {
        fail_ingest: bool,
    }

    impl FakeCodestore {
        pub const fn failing_ingest() -> Self {
            Self { fail_ingest: true }
        }
    }

    fn demo_files(repository: &str) -> Vec<CodeFileRecord> {
        vec![
            CodeFileRecord::file(repository, "README.md", "https://example/README.md", "# demo"),
            CodeFileRecord::file(repository, "src/app.py", "https://example/src/app.py", "print()"),
        ]
    }

    #[async_trait]
    impl Codestore for FakeCodestore {
        async fn ingest(&self, repository: &str) -> ControlResult<IngestReport> {
            if self.fail_ingest {
                return Err(SourceError::Transport("connection reset".to_string()).into());
            }
            Ok(IngestReport {
                repository: repository.to_string(),
                files_written: 2,
                files_skipped: 1,
                files_removed: 0,
            })
        }

        async fn find_by_path_substring(
            &self,
            repository: &str,
            fragment: &str,
        ) -> ControlResult<Vec<CodeFileRecord>> {
            Ok(demo_files(repository)
                .into_iter()
                .filter(|record| record.file_path.contains(fragment))
                .collect())
        }

        async fn read_all(&self, repository: &str) -> ControlResult<Vec<CodeFileRecord>> {
            Ok(demo_files(repository))
        }

        async fn read_latest_commit_files(
            &self,
            _repository: &str,
            commit_reference: &str,
        ) -> ControlResult<Vec<CodeFileRecord>> {
            Err(ControlError::from(SourceError::NotFound(format!(
                "commit {commit_reference}"
            ))))
        }

        async fn semantic_search(
            &self,
            _repository: &str,
            _query: &str,
            _limit: Option<usize>,
        ) -> ControlResult<Vec<RankedCodeFile>> {
            Ok(Vec::new())
        }
    }
}
