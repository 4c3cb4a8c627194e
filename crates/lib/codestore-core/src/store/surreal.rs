use std::{error::Error, fmt, sync::Arc};

use codestore_store::models::{CodeFileRecord, RankedCodeFile, StoredCodeFile};
use codestore_store::schema::{TABLE_CODE_FILE, make_record_key, schema_statements};
use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;
use surrealdb::{Connection, Surreal};

#[derive(Debug)]
pub enum StoreError {
    Surreal(Box<surrealdb::Error>),
    InvalidInput(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surreal(err) => write!(f, "SurrealDB error: {err}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
        }
    }
}

impl Error for StoreError {}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Surreal(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

const RECORD_FIELDS: &str = "file_path, source_url, kind, repository_name, content";

fn replace_repository_files_query() -> String {
    format!(
        "BEGIN TRANSACTION;
FOR $row IN $rows {{
    UPSERT type::thing('{TABLE_CODE_FILE}', $row.id) CONTENT $row.file;
}};
DELETE {TABLE_CODE_FILE} WHERE repository_name = $repository AND file_path INSIDE $stale;
COMMIT TRANSACTION;
"
    )
}

#[derive(Serialize)]
struct WriteRow {
    id: String,
    file: StoredCodeFile,
}

pub struct SurrealCodeStore<C: Connection> {
    db: Arc<Surreal<C>>,
}

impl<C: Connection> Clone for SurrealCodeStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealCodeStore<C> {
    #[must_use]
    pub fn new(db: Surreal<C>) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Declares the code-file table and indexes if they are missing.
    ///
    /// # Errors
    /// Returns `StoreError` if any schema statement fails.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        self.db.query(schema_statements()).await?.check()?;
        Ok(())
    }

    /// Replaces the indexed state of one repository in a single transaction.
    ///
    /// Every file in `files` is created or overwritten under its deterministic
    /// key, and every path in `stale` is deleted. Either all of it lands or
    /// none of it does.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidInput` if a file belongs to another
    /// repository, or `StoreError::Surreal` if the transaction fails.
    pub async fn replace_repository_files(
        &self,
        repository_name: &str,
        files: Vec<StoredCodeFile>,
        stale: Vec<String>,
    ) -> StoreResult<()> {
        ensure_non_empty(repository_name, "repository_name")?;
        let mut rows = Vec::with_capacity(files.len());
        for file in files {
            if file.repository_name != repository_name {
                return Err(StoreError::InvalidInput(format!(
                    "{} belongs to {}, not {repository_name}",
                    file.file_path, file.repository_name
                )));
            }
            rows.push(WriteRow {
                id: make_record_key(&file.repository_name, &file.file_path),
                file,
            });
        }
        self.db
            .query(replace_repository_files_query())
            .bind(("repository", repository_name.to_string()))
            .bind(("rows", rows))
            .bind(("stale", stale))
            .await?
            .check()?;
        Ok(())
    }

    /// Lists one page of a repository's files ordered by path.
    ///
    /// Pass the last path of the previous page as `after`; `None` starts
    /// from the beginning.
    ///
    /// # Errors
    /// Returns `StoreError` if the limit is invalid or the database query fails.
    pub async fn list_page(
        &self,
        repository_name: &str,
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<CodeFileRecord>> {
        if limit == 0 {
            return Err(StoreError::InvalidInput("page size must be positive".to_string()));
        }
        let limit = limit_to_i64(limit)?;
        let repository = repository_name.to_string();
        let mut response = if let Some(after) = after {
            let query = format!(
                "SELECT {RECORD_FIELDS} FROM {TABLE_CODE_FILE} WHERE repository_name = $repository AND file_path > $after ORDER BY file_path ASC LIMIT $limit;"
            );
            self.db
                .query(query)
                .bind(("repository", repository))
                .bind(("after", after.to_string()))
                .bind(("limit", limit))
                .await?
        } else {
            let query = format!(
                "SELECT {RECORD_FIELDS} FROM {TABLE_CODE_FILE} WHERE repository_name = $repository ORDER BY file_path ASC LIMIT $limit;"
            );
            self.db
                .query(query)
                .bind(("repository", repository))
                .bind(("limit", limit))
                .await?
        };
        let records: Vec<CodeFileRecord> = response.take(0)?;
        Ok(records)
    }

    /// Reads every file of a repository, one keyset page at a time.
    ///
    /// # Errors
    /// Returns `StoreError` if any page query fails.
    pub async fn list_all(
        &self,
        repository_name: &str,
        page_size: usize,
    ) -> StoreResult<Vec<CodeFileRecord>> {
        let mut records: Vec<CodeFileRecord> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .list_page(repository_name, cursor.as_deref(), page_size)
                .await?;
            let fetched = page.len();
            if fetched == 0 {
                break;
            }
            cursor = page.last().map(|record| record.file_path.clone());
            records.extend(page);
            if fetched < page_size {
                break;
            }
        }
        Ok(records)
    }

    /// Lists every indexed path of a repository.
    ///
    /// # Errors
    /// Returns `StoreError` if the database query fails.
    pub async fn list_paths(&self, repository_name: &str) -> StoreResult<Vec<String>> {
        let query = format!(
            "SELECT VALUE file_path FROM {TABLE_CODE_FILE} WHERE repository_name = $repository;"
        );
        let mut response = self
            .db
            .query(query)
            .bind(("repository", repository_name.to_string()))
            .await?;
        let paths: Vec<String> = response.take(0)?;
        Ok(paths)
    }

    /// Finds files whose path matches `*fragment*`, case-sensitively.
    ///
    /// `*` and `?` in the fragment are wildcards. An empty fragment
    /// returns every file of the repository.
    ///
    /// # Errors
    /// Returns `StoreError` if the pattern is invalid or the database query fails.
    pub async fn search_path_contains(
        &self,
        repository_name: &str,
        fragment: &str,
    ) -> StoreResult<Vec<CodeFileRecord>> {
        let matcher = build_path_matcher(fragment)?;
        let repository = repository_name.to_string();
        let mut response = match longest_literal(fragment) {
            Some(piece) => {
                let query = format!(
                    "SELECT {RECORD_FIELDS} FROM {TABLE_CODE_FILE} WHERE repository_name = $repository AND string::contains(file_path, $piece) ORDER BY file_path ASC;"
                );
                self.db
                    .query(query)
                    .bind(("repository", repository))
                    .bind(("piece", piece.to_string()))
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {RECORD_FIELDS} FROM {TABLE_CODE_FILE} WHERE repository_name = $repository ORDER BY file_path ASC;"
                );
                self.db.query(query).bind(("repository", repository)).await?
            }
        };
        let candidates: Vec<CodeFileRecord> = response.take(0)?;
        Ok(candidates
            .into_iter()
            .filter(|record| matcher.is_match(&record.file_path))
            .collect())
    }

    /// Ranks a repository's embedded files by cosine similarity to `vector`.
    ///
    /// Only rows embedded by `model` with the same dimension as `vector` are
    /// compared; anything else is left out of the ranking.
    ///
    /// # Errors
    /// Returns `StoreError` if the inputs are invalid or the database query fails.
    pub async fn nearest(
        &self,
        repository_name: &str,
        model: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> StoreResult<Vec<RankedCodeFile>> {
        if vector.is_empty() {
            return Err(StoreError::InvalidInput("query vector is empty".to_string()));
        }
        ensure_non_empty(model, "model")?;
        let limit = limit_to_i64(limit)?;
        let dimension = limit_to_i64(vector.len())?;
        let query = format!(
            "SELECT {RECORD_FIELDS}, vector::similarity::cosine(embedding, $vector) AS score FROM {TABLE_CODE_FILE} WHERE repository_name = $repository AND embedding_model = $model AND embedding != NONE AND array::len(embedding) = $dimension ORDER BY score DESC LIMIT $limit;"
        );
        let mut response = self
            .db
            .query(query)
            .bind(("repository", repository_name.to_string()))
            .bind(("model", model.to_string()))
            .bind(("dimension", dimension))
            .bind(("vector", vector))
            .bind(("limit", limit))
            .await?;
        let records: Vec<RankedCodeFile> = response.take(0)?;
        Ok(records)
    }
}

fn ensure_non_empty(value: &str, field: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

fn limit_to_i64(limit: usize) -> StoreResult<i64> {
    i64::try_from(limit).map_err(|_| {
        StoreError::InvalidInput("limit exceeds supported range".to_string())
    })
}

fn build_path_matcher(fragment: &str) -> StoreResult<GlobMatcher> {
    let mut pattern = String::from("*");
    for ch in fragment.chars() {
        match ch {
            '[' | ']' | '{' | '}' | '\\' => {
                pattern.push('\\');
                pattern.push(ch);
            }
            _ => pattern.push(ch),
        }
    }
    pattern.push('*');
    let glob = GlobBuilder::new(&pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map_err(|err| StoreError::InvalidInput(format!("Invalid path pattern: {err}")))?;
    Ok(glob.compile_matcher())
}

/// Longest run of the fragment without wildcards, if any.
fn longest_literal(fragment: &str) -> Option<&str> {
    fragment
        .split(['*', '?'])
        .filter(|piece| !piece.is_empty())
        .max_by_key(|piece| piece.len())
}
