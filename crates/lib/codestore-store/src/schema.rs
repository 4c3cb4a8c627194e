use uuid::Uuid;

pub const TABLE_CODE_FILE: &str = "code_file";

pub const KIND_FILE: &str = "file";

pub const INDEX_REPOSITORY: &str = "code_file_repository";
pub const INDEX_REPOSITORY_PATH: &str = "code_file_repository_path";

/// Statements that declare the code-file table and its lookup indexes.
///
/// Every statement is `IF NOT EXISTS`, so running the batch against an
/// already-initialised database changes nothing.
#[must_use]
pub fn schema_statements() -> String {
    format!(
        "DEFINE TABLE IF NOT EXISTS {TABLE_CODE_FILE} SCHEMALESS;
DEFINE INDEX IF NOT EXISTS {INDEX_REPOSITORY} ON TABLE {TABLE_CODE_FILE} FIELDS repository_name;
DEFINE INDEX IF NOT EXISTS {INDEX_REPOSITORY_PATH} ON TABLE {TABLE_CODE_FILE} FIELDS repository_name, file_path;
"
    )
}

/// Derives the stable record key for a file within a repository.
///
/// The key is a UUIDv5 of `file_path` inside a namespace that is itself the
/// UUIDv5 of `repository_name`, so distinct `(repository, path)` pairs never
/// collide through concatenation.
#[must_use]
pub fn make_record_key(repository_name: &str, file_path: &str) -> String {
    let namespace = Uuid::new_v5(&Uuid::NAMESPACE_URL, repository_name.as_bytes());
    Uuid::new_v5(&namespace, file_path.as_bytes()).to_string()
}
