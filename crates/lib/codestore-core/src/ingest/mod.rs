//! Breadth-first repository walk that collects indexable text files.

pub mod filter;

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::source::{ContentEntry, EntryKind, RepositoryRef, SourceError, SourceHost, SourceResult};

pub use filter::{DEFAULT_SKIP_EXTENSIONS, ExtensionFilter, file_extension};

/// A text file read during the walk.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub entry: ContentEntry,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct WalkOutput {
    pub files: Vec<WalkedFile>,
    /// Files dropped by the extension denylist.
    pub skipped: usize,
}

/// Walks `repo` from its root, reading every file the filter lets through.
///
/// Directories are expanded in breadth-first order with one listing call
/// each. Symlinks and submodules are not followed.
///
/// # Errors
/// Returns the first `SourceError` raised by the host, or
/// `SourceError::Decode` when a file is not valid UTF-8.
pub async fn walk_repository(
    source: &dyn SourceHost,
    repo: &RepositoryRef,
    filter: &ExtensionFilter,
) -> SourceResult<WalkOutput> {
    let mut output = WalkOutput::default();
    let mut queue: VecDeque<ContentEntry> = source.list_directory(repo, "").await?.into();

    while let Some(entry) = queue.pop_front() {
        match entry.kind {
            EntryKind::Dir => {
                let children = source.list_directory(repo, &entry.path).await?;
                queue.extend(children);
            }
            EntryKind::File => {
                if filter.is_skipped(&entry.name) {
                    debug!(path = %entry.path, "skipping denylisted file");
                    output.skipped += 1;
                    continue;
                }
                let bytes = source.fetch_file(repo, &entry).await?;
                let content = String::from_utf8(bytes).map_err(|err| {
                    SourceError::Decode(format!("{repo}:/{} is not valid UTF-8: {err}", entry.path))
                })?;
                debug!(path = %entry.path, bytes = content.len(), "read file");
                output.files.push(WalkedFile { entry, content });
            }
            EntryKind::Symlink | EntryKind::Submodule => {
                warn!(path = %entry.path, kind = ?entry.kind, "not following non-file entry");
            }
        }
    }

    Ok(output)
}
