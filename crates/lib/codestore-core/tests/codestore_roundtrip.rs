use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use codestore_core::control::{Codestore, CodestoreControlPlane, ControlOptions, ErrorKind};
use codestore_core::embed::{EmbedError, EmbedResult, Embedder, TokenCounter};
use codestore_core::source::{
    ChangedFile,
    CommitInfo,
    ContentEntry,
    EntryKind,
    RepositoryRef,
    SourceError,
    SourceHost,
    SourceResult,
};
use codestore_core::store::SurrealCodeStore;
use codestore_store::models::{CodeFileRecord, RankedCodeFile};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// In-memory repository tree served through the `SourceHost` interface.
#[derive(Default)]
struct FakeSource {
    repository: String,
    files: BTreeMap<String, Vec<u8>>,
    commits: HashMap<String, CommitInfo>,
    broken_path: Option<String>,
}

impl FakeSource {
    fn new(repository: &str, files: &[(&str, &str)]) -> Self {
        Self {
            repository: repository.to_string(),
            files: files
                .iter()
                .map(|(path, content)| ((*path).to_string(), content.as_bytes().to_vec()))
                .collect(),
            ..Self::default()
        }
    }

    fn with_raw_file(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(path.to_string(), bytes);
        self
    }

    fn with_commit(mut self, reference: &str, changes: &[(&str, &str)]) -> Self {
        let files = changes
            .iter()
            .map(|(filename, status)| ChangedFile {
                filename: (*filename).to_string(),
                status: (*status).to_string(),
            })
            .collect();
        self.commits.insert(
            reference.to_string(),
            CommitInfo {
                sha: format!("sha-{reference}"),
                files,
            },
        );
        self
    }

    fn failing_on(mut self, path: &str) -> Self {
        self.broken_path = Some(path.to_string());
        self
    }

    fn check_repo(&self, repo: &RepositoryRef) -> SourceResult<()> {
        if repo.full_name() == self.repository {
            Ok(())
        } else {
            Err(SourceError::NotFound(repo.full_name()))
        }
    }

    fn entry(&self, kind: EntryKind, path: &str) -> ContentEntry {
        ContentEntry {
            kind,
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            sha: Some(format!("blob-{path}")),
            size: 0,
            url: Some(format!("https://api.github.com/repos/{}/contents/{path}", self.repository)),
            html_url: Some(format!("https://github.com/{}/blob/main/{path}", self.repository)),
            download_url: None,
        }
    }
}

#[async_trait]
impl SourceHost for FakeSource {
    async fn list_directory(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> SourceResult<Vec<ContentEntry>> {
        self.check_repo(repo)?;
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for file_path in self.files.keys() {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    dirs.insert(format!("{prefix}{dir}"));
                }
                None => entries.push(self.entry(EntryKind::File, file_path)),
            }
        }
        entries.extend(dirs.iter().map(|dir| self.entry(EntryKind::Dir, dir)));
        Ok(entries)
    }

    async fn fetch_file(
        &self,
        repo: &RepositoryRef,
        entry: &ContentEntry,
    ) -> SourceResult<Vec<u8>> {
        self.check_repo(repo)?;
        if self.broken_path.as_deref() == Some(entry.path.as_str()) {
            return Err(SourceError::Transport(format!("connection reset fetching {}", entry.path)));
        }
        self.files
            .get(&entry.path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(entry.path.clone()))
    }

    async fn get_commit(&self, repo: &RepositoryRef, reference: &str) -> SourceResult<CommitInfo> {
        self.check_repo(repo)?;
        self.commits
            .get(reference)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("commit {reference}")))
    }
}

const VOCABULARY: &[&str] = &["http", "server", "database", "parser", "token", "render"];

/// Bag-of-words embedder over a fixed vocabulary, plus a bias dimension.
struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lowered = text.to_lowercase();
                let mut vector: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|word| {
                        let hits = lowered.matches(word).count();
                        f32::from(u16::try_from(hits).unwrap_or(u16::MAX))
                    })
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "bag-of-words"
    }
}

const SLOTS: usize = 5;

/// One-hot embedder keyed by the number ending each text. Records the size
/// of every request.
#[derive(Default)]
struct RecordingEmbedder {
    calls: Mutex<Vec<usize>>,
    drop_last: bool,
}

impl RecordingEmbedder {
    fn dropping_last() -> Self {
        Self {
            drop_last: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<usize> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl Embedder for RecordingEmbedder {
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        self.calls.lock().expect("calls lock").push(texts.len());
        let mut vectors = texts
            .iter()
            .map(|text| {
                let slot = text
                    .trim()
                    .rsplit(' ')
                    .next()
                    .and_then(|number| number.parse::<usize>().ok())
                    .filter(|slot| *slot < SLOTS)
                    .ok_or_else(|| EmbedError::InvalidResponse(format!("unexpected text {text}")))?;
                let mut vector = vec![0.0; SLOTS];
                vector[slot] = 1.0;
                Ok(vector)
            })
            .collect::<EmbedResult<Vec<_>>>()?;
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        "one-hot"
    }
}

async fn memory_store(db_name: &str) -> SurrealCodeStore<Db> {
    let db = Surreal::new::<Mem>(())
        .await
        .expect("failed to create in-memory surrealdb instance");
    db.use_ns("codestore")
        .use_db(db_name)
        .await
        .expect("failed to select surrealdb namespace/db");
    let store = SurrealCodeStore::new(db);
    store.ensure_schema().await.expect("schema should apply");
    store
}

fn control_plane(store: &SurrealCodeStore<Db>, source: FakeSource) -> CodestoreControlPlane<Db> {
    CodestoreControlPlane::with_store(store.clone(), Arc::new(source), Arc::new(FakeEmbedder))
        .with_options(ControlOptions::default().with_default_owner("octo"))
}

fn demo_source() -> FakeSource {
    FakeSource::new(
        "octo/demo",
        &[
            ("src/app.py", "print('hello from the http server')\n"),
            ("img/logo.png", "\u{89}PNG"),
            ("README.md", "# demo\n"),
        ],
    )
}

/// `src/f{idx}.rs` holding `file {idx}` for every slot.
fn numbered_source(repository: &str) -> FakeSource {
    let owned: Vec<(String, String)> = (0..SLOTS)
        .map(|idx| (format!("src/f{idx}.rs"), format!("file {idx}")))
        .collect();
    let files: Vec<(&str, &str)> = owned
        .iter()
        .map(|(path, content)| (path.as_str(), content.as_str()))
        .collect();
    FakeSource::new(repository, &files)
}

fn recording_plane(
    store: &SurrealCodeStore<Db>,
    source: FakeSource,
    embedder: &Arc<RecordingEmbedder>,
    options: ControlOptions,
) -> CodestoreControlPlane<Db> {
    CodestoreControlPlane::with_store(store.clone(), Arc::new(source), Arc::<RecordingEmbedder>::clone(embedder))
        .with_options(options.with_default_owner("octo"))
}

fn file_paths(records: &[CodeFileRecord]) -> Vec<&str> {
    records.iter().map(|record| record.file_path.as_str()).collect()
}

fn file_paths_ranked(ranked: &[RankedCodeFile]) -> Vec<&str> {
    ranked.iter().map(|file| file.file_path.as_str()).collect()
}

#[tokio::test]
async fn ingest_skips_denylisted_files_and_round_trips_content() {
    let store = memory_store("ingest_example").await;
    let control = control_plane(&store, demo_source());

    let report = control.ingest("octo/demo").await.expect("ingest should succeed");
    assert_eq!(report.repository, "octo/demo");
    assert_eq!(report.files_written, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.files_removed, 0);

    let records = control.read_all("octo/demo").await.expect("read_all should succeed");
    assert_eq!(file_paths(&records), ["README.md", "src/app.py"]);
    let app = records
        .iter()
        .find(|record| record.file_path == "src/app.py")
        .expect("app.py should be indexed");
    assert_eq!(app.repository_name, "octo/demo");
    assert_eq!(app.kind, "file");
    assert_eq!(app.content, "print('hello from the http server')\n");
    assert_eq!(app.source_url, "https://github.com/octo/demo/blob/main/src/app.py");
}

#[tokio::test]
async fn reingest_is_idempotent() {
    let store = memory_store("idempotent").await;
    let control = control_plane(&store, demo_source());

    let first = control.ingest("octo/demo").await.expect("first ingest should succeed");
    let second = control.ingest("demo").await.expect("second ingest should succeed");
    assert_eq!(first.files_written, second.files_written);

    let records = control.read_all("octo/demo").await.expect("read_all should succeed");
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn path_search_matches_substrings_within_one_repository() {
    let store = memory_store("path_search").await;
    control_plane(&store, demo_source())
        .ingest("octo/demo")
        .await
        .expect("demo ingest should succeed");
    let other = control_plane(
        &store,
        FakeSource::new("octo/other", &[("app/main.rs", "fn main() {}")]),
    );
    other.ingest("octo/other").await.expect("other ingest should succeed");

    let control = control_plane(&store, demo_source());
    let hits = control
        .find_by_path_substring("octo/demo", "app")
        .await
        .expect("search should succeed");
    assert_eq!(file_paths(&hits), ["src/app.py"]);

    let wildcard = control
        .find_by_path_substring("demo", "src/*.py")
        .await
        .expect("wildcard search should succeed");
    assert_eq!(file_paths(&wildcard), ["src/app.py"]);

    let none = control
        .find_by_path_substring("octo/demo", "APP")
        .await
        .expect("search should succeed");
    assert!(none.is_empty());

    let everything = control
        .find_by_path_substring("octo/demo", "")
        .await
        .expect("empty fragment should list all");
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn commit_files_exclude_removed_and_unindexed_paths() {
    let store = memory_store("latest_commit").await;
    let source = demo_source().with_commit(
        "main",
        &[
            ("src/app.py", "modified"),
            ("README.md", "removed"),
            ("src/new.rs", "added"),
        ],
    );
    let control = control_plane(&store, source);
    control.ingest("octo/demo").await.expect("ingest should succeed");

    let records = control
        .read_latest_commit_files("octo/demo", "main")
        .await
        .expect("commit read should succeed");
    assert_eq!(file_paths(&records), ["src/app.py"]);

    let missing = control.read_latest_commit_files("octo/demo", "nope").await;
    let err = missing.expect_err("unknown commit should fail");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn failed_ingest_leaves_index_unchanged() {
    let store = memory_store("failed_ingest").await;
    control_plane(&store, demo_source())
        .ingest("octo/demo")
        .await
        .expect("initial ingest should succeed");

    let broken = FakeSource::new(
        "octo/demo",
        &[
            ("src/app.py", "changed content"),
            ("src/extra.rs", "fn extra() {}"),
            ("README.md", "# demo\n"),
        ],
    )
    .failing_on("src/extra.rs");
    let err = control_plane(&store, broken)
        .ingest("octo/demo")
        .await
        .expect_err("broken fetch should fail the sweep");
    assert_eq!(err.kind(), ErrorKind::Transport);

    let records = control_plane(&store, demo_source())
        .read_all("octo/demo")
        .await
        .expect("read_all should succeed");
    assert_eq!(file_paths(&records), ["README.md", "src/app.py"]);
    assert!(records.iter().all(|record| record.content != "changed content"));
}

#[tokio::test]
async fn non_utf8_content_is_a_decode_error() {
    let store = memory_store("decode_error").await;
    let source = demo_source().with_raw_file("src/blob.rs", vec![0xff, 0xfe, 0x00]);
    let err = control_plane(&store, source)
        .ingest("octo/demo")
        .await
        .expect_err("invalid utf-8 should fail");
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn files_deleted_upstream_are_tombstoned() {
    let store = memory_store("tombstone").await;
    control_plane(&store, demo_source())
        .ingest("octo/demo")
        .await
        .expect("initial ingest should succeed");

    let trimmed = FakeSource::new("octo/demo", &[("src/app.py", "print('v2')\n")]);
    let control = control_plane(&store, trimmed);
    let report = control.ingest("octo/demo").await.expect("second ingest should succeed");
    assert_eq!(report.files_written, 1);
    assert_eq!(report.files_removed, 1);

    let records = control.read_all("octo/demo").await.expect("read_all should succeed");
    assert_eq!(file_paths(&records), ["src/app.py"]);
    assert_eq!(records[0].content, "print('v2')\n");
}

#[tokio::test]
async fn read_all_pages_past_the_page_size() {
    let store = memory_store("pagination").await;
    let owned: Vec<(String, String)> = (0..7)
        .map(|idx| (format!("src/mod_{idx}.rs"), format!("// module {idx}")))
        .collect();
    let files: Vec<(&str, &str)> = owned
        .iter()
        .map(|(path, content)| (path.as_str(), content.as_str()))
        .collect();
    let control = CodestoreControlPlane::with_store(
        store.clone(),
        Arc::new(FakeSource::new("octo/big", &files)),
        Arc::new(FakeEmbedder),
    )
    .with_options(ControlOptions::default().with_page_size(2));

    control.ingest("octo/big").await.expect("ingest should succeed");
    let records = control.read_all("octo/big").await.expect("read_all should succeed");
    assert_eq!(records.len(), 7);
}

#[tokio::test]
async fn semantic_search_ranks_closest_file_first() {
    let store = memory_store("semantic").await;
    let demo = FakeSource::new(
        "octo/demo",
        &[
            ("src/server.rs", "http server http server"),
            ("src/db.rs", "database access"),
            ("src/render.rs", "render the view"),
            ("empty.txt", "   "),
        ],
    );
    let control = control_plane(&store, demo);
    control.ingest("octo/demo").await.expect("demo ingest should succeed");
    control_plane(&store, FakeSource::new("octo/other", &[("server.rs", "http server")]))
        .ingest("octo/other")
        .await
        .expect("other ingest should succeed");

    let ranked = control
        .semantic_search("octo/demo", "http server", None)
        .await
        .expect("search should succeed");
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].file_path, "src/server.rs");
    assert!(ranked.iter().all(|file| file.repository_name == "octo/demo"));
    assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));

    let limited = control
        .semantic_search("octo/demo", "database", Some(1))
        .await
        .expect("limited search should succeed");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].file_path, "src/db.rs");

    let blank = control.semantic_search("octo/demo", "  ", None).await;
    assert_eq!(blank.expect_err("blank query should fail").kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn invalid_repository_names_are_rejected() {
    let store = memory_store("invalid_repo").await;
    let control = control_plane(&store, demo_source());
    let err = control.read_all("a/b/c").await.expect_err("three segments should fail");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn embedding_batches_follow_the_item_limit_and_keep_file_order() {
    let store = memory_store("embed_batches").await;
    let embedder = Arc::new(RecordingEmbedder::default());
    let control = recording_plane(
        &store,
        numbered_source("octo/batched"),
        &embedder,
        ControlOptions::default().with_embedding_budget(2, 8_000, 250_000),
    );

    let report = control.ingest("octo/batched").await.expect("ingest should succeed");
    assert_eq!(report.files_written, SLOTS);
    assert_eq!(embedder.calls(), [2, 2, 1]);

    for idx in 0..SLOTS {
        let ranked = control
            .semantic_search("octo/batched", &format!("file {idx}"), Some(1))
            .await
            .expect("search should succeed");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].file_path, format!("src/f{idx}.rs"));
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
    }
}

#[tokio::test]
async fn embedding_batches_close_at_the_token_budget() {
    let store = memory_store("embed_token_batches").await;
    let counter = TokenCounter::cl100k().expect("encoder should load");
    let per_file = counter.count("file 0");
    let embedder = Arc::new(RecordingEmbedder::default());
    let control = recording_plane(
        &store,
        numbered_source("octo/budget"),
        &embedder,
        ControlOptions::default().with_embedding_budget(64, 8_000, 2 * per_file),
    );

    control.ingest("octo/budget").await.expect("ingest should succeed");
    assert_eq!(embedder.calls(), [2, 2, 1]);
}

#[tokio::test]
async fn short_embedding_response_fails_the_sweep_without_writing() {
    let store = memory_store("embed_mismatch").await;
    let embedder = Arc::new(RecordingEmbedder::dropping_last());
    let control = recording_plane(
        &store,
        numbered_source("octo/short"),
        &embedder,
        ControlOptions::default().with_embedding_budget(2, 8_000, 250_000),
    );

    let err = control
        .ingest("octo/short")
        .await
        .expect_err("missing vectors should fail");
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("expected 2 embeddings, got 1"));
    assert_eq!(embedder.calls(), [2]);

    let records = control.read_all("octo/short").await.expect("read_all should succeed");
    assert!(records.is_empty());
}

#[tokio::test]
async fn semantic_search_skips_files_embedded_by_another_model() {
    let store = memory_store("model_change").await;
    control_plane(&store, numbered_source("octo/models"))
        .ingest("octo/models")
        .await
        .expect("bag-of-words ingest should succeed");

    let embedder = Arc::new(RecordingEmbedder::default());
    let control = recording_plane(
        &store,
        numbered_source("octo/models"),
        &embedder,
        ControlOptions::default(),
    );
    let stale = control
        .semantic_search("octo/models", "file 2", None)
        .await
        .expect("rows from another model should not break search");
    assert!(stale.is_empty());

    control.ingest("octo/models").await.expect("re-ingest should succeed");
    let ranked = control
        .semantic_search("octo/models", "file 2", Some(1))
        .await
        .expect("search should succeed");
    assert_eq!(file_paths_ranked(&ranked), ["src/f2.rs"]);
}
