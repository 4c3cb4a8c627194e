use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;

use super::{
    ChangedFile,
    CommitInfo,
    ContentEntry,
    RepositoryRef,
    SourceError,
    SourceHost,
    SourceResult,
};

const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const COMMIT_FILES_PER_PAGE: usize = 100;
const MAX_COMMIT_FILE_PAGES: u32 = 30;

/// Settings for the GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub token: String,
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl GitHubClientConfig {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("codestore/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Overrides the API root, e.g. for GitHub Enterprise or tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`SourceHost`] backed by the GitHub REST v3 contents and commits APIs.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    base_url: Url,
}

impl GitHubClient {
    /// Builds the client.
    ///
    /// # Errors
    /// Returns `SourceError::InvalidInput` for a malformed base URL, or
    /// `SourceError::Transport` if the HTTP client cannot be constructed.
    pub fn new(config: GitHubClientConfig) -> SourceResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            SourceError::InvalidInput(format!(
                "invalid GitHub API url `{}`: {err}",
                config.base_url
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidInput(format!(
                "GitHub API url `{}` cannot be a base",
                config.base_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self {
            http,
            token: config.token,
            base_url,
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(segments.into_iter().filter(|segment| !segment.is_empty()));
        }
        url
    }

    fn contents_url(&self, repo: &RepositoryRef, path: &str) -> Url {
        let prefix = ["repos", repo.owner.as_str(), repo.name.as_str(), "contents"];
        self.endpoint(prefix.into_iter().chain(path.split('/')))
    }

    async fn get(&self, url: Url) -> SourceResult<Response> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        what: &str,
    ) -> SourceResult<T> {
        let response = check_status(self.get(url).await?, what).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| SourceError::Decode(format!("{what}: unexpected response body: {err}")))
    }

    async fn download_raw(&self, url: &str, what: &str) -> SourceResult<Vec<u8>> {
        let url = Url::parse(url)
            .map_err(|err| SourceError::Decode(format!("{what}: invalid download url: {err}")))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.raw")
            .send()
            .await?;
        let response = check_status(response, what).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentEntry>),
    Single(ContentEntry),
}

#[derive(Deserialize)]
struct FileContents {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    size: u64,
}

#[derive(Deserialize)]
struct CommitPage {
    sha: String,
    #[serde(default)]
    files: Vec<ChangedFile>,
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn list_directory(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> SourceResult<Vec<ContentEntry>> {
        let what = format!("{repo}:/{path}");
        let url = self.contents_url(repo, path);
        match self.get_json::<ContentsResponse>(url, &what).await? {
            ContentsResponse::Listing(entries) => Ok(entries),
            ContentsResponse::Single(entry) => Err(SourceError::InvalidInput(format!(
                "{what} is a {:?}, not a directory",
                entry.kind
            ))),
        }
    }

    async fn fetch_file(
        &self,
        repo: &RepositoryRef,
        entry: &ContentEntry,
    ) -> SourceResult<Vec<u8>> {
        let what = format!("{repo}:/{}", entry.path);
        let url = self.contents_url(repo, &entry.path);
        let contents: FileContents = self.get_json(url, &what).await?;

        match (contents.encoding.as_deref(), contents.content) {
            (Some("base64"), Some(encoded)) => decode_base64(&encoded, &what),
            _ => {
                if contents.size == 0 {
                    return Ok(Vec::new());
                }
                let download_url = contents
                    .download_url
                    .or_else(|| entry.download_url.clone())
                    .ok_or_else(|| {
                        SourceError::Decode(format!(
                            "{what}: no inline content and no download url"
                        ))
                    })?;
                self.download_raw(&download_url, &what).await
            }
        }
    }

    async fn get_commit(&self, repo: &RepositoryRef, reference: &str) -> SourceResult<CommitInfo> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SourceError::InvalidInput("commit reference is required".to_string()));
        }
        let what = format!("{repo}@{reference}");
        let per_page = COMMIT_FILES_PER_PAGE.to_string();

        let mut sha = None;
        let mut files = Vec::new();
        for page in 1..=MAX_COMMIT_FILE_PAGES {
            let mut url = self.endpoint([
                "repos",
                repo.owner.as_str(),
                repo.name.as_str(),
                "commits",
                reference,
            ]);
            url.query_pairs_mut()
                .append_pair("per_page", &per_page)
                .append_pair("page", &page.to_string());
            let commit: CommitPage = self.get_json(url, &what).await?;
            let fetched = commit.files.len();
            sha.get_or_insert(commit.sha);
            files.extend(commit.files);
            if fetched < COMMIT_FILES_PER_PAGE {
                break;
            }
        }

        Ok(CommitInfo {
            sha: sha.unwrap_or_default(),
            files,
        })
    }
}

async fn check_status(response: Response, what: &str) -> SourceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let rate_limited =
        status == StatusCode::TOO_MANY_REQUESTS || is_rate_limited(response.headers());
    let body = response.text().await.unwrap_or_default();
    let detail = format!("{what}: HTTP {status}: {}", body.trim());
    if rate_limited {
        return Err(SourceError::Transport(format!("rate limited: {detail}")));
    }
    Err(match status.as_u16() {
        401 | 403 => SourceError::Auth(detail),
        404 | 422 => SourceError::NotFound(detail),
        _ => SourceError::Transport(detail),
    })
}

/// Primary limits exhaust `x-ratelimit-remaining`; secondary limits send
/// `retry-after`. Both arrive as 403 and are not credential failures.
fn is_rate_limited(headers: &HeaderMap) -> bool {
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .is_some_and(|remaining| remaining.as_bytes() == b"0");
    exhausted || headers.contains_key(RETRY_AFTER)
}

fn decode_base64(encoded: &str, what: &str) -> SourceResult<Vec<u8>> {
    let compact: String = encoded.chars().filter(|ch| !ch.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| SourceError::Decode(format!("{what}: invalid base64 content: {err}")))
}
