use std::error::Error;
use std::sync::Arc;

use codestore_core::control::{CodestoreControlPlane, ControlOptions};
use codestore_core::embed::{OpenAiEmbedder, OpenAiEmbedderConfig};
use codestore_core::ingest::ExtensionFilter;
use codestore_core::source::{GitHubClient, GitHubClientConfig};
use codestore_core::store::SurrealCodeStore;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::config::CodestoreConfig;

pub type BootstrapError = Box<dyn Error + Send + Sync>;

/// Connects to the database, ensures the schema, and builds the shared
/// codestore handle used by every MCP session.
///
/// # Errors
/// Returns an error if the database is unreachable, sign-in or schema setup
/// fails, or a client cannot be built from the configuration.
pub async fn build_codestore(
    config: &CodestoreConfig,
) -> Result<Arc<CodestoreControlPlane<Any>>, BootstrapError> {
    let db = any::connect(config.db_endpoint.as_str()).await?;
    if let (Some(username), Some(password)) =
        (config.db_username.as_ref(), config.db_password.as_ref())
    {
        db.signin(Root {
            username: username.as_str(),
            password: password.as_str(),
        })
        .await?;
    }
    db.use_ns(config.db_namespace.as_str())
        .use_db(config.db_database.as_str())
        .await?;

    let store = SurrealCodeStore::new(db);
    store.ensure_schema().await?;
    info!(
        endpoint = %config.db_endpoint,
        namespace = %config.db_namespace,
        database = %config.db_database,
        "code store ready"
    );

    let mut github = GitHubClientConfig::new(config.github_token.as_str())
        .with_timeout(config.http_timeout);
    if let Some(base_url) = &config.github_api_url {
        github = github.with_base_url(base_url.as_str());
    }
    let source = GitHubClient::new(github)?;

    let mut openai = OpenAiEmbedderConfig::new(config.openai_api_key.as_str())
        .with_model(config.embedding_model.as_str())
        .with_timeout(config.http_timeout);
    let retry_base = openai.retry_base;
    openai = openai.with_retries(config.embed_max_retries, retry_base);
    if let Some(base_url) = &config.openai_base_url {
        openai = openai.with_base_url(base_url.as_str());
    }
    let embedder = OpenAiEmbedder::new(openai)?;

    let options = ControlOptions::default()
        .with_default_owner(config.github_username.as_str())
        .with_page_size(config.page_size)
        .with_search_limit(config.search_limit)
        .with_embedding_budget(
            config.embed_batch_size,
            config.embed_max_tokens,
            config.embed_batch_tokens,
        )
        .with_filter(ExtensionFilter::with_extra(&config.skip_extensions));

    let control = CodestoreControlPlane::with_store(store, Arc::new(source), Arc::new(embedder))
        .with_options(options);
    Ok(Arc::new(control))
}
