use clap::{Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_DB_ENDPOINT: &str = "mem://";
const DEFAULT_DB_NAMESPACE: &str = "codestore";
const DEFAULT_DB_DATABASE: &str = "codestore";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_EMBED_BATCH_SIZE: usize = 64;
const DEFAULT_EMBED_MAX_TOKENS: usize = 8_000;
const DEFAULT_EMBED_BATCH_TOKENS: usize = 250_000;
const DEFAULT_EMBED_MAX_RETRIES: u32 = 3;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";

#[derive(Parser, Debug)]
#[command(name = "codestore-mcpd", version, about = "Codestore MCP daemon.")]
struct CliArgs {
    #[arg(long, env = "CODESTORE_DB_ENDPOINT", default_value = DEFAULT_DB_ENDPOINT)]
    db_endpoint: String,

    #[arg(long, env = "CODESTORE_DB_NAMESPACE", default_value = DEFAULT_DB_NAMESPACE)]
    db_namespace: String,

    #[arg(long, env = "CODESTORE_DB_DATABASE", default_value = DEFAULT_DB_DATABASE)]
    db_database: String,

    #[arg(long, env = "CODESTORE_DB_USERNAME")]
    db_username: Option<String>,

    #[arg(long, env = "CODESTORE_DB_PASSWORD")]
    db_password: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    #[arg(long, env = "CODESTORE_OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    #[arg(long, env = "CODESTORE_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, env = "CODESTORE_EMBED_BATCH_SIZE", default_value_t = DEFAULT_EMBED_BATCH_SIZE)]
    embed_batch_size: usize,

    #[arg(long, env = "CODESTORE_EMBED_MAX_TOKENS", default_value_t = DEFAULT_EMBED_MAX_TOKENS)]
    embed_max_tokens: usize,

    #[arg(
        long,
        env = "CODESTORE_EMBED_BATCH_TOKENS",
        default_value_t = DEFAULT_EMBED_BATCH_TOKENS
    )]
    embed_batch_tokens: usize,

    #[arg(long, env = "CODESTORE_EMBED_MAX_RETRIES", default_value_t = DEFAULT_EMBED_MAX_RETRIES)]
    embed_max_retries: u32,

    #[arg(long, env = "GITHUB_ACCESS_TOKEN")]
    github_token: Option<String>,

    #[arg(long, env = "GITHUB_USERNAME")]
    github_username: Option<String>,

    #[arg(long, env = "CODESTORE_GITHUB_API_URL")]
    github_api_url: Option<String>,

    #[arg(long, env = "CODESTORE_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout_secs: u64,

    #[arg(long, env = "CODESTORE_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    #[arg(long, env = "CODESTORE_SEARCH_LIMIT", default_value_t = DEFAULT_SEARCH_LIMIT)]
    search_limit: usize,

    #[arg(long, env = "CODESTORE_SKIP_EXTENSIONS", value_delimiter = ',')]
    skip_extensions: Vec<String>,

    #[arg(
        long = "stdio",
        env = "CODESTORE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "CODESTORE_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "CODESTORE_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Clone)]
pub struct CodestoreConfig {
    pub db_endpoint: String,
    pub db_namespace: String,
    pub db_database: String,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub embedding_model: String,
    pub embed_batch_size: usize,
    pub embed_max_tokens: usize,
    pub embed_batch_tokens: usize,
    pub embed_max_retries: u32,
    pub github_token: String,
    pub github_username: String,
    pub github_api_url: Option<String>,
    pub http_timeout: Duration,
    pub page_size: usize,
    pub search_limit: usize,
    pub skip_extensions: Vec<String>,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
}

impl fmt::Debug for CodestoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodestoreConfig")
            .field("db_endpoint", &self.db_endpoint)
            .field("db_namespace", &self.db_namespace)
            .field("db_database", &self.db_database)
            .field("embedding_model", &self.embedding_model)
            .field("github_username", &self.github_username)
            .field("enable_stdio", &self.enable_stdio)
            .field("mcp_serve", &self.mcp_serve)
            .field("mcp_http_addr", &self.mcp_http_addr)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl CodestoreConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn is_memory_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with("mem://")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn require(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    non_blank(value).ok_or(ConfigError::MissingSetting(name))
}

fn require_positive<T>(value: T, name: &'static str) -> Result<T, ConfigError>
where
    T: Default + PartialEq + ToString,
{
    if value == T::default() {
        return Err(ConfigError::InvalidSetting {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

impl TryFrom<CliArgs> for CodestoreConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let db_endpoint = args.db_endpoint.trim().to_string();
        if db_endpoint.is_empty() {
            return Err(ConfigError::MissingSetting("CODESTORE_DB_ENDPOINT"));
        }
        let db_username = non_blank(args.db_username);
        let db_password = non_blank(args.db_password);
        if !is_memory_endpoint(&db_endpoint) {
            if db_username.is_none() {
                return Err(ConfigError::MissingSetting("CODESTORE_DB_USERNAME"));
            }
            if db_password.is_none() {
                return Err(ConfigError::MissingSetting("CODESTORE_DB_PASSWORD"));
            }
        }

        if args.db_namespace.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "CODESTORE_DB_NAMESPACE",
                value: args.db_namespace,
            });
        }
        if args.db_database.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "CODESTORE_DB_DATABASE",
                value: args.db_database,
            });
        }
        if !args.enable_stdio && !args.mcp_serve {
            return Err(ConfigError::InvalidSetting {
                name: "CODESTORE_MCP_SERVE",
                value: "false with stdio disabled; nothing to serve".to_string(),
            });
        }

        let skip_extensions = args
            .skip_extensions
            .into_iter()
            .map(|ext| ext.trim().to_string())
            .filter(|ext| !ext.is_empty())
            .collect();

        Ok(Self {
            db_endpoint,
            db_namespace: args.db_namespace,
            db_database: args.db_database,
            db_username,
            db_password,
            openai_api_key: require(args.openai_api_key, "OPENAI_API_KEY")?,
            openai_base_url: non_blank(args.openai_base_url),
            embedding_model: args.embedding_model,
            embed_batch_size: require_positive(
                args.embed_batch_size,
                "CODESTORE_EMBED_BATCH_SIZE",
            )?,
            embed_max_tokens: require_positive(
                args.embed_max_tokens,
                "CODESTORE_EMBED_MAX_TOKENS",
            )?,
            embed_batch_tokens: require_positive(
                args.embed_batch_tokens,
                "CODESTORE_EMBED_BATCH_TOKENS",
            )?,
            embed_max_retries: args.embed_max_retries,
            github_token: require(args.github_token, "GITHUB_ACCESS_TOKEN")?,
            github_username: require(args.github_username, "GITHUB_USERNAME")?,
            github_api_url: non_blank(args.github_api_url),
            http_timeout: Duration::from_secs(require_positive(
                args.http_timeout_secs,
                "CODESTORE_HTTP_TIMEOUT_SECS",
            )?),
            page_size: require_positive(args.page_size, "CODESTORE_PAGE_SIZE")?,
            search_limit: require_positive(args.search_limit, "CODESTORE_SEARCH_LIMIT")?,
            skip_extensions,
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
        })
    }
}
