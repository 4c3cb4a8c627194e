//! MCP server implementation for codestore.
//!
//! This crate wires the codestore operations into rmcp tool handlers and
//! exposes the MCP-facing API surface for ingestion and query.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use codestore_core::control::Codestore;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

pub use helpers::ToolFailure;

const SERVER_INSTRUCTIONS: &str = r"codestore indexes GitHub repositories into a vector database and answers code questions from that index.

Workflow:
1. Call `update_codebase` with a `repository` (`owner/name`, or a bare `name` owned by the configured account).
   This walks the repository, skips binary formats, embeds every text file, and replaces the indexed copy.
2. Query the index:
   - `search_by_location` finds files whose path contains a fragment (`*` and `?` are wildcards).
   - `read_all` returns every indexed file.
   - `read_latest_commit` returns indexed files touched by a commit, branch, or tag.
   - `semantic_search` ranks files by similarity to free text.

Notes:
- Results are JSON arrays of records with `file_path`, `source_url`, `kind`, `repository_name`, and `content`.
- Failures are tool errors with a message and a JSON `{kind, message}` part.
- Reads only see what the last `update_codebase` indexed.
- `health` returns `ok`; `help` lists the tools.";

/// MCP server wrapper around the shared codestore handle.
#[derive(Clone)]
pub struct CodestoreMcp {
    tool_router: ToolRouter<Self>,
    codestore: Arc<dyn Codestore>,
}

impl CodestoreMcp {
    /// Creates a new server over a shared codestore handle.
    #[must_use]
    pub fn new(codestore: Arc<dyn Codestore>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_query()
            + Self::tool_router_ingest()
            + Self::tool_router_context();
        Self {
            tool_router,
            codestore,
        }
    }

    pub(crate) fn codestore(&self) -> &dyn Codestore {
        self.codestore.as_ref()
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl CodestoreMcp {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl ServerHandler for CodestoreMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
