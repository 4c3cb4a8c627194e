use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::CodestoreMcp;

/// Payload listing the served MCP commands.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        Self {
            commands: vec![
                "help - List the MCP commands served by codestore.".to_string(),
                "health - Returns 'ok'.".to_string(),
                "update_codebase - Fetch a repository from GitHub and replace its indexed copy. Args: repository."
                    .to_string(),
                "search_by_location - Files whose path contains a fragment. Args: repository, location."
                    .to_string(),
                "read_all - Every indexed file of a repository. Args: repository.".to_string(),
                "read_latest_commit - Indexed files added or modified by a commit. Args: repository, commit_reference."
                    .to_string(),
                "semantic_search - Files ranked by similarity to free text. Args: repository, query, limit?"
                    .to_string(),
            ],
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl CodestoreMcp {
    #[tool(description = "List the MCP commands served by codestore, with their arguments.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }
}
