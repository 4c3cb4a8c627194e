use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{CodestoreMcp, helpers};

/// Parameters for searching files by path fragment.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchByLocationParams {
    /// `owner/name`, or a bare `name` owned by the configured account.
    pub repository: String,
    /// Path fragment; `*` and `?` act as wildcards.
    pub location: String,
}

/// Parameters for reading every indexed file of a repository.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReadAllParams {
    pub repository: String,
}

/// Parameters for reading the files touched by a commit.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReadLatestCommitParams {
    pub repository: String,
    /// Commit SHA, branch, or tag.
    #[serde(alias = "branch")]
    pub commit_reference: String,
}

/// Parameters for similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SemanticSearchParams {
    pub repository: String,
    #[serde(alias = "context")]
    pub query: String,
    pub limit: Option<usize>,
}

#[tool_router(router = tool_router_query, vis = "pub")]
impl CodestoreMcp {
    #[tool(description = "Find indexed files whose path contains a fragment.")]
    async fn search_by_location(
        &self,
        Parameters(params): Parameters<SearchByLocationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repository = helpers::require(&params.repository, "repository")?;
        match self
            .codestore()
            .find_by_path_substring(repository, &params.location)
            .await
        {
            Ok(records) => Ok(CallToolResult::success(vec![Content::json(records)?])),
            Err(err) => helpers::tool_failure(helpers::SEARCH_FAILURE, &err),
        }
    }

    #[tool(description = "Read every indexed file of a repository.")]
    async fn read_all(
        &self,
        Parameters(params): Parameters<ReadAllParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repository = helpers::require(&params.repository, "repository")?;
        match self.codestore().read_all(repository).await {
            Ok(records) => Ok(CallToolResult::success(vec![Content::json(records)?])),
            Err(err) => helpers::tool_failure(helpers::SEARCH_FAILURE, &err),
        }
    }

    #[tool(description = "Read the indexed files added or modified by a commit, branch head, or tag.")]
    async fn read_latest_commit(
        &self,
        Parameters(params): Parameters<ReadLatestCommitParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repository = helpers::require(&params.repository, "repository")?;
        let reference = helpers::require(&params.commit_reference, "commit_reference")?;
        match self
            .codestore()
            .read_latest_commit_files(repository, reference)
            .await
        {
            Ok(records) => Ok(CallToolResult::success(vec![Content::json(records)?])),
            Err(err) => helpers::tool_failure(helpers::SEARCH_FAILURE, &err),
        }
    }

    #[tool(description = "Rank indexed files by semantic similarity to a free-text query.")]
    async fn semantic_search(
        &self,
        Parameters(params): Parameters<SemanticSearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repository = helpers::require(&params.repository, "repository")?;
        match self
            .codestore()
            .semantic_search(repository, &params.query, params.limit)
            .await
        {
            Ok(ranked) => Ok(CallToolResult::success(vec![Content::json(ranked)?])),
            Err(err) => helpers::tool_failure(helpers::SEARCH_FAILURE, &err),
        }
    }
}
