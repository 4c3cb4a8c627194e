use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{CodestoreMcp, helpers};

/// Parameters for refreshing a repository's index.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UpdateCodebaseParams {
    /// `owner/name`, or a bare `name` owned by the configured account.
    pub repository: String,
}

#[tool_router(router = tool_router_ingest, vis = "pub")]
impl CodestoreMcp {
    #[tool(description = "Fetch the latest code of a GitHub repository and replace its indexed copy.")]
    async fn update_codebase(
        &self,
        Parameters(params): Parameters<UpdateCodebaseParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let repository = helpers::require(&params.repository, "repository")?;
        info!(repository, "update_codebase requested");
        match self.codestore().ingest(repository).await {
            Ok(report) => {
                let summary = format!(
                    "Codebase updated successfully - {} files written, {} skipped, {} removed",
                    report.files_written, report.files_skipped, report.files_removed
                );
                Ok(CallToolResult::success(vec![
                    Content::text(summary),
                    Content::json(report)?,
                ]))
            }
            Err(err) => helpers::tool_failure(helpers::UPDATE_FAILURE, &err),
        }
    }
}
