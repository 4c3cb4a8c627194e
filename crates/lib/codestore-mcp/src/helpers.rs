use std::borrow::Cow;

use codestore_core::control::{ControlError, ErrorKind};
use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content, ErrorCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SEARCH_FAILURE: &str = "Error: Unable to search codebase";
pub const UPDATE_FAILURE: &str = "Error: Unable to update codebase with latest code";

/// Structured part of a failed tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ErrorKind,
    pub message: String,
}

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

/// Rejects blank required arguments before they reach the codestore.
pub fn require<'a>(value: &'a str, field: &str) -> Result<&'a str, ErrorData> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(mcp_err(ErrorCode::INVALID_PARAMS, format!("{field} is required")));
    }
    Ok(trimmed)
}

/// Renders a control-plane failure as an error tool result.
///
/// The first part is the prefixed human-readable message; the second is the
/// same message tagged with its [`ErrorKind`].
pub fn tool_failure(prefix: &str, err: &ControlError) -> Result<CallToolResult, ErrorData> {
    let failure = ToolFailure {
        kind: err.kind(),
        message: format!("{prefix} - {err}"),
    };
    warn!(kind = %failure.kind, error = %err, "tool call failed");
    Ok(CallToolResult::error(vec![
        Content::text(failure.message.clone()),
        Content::json(failure)?,
    ]))
}
