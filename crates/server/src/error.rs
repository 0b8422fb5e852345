//! Structured errors for tool parameters the engine itself never sees.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Unknown lifecycle event or malformed tool argument.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A named store that does not exist.
    #[error("STORE_MISS: no store named {0}")]
    UnknownStore(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::UnknownStore(_) => -32001,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
