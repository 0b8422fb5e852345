//! sw_control tool implementation.
//!
//! Delivers a control-channel message (`forceActivate`, `clearAll` and their
//! aliases) to the engine.

use std::sync::Arc;

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{ControlMessage, Engine};
use swcache_core::Error;

/// Input parameters for sw_control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwControlParams {
    /// Control action: "forceActivate" (alias "skipWaiting") or "clearAll" (alias "clearCache").
    pub action: String,
}

/// Output structure for sw_control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwControlOutput {
    pub action: String,
    /// Reply sent back on the control channel; absent for actions without a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ControlReplyBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ControlReplyBody {
    pub success: bool,
}

pub async fn control_impl(engine: &Arc<Engine>, params: SwControlParams) -> Result<CallToolResult, McpError> {
    let output = run(engine, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

async fn run(engine: &Engine, params: SwControlParams) -> Result<SwControlOutput, Error> {
    let message = ControlMessage::parse(&serde_json::json!({ "action": params.action }).to_string())?;
    let reply = engine.on_control_message(message).await?;

    Ok(SwControlOutput { action: params.action, reply: reply.map(|r| ControlReplyBody { success: r.success }) })
}
