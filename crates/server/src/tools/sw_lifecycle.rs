//! sw_lifecycle tool implementation.
//!
//! Fires a lifecycle event (install, activate, reconnect) and returns the
//! engine's report for it.

use std::sync::Arc;

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Engine;
use swcache_core::Error;

use crate::error::ToolError;

/// Input parameters for sw_lifecycle tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwLifecycleParams {
    /// One of "install", "activate", "reconnect".
    pub event: String,

    /// Sync tag for "reconnect" (default: the configured sync tag).
    #[serde(default)]
    pub tag: Option<String>,
}

/// Output structure for sw_lifecycle tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwLifecycleOutput {
    pub event: String,
    /// Manifest paths stored by install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<Vec<String>>,
    /// Manifest paths install could not store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<Vec<String>>,
    /// Stores removed by activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_stores: Option<Vec<String>>,
    /// Drain counts; absent when the tag did not match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain: Option<DrainCounts>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DrainCounts {
    pub replayed: usize,
    pub retained: usize,
    pub abandoned: usize,
}

pub async fn lifecycle_impl(engine: &Arc<Engine>, params: SwLifecycleParams) -> Result<CallToolResult, McpError> {
    let output = run(engine, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

async fn run(engine: &Engine, params: SwLifecycleParams) -> Result<SwLifecycleOutput, ToolError> {
    let mut output = SwLifecycleOutput { event: params.event.clone(), ..Default::default() };

    match params.event.as_str() {
        "install" => {
            let report = engine.on_install().await;
            output.cached = Some(report.cached);
            output.failed = Some(report.failed);
        }
        "activate" => {
            output.deleted_stores = Some(engine.on_activate().await.deleted);
        }
        "reconnect" => {
            let tag = params.tag.unwrap_or_else(|| engine.config().sync.tag.clone());
            output.drain = engine.on_reconnect(&tag).await.map(|r| DrainCounts {
                replayed: r.replayed,
                retained: r.retained,
                abandoned: r.abandoned,
            });
        }
        other => {
            return Err(ToolError::InvalidInput(format!(
                "unknown event {other:?}, expected install, activate or reconnect"
            )));
        }
    }
    Ok(output)
}
