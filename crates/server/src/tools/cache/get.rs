//! cache_get tool implementation.
//!
//! Looks up a stored entry by request identity, in one named store or across
//! every store (latest copy wins).

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Engine, fetch};
use swcache_core::{Entry, Error, RequestKey};

use crate::error::ToolError;
use crate::tools::HeaderPair;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL or origin-relative path of the stored request.
    pub url: String,

    /// Request method of the stored entry (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Store to read from; searches every store when omitted.
    #[serde(default)]
    pub store: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<HeaderPair>,
    pub body: String,
    pub body_bytes: usize,
    /// RFC 3339 time the entry was written.
    pub stored_at: String,
    pub replay_attempts: u32,
}

impl CacheGetOutput {
    fn from_entry(store: Option<String>, entry: Entry) -> Self {
        Self {
            store,
            method: entry.key.method,
            url: entry.key.url,
            status: entry.response.status,
            status_text: entry.response.status_text.clone(),
            headers: entry
                .response
                .headers
                .iter()
                .map(|(name, value)| HeaderPair { name: name.to_string(), value: value.to_string() })
                .collect(),
            body: entry.response.text(),
            body_bytes: entry.response.body.len(),
            stored_at: entry.stored_at.to_rfc3339(),
            replay_attempts: entry.replay_attempts,
        }
    }
}

/// Implementation of the cache_get tool.
pub async fn get_impl(engine: &Arc<Engine>, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let output = lookup(engine, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

async fn lookup(engine: &Engine, params: CacheGetParams) -> Result<CacheGetOutput, McpError> {
    let url = fetch::resolve(engine.classifier().origin(), &params.url).map_err(Error::from)?;
    let key = RequestKey::new(params.method.as_deref().unwrap_or("GET"), &url);
    let registry = engine.registry();

    let Some(name) = params.store else {
        let entry = registry
            .match_any(&key)
            .await
            .ok_or_else(|| Error::StoreMiss(key.to_string()))?;
        return Ok(CacheGetOutput::from_entry(None, entry));
    };

    if !registry.store_names().await?.contains(&name) {
        return Err(ToolError::UnknownStore(name).into());
    }
    let entry = registry
        .open_store(&name)
        .await
        .match_entry(&key)
        .await?
        .ok_or_else(|| Error::StoreMiss(key.to_string()))?;
    Ok(CacheGetOutput::from_entry(Some(name), entry))
}
