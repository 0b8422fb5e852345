//! sw_fetch tool implementation.
//!
//! Runs one request through the engine exactly as an intercepted page fetch
//! would be handled, and reports which strategy answered and from where.

use std::sync::Arc;

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Engine, fetch};
use swcache_core::{Error, InterceptedRequest};

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path relative to the configured origin (e.g. "/style.css").
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: Vec<HeaderPair>,

    /// Request body as text.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// False when the request is outside the engine's scope and goes straight to the network.
    pub intercepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    /// One of network, store, stale-store, fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Background store writes started by this request (settled before returning).
    #[serde(default)]
    pub pending_writes: usize,
}

impl SwFetchOutput {
    fn passthrough() -> Self {
        Self {
            intercepted: false,
            classification: None,
            source: None,
            status: None,
            status_text: None,
            headers: Vec::new(),
            body: None,
            pending_writes: 0,
        }
    }
}

pub async fn fetch_impl(engine: &Arc<Engine>, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let output = run(engine, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

async fn run(engine: &Engine, params: SwFetchParams) -> Result<SwFetchOutput, Error> {
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()));
    }
    let url = fetch::resolve(engine.classifier().origin(), &params.url)?;

    let mut request = InterceptedRequest::new(params.method.trim(), url);
    for header in params.headers {
        request = request.with_header(header.name, header.value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let Some(handled) = engine.on_request(&request).await else {
        return Ok(SwFetchOutput::passthrough());
    };

    let pending_writes = handled.pending.len();
    handled.pending.settle().await;

    let response = handled.response;
    Ok(SwFetchOutput {
        intercepted: true,
        classification: Some(handled.classification.to_string()),
        source: Some(handled.source.as_str().to_string()),
        status: Some(response.status),
        status_text: Some(response.status_text.clone()),
        headers: response
            .headers
            .iter()
            .map(|(name, value)| HeaderPair { name: name.to_string(), value: value.to_string() })
            .collect(),
        body: Some(response.text()),
        pending_writes,
    })
}
