//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the engine-backed tool implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, get_impl};
use crate::tools::sw_control::{SwControlParams, control_impl};
use crate::tools::sw_fetch::{SwFetchParams, fetch_impl};
use crate::tools::sw_lifecycle::{SwLifecycleParams, lifecycle_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_client::Engine;

/// The main MCP server handler for sw-cache.
#[derive(Clone)]
pub struct SwCacheServer {
    tool_router: ToolRouter<Self>,
    engine: Arc<Engine>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwCacheServer {
    /// Create a new server handler around an installed engine.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { tool_router: Self::tool_router(), engine }
    }

    #[tool(
        description = "Send a request through the cache engine. Returns the response with its strategy classification and source (network, store, stale-store, fallback), or intercepted=false for requests outside the engine's scope."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.engine, params.0).await
    }

    #[tool(description = "Deliver a control message: forceActivate (alias skipWaiting) or clearAll (alias clearCache).")]
    async fn sw_control(&self, params: Parameters<SwControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.engine, params.0).await
    }

    #[tool(
        description = "Fire a lifecycle event: install (precache manifest), activate (sweep old store versions) or reconnect (drain the background sync queue for a tag)."
    )]
    async fn sw_lifecycle(&self, params: Parameters<SwLifecycleParams>) -> Result<CallToolResult, McpError> {
        lifecycle_impl(&self.engine, params.0).await
    }

    #[tool(description = "Read a stored entry by URL from one named store, or the latest copy across all stores.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.engine, params.0).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sw-cache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{RouteTransport, engine};

    #[tokio::test]
    async fn test_lists_all_tools() {
        let server = SwCacheServer::new(engine(Arc::new(RouteTransport::default())).await);
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cache_get", "sw_control", "sw_fetch", "sw_lifecycle"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = SwCacheServer::new(engine(Arc::new(RouteTransport::default())).await);
        assert_eq!(server.get_info().server_info.name, "sw-cache");
    }
}
