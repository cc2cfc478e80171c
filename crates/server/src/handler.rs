//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the favicon and screenshot services.
use crate::tools::favicon::{FaviconBatchParams, FaviconResolveParams, batch_impl, resolve_impl};
use crate::tools::screenshot::{
    ScreenshotBatchParams, ScreenshotResolveParams, batch_impl as screenshot_batch_impl,
    resolve_impl as screenshot_resolve_impl,
};

use markcache_client::{FaviconService, ScreenshotService};
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

/// The main MCP server handler for markcache.
#[derive(Clone)]
pub struct MarkcacheServer {
    favicons: FaviconService,
    screenshots: ScreenshotService,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl MarkcacheServer {
    /// Create a new server handler around the given services.
    pub fn new(favicons: FaviconService, screenshots: ScreenshotService) -> Self {
        Self { favicons, screenshots, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Resolve the favicon of a domain or URL. Returns the icon URL, where it came from, and whether it was served from cache. Never fails for a valid domain: unresolvable sites get a lettered placeholder."
    )]
    async fn favicon_resolve(&self, params: Parameters<FaviconResolveParams>) -> Result<CallToolResult, McpError> {
        resolve_impl(&self.favicons, params.0).await
    }

    #[tool(description = "Resolve favicons for up to 10 domains concurrently. Returns a map from input to result.")]
    async fn favicon_batch(&self, params: Parameters<FaviconBatchParams>) -> Result<CallToolResult, McpError> {
        batch_impl(&self.favicons, params.0).await
    }

    #[tool(
        description = "Resolve a screenshot of a web page, with small/medium/large thumbnail URLs. Unrenderable pages get a placeholder image."
    )]
    async fn screenshot_resolve(
        &self, params: Parameters<ScreenshotResolveParams>,
    ) -> Result<CallToolResult, McpError> {
        screenshot_resolve_impl(&self.screenshots, params.0).await
    }

    #[tool(description = "Resolve screenshots for up to 5 pages concurrently. Returns a map from input to result.")]
    async fn screenshot_batch(&self, params: Parameters<ScreenshotBatchParams>) -> Result<CallToolResult, McpError> {
        screenshot_batch_impl(&self.screenshots, params.0).await
    }
}

impl ServerHandler for MarkcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "markcache".into(),
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
