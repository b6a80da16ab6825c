//! MCP JSON-RPC protocol bridge.
//!
//! Exposes the [`ToolRegistry`] as MCP tools over the Streamable HTTP
//! transport mounted at `/mcp`. Each call reads `X-Collection-Name` and
//! `Authorization` from the HTTP request that carried it, exactly like the
//! REST handler does.

use std::borrow::Cow;
use std::sync::Arc;

use axum::http::request::Parts;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};

use crate::client::HttpSearchClient;
use crate::server::request_context;
use crate::tools::{validate_params, ToolRegistry};

const INSTRUCTIONS: &str = "This server provides search and document retrieval for deep research. \
Use the search tool to find relevant documents, then use fetch to retrieve complete document \
content with citations. Send the target collection in the X-Collection-Name header.";

/// Serves the tool registry to MCP sessions.
///
/// Every session gets a clone; all state is behind `Arc` or cheap to clone.
#[derive(Clone)]
pub struct McpBridge {
    client: HttpSearchClient,
    default_collection: Option<String>,
    tools: Arc<ToolRegistry>,
}

impl McpBridge {
    pub fn new(
        client: HttpSearchClient,
        default_collection: Option<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            client,
            default_collection,
            tools,
        }
    }

    fn to_mcp_tool(tool: &dyn crate::tools::Tool) -> Tool {
        let input_schema = match tool.parameters_schema() {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        let read_only = matches!(
            tool.name(),
            "search" | "fetch" | "top_documents" | "rerank_documents" | "get_document_info"
                | "get_document_info_list" | "get_page_info"
        );

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(read_only)),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "ze-cookbook".to_string(),
                title: Some("Deep Research Search".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: rmcp::service::RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self.tools.find(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )
        })?;

        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
        let params = validate_params(&tool.parameters_schema(), &params)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let headers = context
            .extensions
            .get::<Parts>()
            .map(|parts| parts.headers.clone())
            .unwrap_or_default();
        let ctx = request_context(&self.client, self.default_collection.as_deref(), &headers);

        match tool.execute(params, &ctx).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => {
                tracing::warn!(tool = %request.name, error = %e, "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}
