//! Deep-research HTTP server.
//!
//! Serves the [`ToolRegistry`] two ways: a JSON REST API, and an MCP
//! Streamable HTTP endpoint for ChatGPT deep research, Cursor and other MCP
//! clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call any registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//! | any    | `/mcp` | MCP Streamable HTTP transport |
//!
//! # Request headers
//!
//! `X-Collection-Name` selects the collection a tool works on. Without it,
//! `[server].default_collection` is used; with neither, collection-bound
//! tools fail with `bad_request`. `Authorization` is forwarded verbatim to
//! the search service, replacing the server's own key for that call.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `tool_error` (500).

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::client::HttpSearchClient;
use crate::config::Config;
use crate::mcp::McpBridge;
use crate::tools::{validate_params, ToolContext, ToolInfo, ToolRegistry};

pub const COLLECTION_HEADER: &str = "x-collection-name";

#[derive(Clone)]
struct AppState {
    client: HttpSearchClient,
    default_collection: Option<String>,
    tools: Arc<ToolRegistry>,
}

/// Build the per-call tool context from request headers.
pub(crate) fn request_context(
    client: &HttpSearchClient,
    default_collection: Option<&str>,
    headers: &HeaderMap,
) -> ToolContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let collection = header(COLLECTION_HEADER)
        .or(default_collection)
        .map(str::to_string);

    let client = match header("authorization") {
        Some(auth) => client.with_authorization(auth),
        None => client.clone(),
    };

    ToolContext::new(Arc::new(client), collection)
}

/// Build the application router: REST tool API plus `/mcp`.
pub fn build_router(
    client: HttpSearchClient,
    default_collection: Option<String>,
    tools: Arc<ToolRegistry>,
) -> Router {
    let bridge = McpBridge::new(client.clone(), default_collection.clone(), tools.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let state = AppState {
        client,
        default_collection,
        tools,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(state)
}

/// Entry point for `zec serve mcp`. Runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let client = HttpSearchClient::from_config(&config.service)?;
    let tools = Arc::new(ToolRegistry::with_builtins());

    println!("Registered {} tools:", tools.len());
    for t in tools.tools() {
        println!("  POST /tools/{} : {}", t.name(), t.description());
    }

    let app = build_router(client, config.server.default_collection.clone(), tools);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("MCP server listening on http://{}/mcp", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("server stopped by user");
        })
        .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "conflict",
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error",
        message: message.into(),
    }
}

/// Map a tool failure to a status code.
///
/// Service errors keep their meaning (404, 409); validation failures
/// become 400; everything else is a 500.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    use crate::error::ServiceError;

    let msg = format!("{}: {}", tool_name, err);
    match err.downcast_ref::<ServiceError>() {
        Some(ServiceError::NotFound(_)) => return not_found(msg),
        Some(ServiceError::Conflict(_)) => return conflict(msg),
        Some(_) => return tool_error(msg),
        None => {}
    }

    let text = err.to_string();
    if text.contains("must not be empty") || text.contains("missing") || text.contains("invalid")
    {
        bad_request(msg)
    } else {
        tool_error(msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.infos(),
    })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let ctx = request_context(&state.client, state.default_collection.as_deref(), &headers);
    let result = tool
        .execute(validated, &ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
