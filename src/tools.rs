//! Agent tools.
//!
//! Every operation the server exposes, over REST (`POST /tools/{name}`) and
//! over MCP (`tools/call`), is a [`Tool`] in a [`ToolRegistry`]. The CLI's
//! `zec tools call` goes through the same registry.
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                ToolRegistry                │
//! │  ┌──────────────┐  ┌────────────────────┐  │
//! │  │ deep research│  │ agent tools        │  │
//! │  │ search/fetch │  │ top_documents, ... │  │
//! │  └──────────────┘  └────────────────────┘  │
//! └──────────────┬─────────────────────────────┘
//!                ▼
//!     REST dispatch · MCP bridge · CLI
//! ```
//!
//! Tools receive a [`ToolContext`] holding the service handle for this call
//! (already carrying the caller's `Authorization`, when one was forwarded)
//! and the collection named by the request.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::client::{HttpSearchClient, SearchService};
use crate::config::Config;
use crate::models::{
    DocumentContent, DocumentListQuery, Metadata, RerankRequest, TopDocumentsRequest,
    TopSnippetsRequest, TopSnippetsResponse,
};

/// Snippets requested by the deep-research `search` tool.
pub const SEARCH_SNIPPETS: u32 = 15;

/// Reranker used when a caller names none.
pub const DEFAULT_RERANK_MODEL: &str = "zerank-1";

/// A tool that agents can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`); lowercase with underscores.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Deep-research tools are marked builtin in `GET /tools/list`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema (`type: "object"`) of the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` has already passed [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Per-call bridge to the search service.
pub struct ToolContext {
    service: Arc<dyn SearchService>,
    collection: Option<String>,
}

impl ToolContext {
    pub fn new(service: Arc<dyn SearchService>, collection: Option<String>) -> Self {
        Self {
            service,
            collection,
        }
    }

    pub fn service(&self) -> &dyn SearchService {
        self.service.as_ref()
    }

    /// The collection named by the request.
    pub fn collection(&self) -> Result<&str> {
        match self.collection.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => bail!("missing collection: the header X-Collection-Name must be provided"),
        }
    }

    /// `collection_name` from `params` when present, else the request's.
    fn collection_for(&self, params: &Value) -> Result<String> {
        match params.get("collection_name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
            _ => self.collection().map(str::to_string),
        }
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or("")
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    let value = str_param(params, key);
    if value.trim().is_empty() {
        bail!("{} must not be empty", key);
    }
    Ok(value)
}

fn u32_param(params: &Value, key: &str, default: u32) -> u32 {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v.min(u32::MAX as u64) as u32)
        .unwrap_or(default)
}

// ═══════════════════════════════════════════════════════════════════════
// Deep research
// ═══════════════════════════════════════════════════════════════════════

/// One `search` result, shaped for deep-research clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub text: Option<String>,
    pub url: Option<String>,
}

/// Collapse snippets to one hit per document, first occurrence wins.
pub fn search_hits(response: &TopSnippetsResponse) -> Vec<SearchHit> {
    let urls: HashMap<&str, Option<&String>> = response
        .document_results
        .iter()
        .map(|d| (d.path.as_str(), d.file_url.as_ref()))
        .collect();

    let mut seen = HashSet::new();
    response
        .results
        .iter()
        .filter(|s| seen.insert(s.path.as_str()))
        .map(|s| SearchHit {
            id: s.path.clone(),
            title: s.path.clone(),
            text: s.content.clone(),
            url: urls.get(s.path.as_str()).copied().flatten().cloned(),
        })
        .collect()
}

/// Snippet search over the request's collection.
pub struct SearchTool;

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search for documents. Returns id, title, text snippet and URL per document."
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query string. Natural language queries work best."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let collection = ctx.collection()?;

        let response = ctx
            .service()
            .top_snippets(&TopSnippetsRequest {
                collection_name: collection.to_string(),
                query: query.to_string(),
                k: SEARCH_SNIPPETS,
                filter: None,
                precise_responses: false,
            })
            .await?;

        Ok(json!({ "results": search_hits(&response) }))
    }
}

/// Full document by id (its path).
pub struct FetchTool;

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        "fetch"
    }

    fn description(&self) -> &str {
        "Retrieve complete document content by id for analysis and citation"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Document id returned by search" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = str_param(&params, "id");
        if id.is_empty() {
            bail!("id must not be empty");
        }
        let collection = ctx.collection()?;

        let doc = ctx.service().get_document_info(collection, id, true).await?;
        Ok(json!({
            "id": id,
            "title": id,
            "text": doc.content,
            "url": doc.file_url,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Agent tools
// ═══════════════════════════════════════════════════════════════════════

pub struct TopDocumentsTool;

#[async_trait]
impl Tool for TopDocumentsTool {
    fn name(&self) -> &str {
        "top_documents"
    }

    fn description(&self) -> &str {
        "Retrieve the top documents in the collection for a query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The search string" },
                "k": { "type": "integer", "description": "Number of documents", "default": 3 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let response = ctx
            .service()
            .top_documents(&TopDocumentsRequest {
                collection_name: ctx.collection()?.to_string(),
                query: query.to_string(),
                k: u32_param(&params, "k", 3),
                filter: None,
                include_metadata: true,
            })
            .await?;
        Ok(json!({ "results": response.results }))
    }
}

pub struct RerankDocumentsTool;

#[async_trait]
impl Tool for RerankDocumentsTool {
    fn name(&self) -> &str {
        "rerank_documents"
    }

    fn description(&self) -> &str {
        "Rerank the provided documents against a query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "documents": { "type": "array", "items": { "type": "string" } },
                "model": { "type": "string", "default": DEFAULT_RERANK_MODEL },
                "top_n": { "type": "integer", "default": 3 }
            },
            "required": ["query", "documents"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let documents: Vec<String> = serde_json::from_value(params["documents"].clone())
            .map_err(|e| anyhow::anyhow!("invalid documents: {}", e))?;
        let model = match str_param(&params, "model") {
            "" => DEFAULT_RERANK_MODEL,
            m => m,
        };

        let response = ctx
            .service()
            .rerank(&RerankRequest {
                query: query.to_string(),
                documents,
                model: Some(model.to_string()),
                top_n: Some(u32_param(&params, "top_n", 3)),
            })
            .await?;
        Ok(json!({ "results": response.results }))
    }
}

pub struct AddDocumentTool;

#[async_trait]
impl Tool for AddDocumentTool {
    fn name(&self) -> &str {
        "add_document"
    }

    fn description(&self) -> &str {
        "Add a document (text, text-pages or base64 auto) at a path in a collection"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Unique document path" },
                "content": {
                    "type": "object",
                    "description": "{type: text, text} | {type: text-pages, pages} | {type: auto, base64_data}"
                },
                "metadata": { "type": "object" },
                "collection_name": { "type": "string" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let path = required_str(&params, "path")?;
        let collection = ctx.collection_for(&params)?;
        let content: DocumentContent = serde_json::from_value(params["content"].clone())
            .map_err(|e| anyhow::anyhow!("invalid content: {}", e))?;
        let metadata: Metadata = match params.get("metadata") {
            Some(Value::Object(map)) => map.clone(),
            _ => Metadata::new(),
        };

        ctx.service()
            .add_document(&collection, path, &content, &metadata)
            .await?;
        Ok(json!({
            "success": true,
            "message": format!("Document '{}' added to collection '{}'", path, collection)
        }))
    }
}

pub struct DeleteDocumentTool;

#[async_trait]
impl Tool for DeleteDocumentTool {
    fn name(&self) -> &str {
        "delete_document"
    }

    fn description(&self) -> &str {
        "Delete a document from a collection"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "collection_name": { "type": "string" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let path = required_str(&params, "path")?;
        let collection = ctx.collection_for(&params)?;
        ctx.service().delete_document(&collection, path).await?;
        Ok(json!({
            "success": true,
            "message": format!("Document '{}' deleted from collection '{}'", path, collection)
        }))
    }
}

pub struct GetDocumentInfoTool;

#[async_trait]
impl Tool for GetDocumentInfoTool {
    fn name(&self) -> &str {
        "get_document_info"
    }

    fn description(&self) -> &str {
        "Get information about a document, optionally with its content"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "include_content": { "type": "boolean", "default": false },
                "collection_name": { "type": "string" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let path = required_str(&params, "path")?;
        let collection = ctx.collection_for(&params)?;
        let include_content = params["include_content"].as_bool().unwrap_or(false);
        let doc = ctx
            .service()
            .get_document_info(&collection, path, include_content)
            .await?;
        Ok(serde_json::to_value(doc)?)
    }
}

pub struct GetDocumentInfoListTool;

#[async_trait]
impl Tool for GetDocumentInfoListTool {
    fn name(&self) -> &str {
        "get_document_info_list"
    }

    fn description(&self) -> &str {
        "List documents in a collection, with optional path filters"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "default": 1024 },
                "path_prefix": { "type": "string" },
                "path_gt": { "type": "string" },
                "collection_name": { "type": "string" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let collection = ctx.collection_for(&params)?;
        let query = DocumentListQuery {
            limit: u32_param(&params, "limit", 1024),
            path_prefix: params["path_prefix"].as_str().map(str::to_string),
            path_gt: params["path_gt"].as_str().map(str::to_string),
        };
        let docs = ctx
            .service()
            .get_document_info_list(&collection, &query)
            .await?;
        Ok(json!({ "documents": docs }))
    }
}

pub struct GetPageInfoTool;

#[async_trait]
impl Tool for GetPageInfoTool {
    fn name(&self) -> &str {
        "get_page_info"
    }

    fn description(&self) -> &str {
        "Get information about one page (0-indexed) of a document"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "page_index": { "type": "integer" },
                "include_content": { "type": "boolean", "default": false },
                "collection_name": { "type": "string" }
            },
            "required": ["path", "page_index"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let path = required_str(&params, "path")?;
        let collection = ctx.collection_for(&params)?;
        let page_index = u32_param(&params, "page_index", 0);
        let include_content = params["include_content"].as_bool().unwrap_or(false);
        let page = ctx
            .service()
            .get_page_info(&collection, path, page_index, include_content)
            .await?;
        Ok(serde_json::to_value(page)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Tool descriptor returned by `GET /tools/list` and `zec tools list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Deep-research tools followed by the agent tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchTool));
        registry.register(Box::new(FetchTool));
        registry.register(Box::new(TopDocumentsTool));
        registry.register(Box::new(RerankDocumentsTool));
        registry.register(Box::new(AddDocumentTool));
        registry.register(Box::new(DeleteDocumentTool));
        registry.register(Box::new(GetDocumentInfoTool));
        registry.register(Box::new(GetDocumentInfoListTool));
        registry.register(Box::new(GetPageInfoTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                builtin: t.is_builtin(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter Validation
// ═══════════════════════════════════════════════════════════════════════

/// Check `params` against a tool's schema.
///
/// Verifies required fields and primitive types, and fills in schema
/// defaults for absent optional fields. Returns the enriched object.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be an object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for field in required {
        if !params_obj.contains_key(field) {
            bail!("missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();
    for (name, prop) in &properties {
        match params_obj.get(name) {
            Some(value) => {
                if let Some(expected) = prop.get("type").and_then(Value::as_str) {
                    let ok = match expected {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !ok {
                        bail!(
                            "parameter '{}' must be of type '{}', got {}",
                            name,
                            expected,
                            json_type_name(value)
                        );
                    }
                }
            }
            None => {
                if let Some(default) = prop.get("default") {
                    result.insert(name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turn CLI `key=value` pairs into tool parameters.
///
/// Values that parse as JSON (numbers, booleans, arrays, objects) are used
/// as such; anything else is a string.
pub fn params_from_pairs(pairs: &[(String, String)]) -> Value {
    let map = pairs
        .iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str::<Value>(raw)
                .ok()
                .filter(|v| !v.is_string())
                .unwrap_or_else(|| Value::String(raw.clone()));
            (key.trim().to_string(), value)
        })
        .collect();
    Value::Object(map)
}

/// Entry point for `zec tools list`.
pub fn run_tools_list() {
    let registry = ToolRegistry::with_builtins();
    for info in registry.infos() {
        let tag = if info.builtin { " (deep research)" } else { "" };
        println!("{}{}", info.name, tag);
        println!("  {}", info.description);
    }
}

/// Entry point for `zec tools call`. Prints the result as pretty JSON.
pub async fn run_tool_call(
    config: &Config,
    name: &str,
    pairs: &[(String, String)],
) -> Result<()> {
    let registry = ToolRegistry::with_builtins();
    let Some(tool) = registry.find(name) else {
        bail!("no tool registered with name: {}", name);
    };

    let params = validate_params(&tool.parameters_schema(), &params_from_pairs(pairs))?;
    let client = HttpSearchClient::from_config(&config.service)?;
    let ctx = ToolContext::new(Arc::new(client), Some(config.collection.name.clone()));

    let result = tool
        .execute(params, &ctx)
        .await
        .with_context(|| format!("tool '{}' failed", name))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
