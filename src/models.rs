//! Core data models used throughout the cookbook.
//!
//! These types cover the watch events and index requests built locally, the
//! merged query results handed to the alerting logic, and the JSON shapes
//! exchanged with the search service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Free-form document metadata as stored by the search service.
pub type Metadata = serde_json::Map<String, Value>;

/// Builds a metadata map with a single `type` entry.
pub fn type_metadata(kind: &str) -> Metadata {
    let mut map = Metadata::new();
    map.insert("type".to_string(), Value::String(kind.to_string()));
    map
}

/// Metadata filter matching documents whose `key` equals `value`.
pub fn filter_eq(key: &str, value: &str) -> Value {
    serde_json::json!({ key: { "$eq": value } })
}

/// Metadata filter matching documents whose `key` differs from `value`.
pub fn filter_ne(key: &str, value: &str) -> Value {
    serde_json::json!({ key: { "$ne": value } })
}

// ============ Local pipeline types ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
}

/// A file-change notification for one regular file in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

/// The file types the ingestor knows how to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Csv,
    Pdf,
    Text,
}

impl ContentKind {
    /// Classifies a path by its extension. Returns `None` for anything other
    /// than `.csv`, `.pdf` or `.txt` (matched case-insensitively).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(ContentKind::Csv),
            "pdf" => Some(ContentKind::Pdf),
            "txt" => Some(ContentKind::Text),
            _ => None,
        }
    }

    /// Value stored under the `type` metadata key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Csv => "csv",
            ContentKind::Pdf => "pdf",
            ContentKind::Text => "text",
        }
    }
}

/// Document body in the form accepted by the add-document endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DocumentContent {
    /// Plain text, indexed as-is.
    Text { text: String },
    /// Pre-paginated text; page indices are 0-based.
    TextPages { pages: Vec<String> },
    /// Raw file bytes; the service deduces the file type and OCRs when needed.
    Auto { base64_data: String },
}

/// One submission to the indexing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    pub path: String,
    pub collection: String,
    pub kind: ContentKind,
    pub content: DocumentContent,
    pub metadata: Metadata,
}

/// A merged result from the query client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub path: String,
    pub content: Option<String>,
    pub score: f64,
    pub metadata: Metadata,
}

// ============ Search service wire types ============

#[derive(Debug, Clone, Serialize)]
pub struct TopDocumentsRequest {
    pub collection_name: String,
    pub query: String,
    pub k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    pub include_metadata: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopSnippetsRequest {
    pub collection_name: String,
    pub query: String,
    pub k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// Longer (~2000 char) snippets instead of the short (~200 char) default.
    pub precise_responses: bool,
}

/// A whole-document hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub path: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopDocumentsResponse {
    #[serde(default)]
    pub results: Vec<DocumentResult>,
}

/// A snippet hit inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetResult {
    pub path: String,
    #[serde(default)]
    pub start_index: Option<u64>,
    #[serde(default)]
    pub end_index: Option<u64>,
    #[serde(default)]
    pub page_span: Option<Vec<u32>>,
    #[serde(default)]
    pub content: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopSnippetsResponse {
    /// Per-document information for every document a snippet came from.
    #[serde(default)]
    pub document_results: Vec<DocumentResult>,
    #[serde(default)]
    pub results: Vec<SnippetResult>,
}

/// Stored document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub path: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub index_status: Option<String>,
    #[serde(default)]
    pub num_pages: Option<u32>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInfoResponse {
    pub document: DocumentInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInfoListResponse {
    #[serde(default)]
    pub documents: Vec<DocumentInfo>,
}

/// Paging options for listing documents.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListQuery {
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_gt: Option<String>,
}

impl Default for DocumentListQuery {
    fn default() -> Self {
        Self {
            limit: 1024,
            path_prefix: None,
            path_gt: None,
        }
    }
}

/// One page of a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub path: String,
    pub page_index: u32,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub num_tokens: Option<u64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageInfoResponse {
    pub page: PageInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RerankResponse {
    #[serde(default)]
    pub results: Vec<RerankResult>,
}
