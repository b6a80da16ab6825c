//! Search service client.
//!
//! Defines the [`SearchService`] trait, the seam every component talks
//! through, and [`HttpSearchClient`], its implementation over the hosted
//! JSON API. The client is built once at startup from [`ServiceConfig`] and
//! handed to each component explicitly; nothing holds it globally.
//!
//! # Status mapping
//!
//! | HTTP status | Error |
//! |-------------|-------|
//! | 2xx | success |
//! | 409 | [`ServiceError::Conflict`] |
//! | 404 | [`ServiceError::NotFound`] |
//! | other | [`ServiceError::Status`] |
//!
//! Network failures surface as [`ServiceError::Transport`]. The client never
//! retries; callers decide (see [`crate::ingest`]).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::models::{
    DocumentContent, DocumentInfo, DocumentInfoListResponse, DocumentInfoResponse,
    DocumentListQuery, Metadata, PageInfo, PageInfoResponse, RerankRequest, RerankResponse,
    TopDocumentsRequest, TopDocumentsResponse, TopSnippetsRequest, TopSnippetsResponse,
};

/// Operations the cookbook needs from the search service.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Create a collection. Fails with [`ServiceError::Conflict`] if it exists.
    async fn add_collection(&self, collection: &str) -> Result<(), ServiceError>;

    /// Add a document at `path`. Fails with [`ServiceError::Conflict`] if the
    /// path is already taken.
    async fn add_document(
        &self,
        collection: &str,
        path: &str,
        content: &DocumentContent,
        metadata: &Metadata,
    ) -> Result<(), ServiceError>;

    async fn delete_document(&self, collection: &str, path: &str) -> Result<(), ServiceError>;

    async fn get_document_info(
        &self,
        collection: &str,
        path: &str,
        include_content: bool,
    ) -> Result<DocumentInfo, ServiceError>;

    async fn get_document_info_list(
        &self,
        collection: &str,
        query: &DocumentListQuery,
    ) -> Result<Vec<DocumentInfo>, ServiceError>;

    async fn get_page_info(
        &self,
        collection: &str,
        path: &str,
        page_index: u32,
        include_content: bool,
    ) -> Result<PageInfo, ServiceError>;

    async fn top_documents(
        &self,
        request: &TopDocumentsRequest,
    ) -> Result<TopDocumentsResponse, ServiceError>;

    async fn top_snippets(
        &self,
        request: &TopSnippetsRequest,
    ) -> Result<TopSnippetsResponse, ServiceError>;

    async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse, ServiceError>;
}

/// Creates `collection` unless it already exists.
///
/// Returns `true` when the collection was created, `false` when the service
/// reported it as already present. Other errors propagate.
pub async fn ensure_collection(
    service: &dyn SearchService,
    collection: &str,
) -> Result<bool, ServiceError> {
    match service.add_collection(collection).await {
        Ok(()) => Ok(true),
        Err(ServiceError::Conflict(_)) => {
            tracing::info!(collection, "collection already exists");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// [`SearchService`] over HTTPS + JSON.
#[derive(Clone, Debug)]
pub struct HttpSearchClient {
    http: reqwest::Client,
    base_url: String,
    /// Full `Authorization` header value, e.g. `"Bearer sk-..."`.
    authorization: Option<String>,
}

impl HttpSearchClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: api_key.map(|k| format!("Bearer {}", k)),
        })
    }

    /// Build a client from config, reading the API key from the environment.
    ///
    /// A missing key is not an error here: the MCP server forwards callers'
    /// own `Authorization` headers and can run without one.
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::warn!(
                var = %config.api_key_env,
                "API key environment variable not set; requests will be unauthenticated"
            );
        }
        Ok(Self::new(
            &config.base_url,
            api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?)
    }

    /// A copy of this client that sends `authorization` verbatim as the
    /// `Authorization` header.
    pub fn with_authorization(&self, authorization: &str) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            authorization: Some(authorization.to_string()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.http.post(&url).json(body);
        if let Some(auth) = &self.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            return serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::Decode(format!("{}: {}", endpoint, e)));
        }

        let body_text = response.text().await.unwrap_or_default();
        tracing::debug!(endpoint, status = status.as_u16(), body = %body_text, "request failed");

        Err(match status.as_u16() {
            409 => ServiceError::Conflict(body_text),
            404 => ServiceError::NotFound(body_text),
            code => ServiceError::Status {
                status: code,
                body: body_text,
            },
        })
    }
}

#[async_trait]
impl SearchService for HttpSearchClient {
    async fn add_collection(&self, collection: &str) -> Result<(), ServiceError> {
        let body = serde_json::json!({ "collection_name": collection });
        let _: serde_json::Value = self.post("/collections/add-collection", &body).await?;
        Ok(())
    }

    async fn add_document(
        &self,
        collection: &str,
        path: &str,
        content: &DocumentContent,
        metadata: &Metadata,
    ) -> Result<(), ServiceError> {
        let body = serde_json::json!({
            "collection_name": collection,
            "path": path,
            "content": content,
            "metadata": metadata,
        });
        let _: serde_json::Value = self.post("/documents/add-document", &body).await?;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, path: &str) -> Result<(), ServiceError> {
        let body = serde_json::json!({ "collection_name": collection, "path": path });
        let _: serde_json::Value = self.post("/documents/delete-document", &body).await?;
        Ok(())
    }

    async fn get_document_info(
        &self,
        collection: &str,
        path: &str,
        include_content: bool,
    ) -> Result<DocumentInfo, ServiceError> {
        let body = serde_json::json!({
            "collection_name": collection,
            "path": path,
            "include_content": include_content,
        });
        let resp: DocumentInfoResponse = self.post("/documents/get-document-info", &body).await?;
        Ok(resp.document)
    }

    async fn get_document_info_list(
        &self,
        collection: &str,
        query: &DocumentListQuery,
    ) -> Result<Vec<DocumentInfo>, ServiceError> {
        let mut body = serde_json::to_value(query)
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        body["collection_name"] = serde_json::Value::String(collection.to_string());
        let resp: DocumentInfoListResponse =
            self.post("/documents/get-document-info-list", &body).await?;
        Ok(resp.documents)
    }

    async fn get_page_info(
        &self,
        collection: &str,
        path: &str,
        page_index: u32,
        include_content: bool,
    ) -> Result<PageInfo, ServiceError> {
        let body = serde_json::json!({
            "collection_name": collection,
            "path": path,
            "page_index": page_index,
            "include_content": include_content,
        });
        let resp: PageInfoResponse = self.post("/documents/get-page-info", &body).await?;
        Ok(resp.page)
    }

    async fn top_documents(
        &self,
        request: &TopDocumentsRequest,
    ) -> Result<TopDocumentsResponse, ServiceError> {
        self.post("/queries/top-documents", request).await
    }

    async fn top_snippets(
        &self,
        request: &TopSnippetsRequest,
    ) -> Result<TopSnippetsResponse, ServiceError> {
        self.post("/queries/top-snippets", request).await
    }

    async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse, ServiceError> {
        self.post("/models/rerank", request).await
    }
}
