//! In-memory [`SearchService`] and [`AlertSink`] fakes for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::alert::{AlertOutcome, AlertSink};
use crate::client::SearchService;
use crate::error::ServiceError;
use crate::models::{
    DocumentContent, DocumentInfo, DocumentListQuery, Metadata, PageInfo, RerankRequest,
    RerankResponse, TopDocumentsRequest, TopDocumentsResponse, TopSnippetsRequest,
    TopSnippetsResponse,
};

#[derive(Debug, Clone)]
pub struct AddCall {
    pub collection: String,
    pub path: String,
    pub content: DocumentContent,
    pub metadata: Metadata,
}

#[derive(Default)]
pub struct FakeService {
    pub collections: Mutex<HashSet<String>>,
    pub adds: Mutex<Vec<AddCall>>,
    /// Paths that always answer add-document with a conflict.
    pub conflict_paths: HashSet<String>,
    /// Paths that always answer add-document with a 500.
    pub failing_paths: HashSet<String>,
    /// Paths whose add-document call panics.
    pub panicking_paths: HashSet<String>,
    pub stored: HashMap<String, DocumentInfo>,
    pub top_documents: TopDocumentsResponse,
    pub top_snippets: TopSnippetsResponse,
    pub rerank: RerankResponse,
    pub doc_requests: Mutex<Vec<TopDocumentsRequest>>,
    pub snippet_requests: Mutex<Vec<TopSnippetsRequest>>,
    pub info_requests: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub add_delay: Option<Duration>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeService {
    pub fn add_calls(&self) -> Vec<AddCall> {
        self.adds.lock().unwrap().clone()
    }

    pub fn add_paths(&self) -> Vec<String> {
        self.add_calls().into_iter().map(|c| c.path).collect()
    }
}

#[async_trait]
impl SearchService for FakeService {
    async fn add_collection(&self, collection: &str) -> Result<(), ServiceError> {
        let mut collections = self.collections.lock().unwrap();
        if !collections.insert(collection.to_string()) {
            return Err(ServiceError::Conflict(collection.to_string()));
        }
        Ok(())
    }

    async fn add_document(
        &self,
        collection: &str,
        path: &str,
        content: &DocumentContent,
        metadata: &Metadata,
    ) -> Result<(), ServiceError> {
        if self.panicking_paths.contains(path) {
            panic!("add_document panicked for {}", path);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.adds.lock().unwrap().push(AddCall {
            collection: collection.to_string(),
            path: path.to_string(),
            content: content.clone(),
            metadata: metadata.clone(),
        });

        if let Some(delay) = self.add_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.conflict_paths.contains(path) {
            return Err(ServiceError::Conflict(path.to_string()));
        }
        if self.failing_paths.contains(path) {
            return Err(ServiceError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    async fn delete_document(&self, _collection: &str, path: &str) -> Result<(), ServiceError> {
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn get_document_info(
        &self,
        _collection: &str,
        path: &str,
        include_content: bool,
    ) -> Result<DocumentInfo, ServiceError> {
        self.info_requests.lock().unwrap().push(path.to_string());
        let mut doc = self
            .stored
            .get(path)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(path.to_string()))?;
        if !include_content {
            doc.content = None;
        }
        Ok(doc)
    }

    async fn get_document_info_list(
        &self,
        _collection: &str,
        query: &DocumentListQuery,
    ) -> Result<Vec<DocumentInfo>, ServiceError> {
        let mut docs: Vec<DocumentInfo> = self
            .stored
            .values()
            .filter(|d| {
                query
                    .path_prefix
                    .as_deref()
                    .map_or(true, |p| d.path.starts_with(p))
            })
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        docs.truncate(query.limit as usize);
        Ok(docs)
    }

    async fn get_page_info(
        &self,
        _collection: &str,
        path: &str,
        page_index: u32,
        include_content: bool,
    ) -> Result<PageInfo, ServiceError> {
        let doc = self
            .stored
            .get(path)
            .ok_or_else(|| ServiceError::NotFound(path.to_string()))?;
        Ok(PageInfo {
            path: path.to_string(),
            page_index,
            collection_name: None,
            num_tokens: None,
            content: if include_content {
                doc.content.clone()
            } else {
                None
            },
            image_url: None,
        })
    }

    async fn top_documents(
        &self,
        request: &TopDocumentsRequest,
    ) -> Result<TopDocumentsResponse, ServiceError> {
        self.doc_requests.lock().unwrap().push(request.clone());
        Ok(self.top_documents.clone())
    }

    async fn top_snippets(
        &self,
        request: &TopSnippetsRequest,
    ) -> Result<TopSnippetsResponse, ServiceError> {
        self.snippet_requests.lock().unwrap().push(request.clone());
        Ok(self.top_snippets.clone())
    }

    async fn rerank(&self, _request: &RerankRequest) -> Result<RerankResponse, ServiceError> {
        Ok(self.rerank.clone())
    }
}

pub fn stored_doc(path: &str, content: &str) -> DocumentInfo {
    DocumentInfo {
        path: path.to_string(),
        id: None,
        collection_name: None,
        metadata: Metadata::new(),
        index_status: None,
        num_pages: None,
        content: Some(content.to_string()),
        file_url: Some(format!("https://files.example/{}", path)),
        size: None,
    }
}

/// Alert sink that records every message.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, message: &str) -> AlertOutcome {
        self.messages.lock().unwrap().push(message.to_string());
        AlertOutcome::Delivered
    }
}
