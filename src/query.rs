//! Collection queries.
//!
//! A query runs two independent requests against the collection:
//!
//! 1. **top documents** restricted to `type == csv`, one hit per CSV row.
//!    The response carries no content, so each hit is followed by a
//!    document-info fetch for the full row text.
//! 2. **top snippets** restricted to `type != csv`, in precise (long
//!    snippet) mode: passages from text and PDF documents.
//!
//! Results are concatenated in that order. Each group keeps the rank order
//! the service returned; the two groups are never re-sorted against each
//! other. Nothing on this path is retried.

use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::client::{HttpSearchClient, SearchService};
use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{
    filter_eq, filter_ne, Metadata, QueryResult, TopDocumentsRequest, TopSnippetsRequest,
};

/// Query `collection` and return CSV row hits followed by snippet hits.
pub async fn query_collection(
    service: &dyn SearchService,
    collection: &str,
    text: &str,
    top_k_docs: u32,
    top_k_snippets: u32,
) -> Result<Vec<QueryResult>, ServiceError> {
    let docs_request = TopDocumentsRequest {
        collection_name: collection.to_string(),
        query: text.to_string(),
        k: top_k_docs,
        filter: Some(filter_eq("type", "csv")),
        include_metadata: true,
    };
    let snippets_request = TopSnippetsRequest {
        collection_name: collection.to_string(),
        query: text.to_string(),
        k: top_k_snippets,
        filter: Some(filter_ne("type", "csv")),
        precise_responses: true,
    };

    let (docs, snippets) = tokio::try_join!(
        service.top_documents(&docs_request),
        service.top_snippets(&snippets_request)
    )?;

    let mut results = Vec::with_capacity(docs.results.len() + snippets.results.len());

    for doc in docs.results {
        let info = service.get_document_info(collection, &doc.path, true).await?;
        results.push(QueryResult {
            path: doc.path,
            content: info.content,
            score: doc.score,
            metadata: doc.metadata.unwrap_or(info.metadata),
        });
    }

    let snippet_metadata: HashMap<&str, &Metadata> = snippets
        .document_results
        .iter()
        .filter_map(|d| d.metadata.as_ref().map(|m| (d.path.as_str(), m)))
        .collect();

    for snippet in &snippets.results {
        results.push(QueryResult {
            path: snippet.path.clone(),
            content: snippet.content.clone(),
            score: snippet.score,
            metadata: snippet_metadata
                .get(snippet.path.as_str())
                .map(|m| (*m).clone())
                .unwrap_or_default(),
        });
    }

    Ok(results)
}

/// Entry point for `zec query`.
pub async fn run_query(
    config: &Config,
    text: &str,
    top_k_docs: Option<u32>,
    top_k_snippets: Option<u32>,
    json: bool,
) -> Result<()> {
    if text.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let client = HttpSearchClient::from_config(&config.service)?;
    let collection = &config.collection.name;
    let results = query_collection(
        &client,
        collection,
        text,
        top_k_docs.unwrap_or(config.query.top_k_docs),
        top_k_snippets.unwrap_or(config.query.top_k_snippets),
    )
    .await
    .with_context(|| format!("Query against collection '{}' failed", collection))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("Result {}:", i + 1);
        println!("  path: {}", result.path);
        println!("  score: {:.4}", result.score);
        if !result.metadata.is_empty() {
            println!("  metadata: {}", serde_json::Value::Object(result.metadata.clone()));
        }
        if let Some(content) = &result.content {
            println!("  content: {}", content.trim_end());
        }
        println!();
    }

    Ok(())
}
