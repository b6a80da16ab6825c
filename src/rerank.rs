//! `zec rerank`: score documents against a query with the hosted reranker.

use anyhow::{Context, Result};

use crate::client::{HttpSearchClient, SearchService};
use crate::config::Config;
use crate::models::{RerankRequest, RerankResponse};

/// Documents used when none are given on the command line.
pub const SAMPLE_QUERY: &str = "What is 2+2?";
pub const SAMPLE_DOCUMENTS: [&str; 2] = ["4", "The answer is definitely 1 million."];

pub async fn rerank(
    service: &dyn SearchService,
    query: &str,
    documents: Vec<String>,
    model: Option<String>,
    top_n: Option<u32>,
) -> Result<RerankResponse> {
    if documents.is_empty() {
        anyhow::bail!("at least one document is required");
    }
    let response = service
        .rerank(&RerankRequest {
            query: query.to_string(),
            documents,
            model,
            top_n,
        })
        .await?;
    Ok(response)
}

/// Entry point for `zec rerank`. Prints the response as pretty JSON.
pub async fn run_rerank(
    config: &Config,
    query: Option<String>,
    documents: Vec<String>,
    model: Option<String>,
    top_n: Option<u32>,
) -> Result<()> {
    let (query, documents) = match (query, documents.is_empty()) {
        (Some(q), false) => (q, documents),
        (Some(q), true) => anyhow::bail!("no documents given for query \"{}\"; pass --doc", q),
        (None, _) => (
            SAMPLE_QUERY.to_string(),
            SAMPLE_DOCUMENTS.iter().map(|d| d.to_string()).collect(),
        ),
    };

    let client = HttpSearchClient::from_config(&config.service)?;
    let response = rerank(&client, &query, documents, model, top_n)
        .await
        .context("Rerank request failed")?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
