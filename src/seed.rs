//! `zec seed companies`: load the public YC company list into a collection.
//!
//! Seeding only happens when the collection is newly created; an existing
//! collection is assumed to be seeded already.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::client::{ensure_collection, HttpSearchClient, SearchService};
use crate::config::Config;
use crate::models::{DocumentContent, Metadata};

pub const COMPANIES_URL: &str = "https://yc-oss.github.io/api/companies/all.json";

/// Simultaneous add-document calls while seeding.
pub const SEED_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub one_liner: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub subindustry: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub industries: Vec<String>,
}

fn or_empty(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("")
}

impl Company {
    pub fn path(&self) -> &str {
        or_empty(&self.slug)
    }

    pub fn text(&self) -> String {
        format!(
            "{} — {}\n\n{}\n\n{}\n\n{}\n\nStage: {}",
            or_empty(&self.name),
            or_empty(&self.one_liner),
            or_empty(&self.long_description),
            or_empty(&self.website),
            or_empty(&self.subindustry),
            or_empty(&self.stage),
        )
    }

    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("batch".into(), Value::String(or_empty(&self.batch).into()));
        metadata.insert(
            "list:industries".into(),
            Value::Array(self.industries.iter().cloned().map(Value::String).collect()),
        );
        metadata.insert("stage".into(), Value::String(or_empty(&self.stage).into()));
        metadata
    }
}

pub async fn fetch_companies(url: &str) -> Result<Vec<Company>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let companies = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()?
        .json::<Vec<Company>>()
        .await
        .context("Company list is not a JSON array of companies")?;
    Ok(companies)
}

/// Add every company as a text document. Returns how many succeeded.
pub async fn seed_companies(
    service: Arc<dyn SearchService>,
    collection: &str,
    companies: Vec<Company>,
    concurrency: usize,
) -> usize {
    let gate = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for company in companies {
        let service = service.clone();
        let gate = gate.clone();
        let collection = collection.to_string();
        tasks.spawn(async move {
            let Ok(_permit) = gate.acquire_owned().await else {
                return false;
            };
            let content = DocumentContent::Text {
                text: company.text(),
            };
            match service
                .add_document(&collection, company.path(), &content, &company.metadata())
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(company = company.path(), error = %e, "failed to add company");
                    false
                }
            }
        });
    }

    let mut added = 0;
    while let Some(joined) = tasks.join_next().await {
        if matches!(joined, Ok(true)) {
            added += 1;
        }
    }
    added
}

/// Entry point for `zec seed companies`.
pub async fn run_seed_companies(config: &Config, url: &str) -> Result<()> {
    let collection = &config.collection.name;
    let client: Arc<dyn SearchService> = Arc::new(HttpSearchClient::from_config(&config.service)?);

    if !ensure_collection(client.as_ref(), collection).await? {
        println!("Collection {} already exists", collection);
        return Ok(());
    }
    println!("Created collection: {}", collection);

    let companies = fetch_companies(url).await?;
    let total = companies.len();
    println!("Fetched {} companies", total);

    let started = Instant::now();
    let added = seed_companies(client, collection, companies, SEED_CONCURRENCY).await;
    println!(
        "Added {}/{} companies. Total time: {:.1}s",
        added,
        total,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
