//! Document ingestion.
//!
//! Classifies a local file by extension, turns it into one or more
//! [`IndexRequest`]s and submits them to the search service:
//!
//! | Extension | Requests | Content | Metadata |
//! |-----------|----------|---------|----------|
//! | `.csv` | one per line, path `{path}_{i}` | text | `type = csv` |
//! | `.pdf` | one | base64 `auto` (service OCRs) | `type = pdf` |
//! | `.txt` | one | text | `type = text` |
//!
//! Every submission, from every caller, passes through one shared
//! semaphore ([`IngestConfig::max_concurrency`] permits). A conflict
//! response is retried up to [`IngestConfig::conflict_attempts`] times in
//! total with no delay, then abandoned with a log line. Any other error
//! aborts that submission only.

use anyhow::{Context, Result};
use base64::Engine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::client::{ensure_collection, HttpSearchClient, SearchService};
use crate::config::{Config, IngestConfig};
use crate::error::{IngestError, ServiceError};
use crate::models::{type_metadata, ContentKind, DocumentContent, IndexRequest};
use crate::progress::{IndexProgressEvent, IndexProgressReporter, ProgressMode};

/// Result of ingesting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// `submitted` requests were accepted; `abandoned` hit the conflict limit.
    Indexed { submitted: usize, abandoned: usize },
    /// The extension is not one we index. Nothing was sent.
    Unsupported { extension: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submission {
    Added,
    Abandoned,
}

/// Submits local files to the search service.
///
/// Cheap to clone; clones share the service handle and the concurrency gate.
#[derive(Clone)]
pub struct Ingestor {
    service: Arc<dyn SearchService>,
    gate: Arc<Semaphore>,
    conflict_attempts: u32,
}

impl Ingestor {
    pub fn new(
        service: Arc<dyn SearchService>,
        max_concurrency: usize,
        conflict_attempts: u32,
    ) -> Self {
        Self {
            service,
            gate: Arc::new(Semaphore::new(max_concurrency)),
            conflict_attempts: conflict_attempts.max(1),
        }
    }

    pub fn from_config(service: Arc<dyn SearchService>, config: &IngestConfig) -> Self {
        Self::new(service, config.max_concurrency, config.conflict_attempts)
    }

    pub fn service(&self) -> &Arc<dyn SearchService> {
        &self.service
    }

    /// Ingest one file into `collection`.
    ///
    /// # Errors
    ///
    /// [`IngestError::NotFound`] if `path` does not exist, [`IngestError::Io`]
    /// if it cannot be read, [`IngestError::Service`] for the first
    /// non-conflict service failure and [`IngestError::Task`] when a
    /// submission task dies. For CSV files the remaining rows are
    /// still submitted when one row fails.
    pub async fn ingest(&self, path: &Path, collection: &str) -> Result<IngestOutcome, IngestError> {
        let Some(requests) = build_requests(path, collection)? else {
            let extension = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            tracing::info!(path = %path.display(), extension = %extension, "unsupported file type");
            return Ok(IngestOutcome::Unsupported { extension });
        };

        let mut tasks = JoinSet::new();
        for request in requests {
            let this = self.clone();
            tasks.spawn(async move { this.submit(&request).await });
        }

        let mut submitted = 0;
        let mut abandoned = 0;
        let mut first_error: Option<IngestError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Submission::Added)) => submitted += 1,
                Ok(Ok(Submission::Abandoned)) => abandoned += 1,
                Ok(Err(e)) => {
                    tracing::warn!(path = %path.display(), error = %e, "submission failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "submission task panicked");
                    first_error.get_or_insert(IngestError::Task(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(IngestOutcome::Indexed {
                submitted,
                abandoned,
            }),
        }
    }

    /// Submit one request, holding a gate permit for the whole retry loop.
    async fn submit(&self, request: &IndexRequest) -> Result<Submission, IngestError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| IngestError::GateClosed)?;

        for attempt in 1..=self.conflict_attempts {
            match self
                .service
                .add_document(
                    &request.collection,
                    &request.path,
                    &request.content,
                    &request.metadata,
                )
                .await
            {
                Ok(()) => return Ok(Submission::Added),
                Err(ServiceError::Conflict(_)) => {
                    tracing::warn!(
                        path = %request.path,
                        collection = %request.collection,
                        attempt,
                        "document already exists in collection"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            path = %request.path,
            collection = %request.collection,
            attempts = self.conflict_attempts,
            "giving up on document after repeated conflicts"
        );
        Ok(Submission::Abandoned)
    }
}

/// Build the index requests for `path`.
///
/// Returns `Ok(None)` for unsupported extensions without touching the file.
pub fn build_requests(
    path: &Path,
    collection: &str,
) -> Result<Option<Vec<IndexRequest>>, IngestError> {
    if !path.exists() {
        return Err(IngestError::NotFound(path.to_path_buf()));
    }

    let Some(kind) = ContentKind::from_path(path) else {
        return Ok(None);
    };

    let io_err = |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let path_str = path.to_string_lossy().to_string();
    let metadata = type_metadata(kind.as_str());

    let requests = match kind {
        ContentKind::Csv => {
            let text = std::fs::read_to_string(path).map_err(io_err)?;
            split_lines(&text)
                .into_iter()
                .enumerate()
                .map(|(i, line)| IndexRequest {
                    path: format!("{}_{}", path_str, i),
                    collection: collection.to_string(),
                    kind,
                    content: DocumentContent::Text { text: line },
                    metadata: metadata.clone(),
                })
                .collect()
        }
        ContentKind::Pdf => {
            let bytes = std::fs::read(path).map_err(io_err)?;
            vec![IndexRequest {
                path: path_str,
                collection: collection.to_string(),
                kind,
                content: DocumentContent::Auto {
                    base64_data: base64::engine::general_purpose::STANDARD.encode(bytes),
                },
                metadata,
            }]
        }
        ContentKind::Text => {
            let text = std::fs::read_to_string(path).map_err(io_err)?;
            vec![IndexRequest {
                path: path_str,
                collection: collection.to_string(),
                kind,
                content: DocumentContent::Text { text },
                metadata,
            }]
        }
    };

    Ok(Some(requests))
}

/// Split into lines, keeping each line's terminator. `\r\n` and a lone `\r`
/// are read as `\n`.
fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split_inclusive('\n')
        .map(str::to_string)
        .collect()
}

// ============ Bulk indexing (`zec index`) ============

/// Totals for one bulk index run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub files: usize,
    pub indexed: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub documents_submitted: usize,
    pub documents_abandoned: usize,
}

/// List the regular files directly inside `dir`, sorted by path.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Ingest every file directly inside `dir` concurrently.
///
/// Per-file failures are logged and counted; they do not stop the run.
pub async fn index_directory(
    ingestor: &Ingestor,
    dir: &Path,
    collection: &str,
    reporter: &dyn IndexProgressReporter,
) -> Result<IndexSummary> {
    let files = list_files(dir)?;
    let total = files.len() as u64;
    reporter.report(IndexProgressEvent::Started {
        collection: collection.to_string(),
        total,
    });

    let mut tasks = JoinSet::new();
    for file in files {
        let ingestor = ingestor.clone();
        let collection = collection.to_string();
        tasks.spawn(async move {
            let outcome = ingestor.ingest(&file, &collection).await;
            (file, outcome)
        });
    }

    let mut summary = IndexSummary {
        files: total as usize,
        ..Default::default()
    };
    let mut done = 0u64;
    while let Some(joined) = tasks.join_next().await {
        done += 1;
        match joined {
            Ok((_, Ok(IngestOutcome::Indexed {
                submitted,
                abandoned,
            }))) => {
                summary.indexed += 1;
                summary.documents_submitted += submitted;
                summary.documents_abandoned += abandoned;
            }
            Ok((_, Ok(IngestOutcome::Unsupported { .. }))) => summary.unsupported += 1,
            Ok((file, Err(e))) => {
                tracing::error!(path = %file.display(), error = %e, "failed to index file");
                summary.failed += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "index task panicked");
                summary.failed += 1;
            }
        }
        reporter.report(IndexProgressEvent::FileDone {
            collection: collection.to_string(),
            n: done,
            total,
        });
    }

    Ok(summary)
}

/// Entry point for `zec index`.
pub async fn run_index(config: &Config, dir: &Path, progress: ProgressMode) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let client: Arc<dyn SearchService> = Arc::new(HttpSearchClient::from_config(&config.service)?);
    let collection = &config.collection.name;

    ensure_collection(client.as_ref(), collection)
        .await
        .with_context(|| format!("Failed to create collection '{}'", collection))?;

    let ingestor = Ingestor::from_config(client, &config.ingest);
    let reporter = progress.reporter();
    let summary = index_directory(&ingestor, dir, collection, reporter.as_ref()).await?;

    println!("index {}", dir.display());
    println!("  collection: {}", collection);
    println!("  files: {}", summary.files);
    println!("  indexed: {}", summary.indexed);
    println!("  unsupported: {}", summary.unsupported);
    println!("  failed: {}", summary.failed);
    println!("  documents submitted: {}", summary.documents_submitted);
    if summary.documents_abandoned > 0 {
        println!("  documents abandoned (conflict): {}", summary.documents_abandoned);
    }
    println!("ok");

    Ok(())
}
