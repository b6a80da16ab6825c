//! Folder monitoring with indexing and alerting.
//!
//! Watches one directory (non-recursively) and, for every create or modify
//! event on a regular file, runs the pipeline:
//!
//! ```text
//! notify thread ──▶ bounded queue ──▶ worker pool ──▶ ingest ──▶ query × N ──▶ alert?
//! ```
//!
//! Events are handled independently and concurrently, up to the number of
//! workers. There is no de-duplication of repeated events for the same file
//! and no ordering between them. A failure while handling one event is
//! logged and never affects any other event.
//!
//! On shutdown the watcher is dropped first, which closes the queue; workers
//! finish what was already queued and exit. Dropping the [`MonitorHandle`]
//! instead aborts them.

use anyhow::{Context, Result};
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::alert::{create_sink, AlertSink};
use crate::client::{ensure_collection, HttpSearchClient, SearchService};
use crate::config::{Config, MonitorConfig};
use crate::ingest::{IngestOutcome, Ingestor};
use crate::models::{ContentKind, QueryResult, WatchEvent, WatchEventKind};
use crate::query::query_collection;

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventReport {
    /// Unsupported extension; nothing sent.
    Skipped,
    /// Indexed and queried; `alerts` messages were sent.
    Processed { alerts: usize },
    /// Ingest or query failed; already logged.
    Failed,
}

/// Builds the alert text when the first result clears the threshold.
///
/// Only `results[0]` is inspected, and the comparison is strict.
pub fn alert_message(
    query: &str,
    path: &Path,
    results: &[QueryResult],
    threshold: f64,
) -> Option<String> {
    let top = results.first()?;
    if top.score > threshold {
        Some(format!(
            "Relevant content found for query \"{}\" in file {}.",
            query,
            path.display()
        ))
    } else {
        None
    }
}

/// Per-event work: ingest one file, run every configured query against the
/// collection, alert on hits.
pub struct Pipeline {
    ingestor: Ingestor,
    sink: Arc<dyn AlertSink>,
    collection: String,
    queries: Vec<String>,
    threshold: f64,
    top_k: u32,
}

impl Pipeline {
    pub fn new(
        ingestor: Ingestor,
        sink: Arc<dyn AlertSink>,
        collection: impl Into<String>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            ingestor,
            sink,
            collection: collection.into(),
            queries: config.queries.clone(),
            threshold: config.threshold,
            top_k: config.top_k,
        }
    }

    /// Handle one event. Never fails; errors are logged.
    pub async fn handle(&self, event: &WatchEvent) -> EventReport {
        let path = &event.path;
        if ContentKind::from_path(path).is_none() {
            tracing::info!(path = %path.display(), "skipping unsupported file type");
            return EventReport::Skipped;
        }

        match self.ingest_and_alert(path).await {
            Ok(alerts) => EventReport::Processed { alerts },
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{:#}", e), "error indexing or querying file");
                EventReport::Failed
            }
        }
    }

    async fn ingest_and_alert(&self, path: &Path) -> Result<usize> {
        if let IngestOutcome::Unsupported { .. } = self.ingestor.ingest(path, &self.collection).await? {
            return Ok(0);
        }
        tracing::info!(path = %path.display(), collection = %self.collection, "indexed");

        let service = self.ingestor.service().as_ref();
        let mut alerts = 0;
        for query in &self.queries {
            let results =
                query_collection(service, &self.collection, query, self.top_k, self.top_k)
                    .await
                    .with_context(|| format!("query \"{}\" failed", query))?;

            if let Some(message) = alert_message(query, path, &results, self.threshold) {
                self.sink.send(&message).await;
                alerts += 1;
            }
        }
        Ok(alerts)
    }
}

/// Translate a raw notify event into the events the pipeline cares about.
///
/// Keeps creates and modifications of paths that are regular files at the
/// time of the check. A file moved into the folder counts as created; for a
/// paired rename only the destination is kept, and a move out is dropped.
pub fn classify_event(event: &notify::Event) -> Vec<WatchEvent> {
    let (kind, paths) = match event.kind {
        EventKind::Create(_) => (WatchEventKind::Created, &event.paths[..]),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            (WatchEventKind::Created, &event.paths[..])
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            (WatchEventKind::Created, event.paths.get(1..).unwrap_or(&[]))
        }
        EventKind::Modify(ModifyKind::Name(_)) => return Vec::new(),
        EventKind::Modify(_) => (WatchEventKind::Modified, &event.paths[..]),
        _ => return Vec::new(),
    };

    paths
        .iter()
        .filter(|p| p.is_file())
        .map(|p| WatchEvent {
            path: p.clone(),
            kind,
        })
        .collect()
}

/// Start `count` workers draining `rx` through `pipeline`.
pub fn spawn_workers(
    pipeline: Arc<Pipeline>,
    rx: mpsc::Receiver<WatchEvent>,
    count: usize,
) -> JoinSet<()> {
    let rx = Arc::new(Mutex::new(rx));
    let mut workers = JoinSet::new();
    for id in 0..count.max(1) {
        let rx = rx.clone();
        let pipeline = pipeline.clone();
        workers.spawn(async move {
            loop {
                let next = rx.lock().await.recv().await;
                let Some(event) = next else {
                    break;
                };
                tracing::debug!(worker = id, path = %event.path.display(), kind = ?event.kind, "handling event");
                pipeline.handle(&event).await;
            }
            tracing::debug!(worker = id, "worker stopped");
        });
    }
    workers
}

/// A running monitor.
pub struct MonitorHandle {
    watcher: Option<RecommendedWatcher>,
    workers: JoinSet<()>,
}

impl MonitorHandle {
    /// Stop watching and wait for queued events to finish.
    pub async fn shutdown(mut self) {
        // The queue's only sender lives in the watcher callback.
        drop(self.watcher.take());
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "monitor worker panicked");
            }
        }
    }
}

/// Watch `dir` and feed events to a worker pool running `pipeline`.
pub fn start_monitor(
    dir: &Path,
    pipeline: Arc<Pipeline>,
    workers: usize,
    queue_capacity: usize,
) -> Result<MonitorHandle> {
    if !dir.is_dir() {
        anyhow::bail!("Folder to watch does not exist: {}", dir.display());
    }

    let (tx, rx) = mpsc::channel::<WatchEvent>(queue_capacity);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                for watch_event in classify_event(&event) {
                    if tx.blocking_send(watch_event).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        }
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;

    let workers = spawn_workers(pipeline, rx, workers);
    Ok(MonitorHandle {
        watcher: Some(watcher),
        workers,
    })
}

/// Entry point for `zec watch`.
pub async fn run_watch(config: &Config, dir_override: Option<PathBuf>) -> Result<()> {
    let dir = dir_override.unwrap_or_else(|| config.monitor.dir.clone());
    let collection = config.collection.name.clone();

    let client: Arc<dyn SearchService> = Arc::new(HttpSearchClient::from_config(&config.service)?);
    if let Err(e) = ensure_collection(client.as_ref(), &collection).await {
        tracing::warn!(collection = %collection, error = %e, "could not create collection");
    }

    let sink: Arc<dyn AlertSink> = Arc::from(create_sink(&config.alert));
    let ingestor = Ingestor::from_config(client, &config.ingest);
    let pipeline = Arc::new(Pipeline::new(ingestor, sink, collection, &config.monitor));

    let handle = start_monitor(
        &dir,
        pipeline,
        config.monitor.workers,
        config.monitor.queue_capacity,
    )?;
    println!("Watching folder: {}", dir.display());

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received; stopping watcher and draining queued events");

    tokio::select! {
        _ = handle.shutdown() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("second interrupt; abandoning in-flight events");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{type_metadata, SnippetResult, TopSnippetsResponse};
    use crate::testing::{FakeService, RecordingSink};
    use notify::event::{CreateKind, DataChange};
    use std::time::Duration;
    use tempfile::TempDir;

    fn result(score: f64) -> QueryResult {
        QueryResult {
            path: "x".into(),
            content: None,
            score,
            metadata: Default::default(),
        }
    }

    fn snippets(score: f64) -> TopSnippetsResponse {
        TopSnippetsResponse {
            document_results: vec![],
            results: vec![SnippetResult {
                path: "other.txt".into(),
                start_index: None,
                end_index: None,
                page_span: None,
                content: Some("hit".into()),
                score,
            }],
        }
    }

    fn monitor_config(queries: &[&str]) -> MonitorConfig {
        MonitorConfig {
            queries: queries.iter().map(|q| q.to_string()).collect(),
            ..Default::default()
        }
    }

    fn pipeline(fake: Arc<FakeService>, sink: Arc<RecordingSink>, queries: &[&str]) -> Pipeline {
        Pipeline::new(
            Ingestor::new(fake, 16, 3),
            sink,
            "example",
            &monitor_config(queries),
        )
    }

    #[test]
    fn alert_threshold_is_strict_and_uses_first_result() {
        let path = Path::new("/in/report.txt");
        let msg = alert_message("leak", path, &[result(0.21)], 0.2).unwrap();
        assert!(msg.contains("leak"));
        assert!(msg.contains("/in/report.txt"));

        assert!(alert_message("leak", path, &[result(0.19)], 0.2).is_none());
        assert!(alert_message("leak", path, &[result(0.2)], 0.2).is_none());
        assert!(alert_message("leak", path, &[], 0.2).is_none());
        // Later results are ignored even if they score higher.
        assert!(alert_message("leak", path, &[result(0.1), result(0.9)], 0.2).is_none());
    }

    #[tokio::test]
    async fn high_score_sends_one_alert() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("report.txt");
        std::fs::write(&file, "password leaked").unwrap();

        let fake = Arc::new(FakeService {
            top_snippets: snippets(0.21),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(fake.clone(), sink.clone(), &["security vulnerability"])
            .handle(&WatchEvent {
                path: file.clone(),
                kind: WatchEventKind::Created,
            })
            .await;

        assert_eq!(report, EventReport::Processed { alerts: 1 });
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("security vulnerability"));
        assert!(messages[0].contains(&file.display().to_string()));
    }

    #[tokio::test]
    async fn low_score_sends_nothing() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("report.txt");
        std::fs::write(&file, "nothing to see").unwrap();

        let fake = Arc::new(FakeService {
            top_snippets: snippets(0.19),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(fake, sink.clone(), &["security vulnerability"])
            .handle(&WatchEvent {
                path: file,
                kind: WatchEventKind::Modified,
            })
            .await;

        assert_eq!(report, EventReport::Processed { alerts: 0 });
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn notes_txt_scenario_queries_each_configured_query() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, "weekly notes").unwrap();

        let fake = Arc::new(FakeService {
            top_snippets: snippets(0.05),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(fake.clone(), sink.clone(), &["outage", "breach"])
            .handle(&WatchEvent {
                path: file,
                kind: WatchEventKind::Created,
            })
            .await;

        assert_eq!(report, EventReport::Processed { alerts: 0 });
        let adds = fake.add_calls();
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].metadata, type_metadata("text"));
        assert_eq!(adds[0].collection, "example");

        let queries: Vec<_> = fake
            .snippet_requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.query.clone(), r.k))
            .collect();
        assert_eq!(queries, vec![("outage".to_string(), 1), ("breach".to_string(), 1)]);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn unsupported_file_is_skipped_without_calls() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("image.png");
        std::fs::write(&file, [0u8; 8]).unwrap();

        let fake = Arc::new(FakeService {
            top_snippets: snippets(0.99),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(fake.clone(), sink.clone(), &["anything"])
            .handle(&WatchEvent {
                path: file,
                kind: WatchEventKind::Created,
            })
            .await;

        assert_eq!(report, EventReport::Skipped);
        assert!(fake.add_calls().is_empty());
        assert!(fake.snippet_requests.lock().unwrap().is_empty());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn ingest_failure_is_contained() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("bad.txt");
        std::fs::write(&file, "x").unwrap();

        let fake = Arc::new(FakeService {
            failing_paths: [file.to_string_lossy().to_string()].into_iter().collect(),
            top_snippets: snippets(0.99),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let report = pipeline(fake.clone(), sink.clone(), &["q"])
            .handle(&WatchEvent {
                path: file,
                kind: WatchEventKind::Created,
            })
            .await;

        assert_eq!(report, EventReport::Failed);
        assert!(fake.snippet_requests.lock().unwrap().is_empty());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn workers_drain_queue_after_sender_closes() {
        let tmp = TempDir::new().unwrap();
        let mut events = Vec::new();
        for i in 0..5 {
            let file = tmp.path().join(format!("f{}.txt", i));
            std::fs::write(&file, format!("file {}", i)).unwrap();
            events.push(WatchEvent {
                path: file,
                kind: WatchEventKind::Created,
            });
        }

        let fake = Arc::new(FakeService::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(pipeline(fake.clone(), sink, &["q"]));

        let (tx, rx) = mpsc::channel(16);
        let mut workers = spawn_workers(pipeline, rx, 2);
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);
        while workers.join_next().await.is_some() {}

        assert_eq!(fake.add_calls().len(), 5);
    }

    #[test]
    fn classify_keeps_creates_and_modifies_of_files() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();

        let created = notify::Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        assert_eq!(
            classify_event(&created),
            vec![WatchEvent {
                path: file.clone(),
                kind: WatchEventKind::Created
            }]
        );

        let modified = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(file.clone());
        assert_eq!(classify_event(&modified)[0].kind, WatchEventKind::Modified);

        let moved_in = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(file.clone());
        assert_eq!(
            classify_event(&moved_in),
            vec![WatchEvent {
                path: file.clone(),
                kind: WatchEventKind::Created
            }]
        );

        let moved_out = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(file.clone());
        assert!(classify_event(&moved_out).is_empty());

        let dir_event = notify::Event::new(EventKind::Create(CreateKind::Folder))
            .add_path(tmp.path().to_path_buf());
        assert!(classify_event(&dir_event).is_empty());

        let removed = notify::Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(file);
        assert!(classify_event(&removed).is_empty());
    }

    #[test]
    fn classify_rename_pair_keeps_destination() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("draft.txt");
        let to = tmp.path().join("final.txt");
        std::fs::write(&from, "x").unwrap();
        std::fs::write(&to, "x").unwrap();

        let renamed = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from)
            .add_path(to.clone());
        assert_eq!(
            classify_event(&renamed),
            vec![WatchEvent {
                path: to,
                kind: WatchEventKind::Created
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn workers_handle_events_concurrently() {
        let tmp = TempDir::new().unwrap();
        let fake = Arc::new(FakeService {
            add_delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(pipeline(fake.clone(), sink, &["q"]));

        let (tx, rx) = mpsc::channel(16);
        let mut workers = spawn_workers(pipeline, rx, 4);
        let started = std::time::Instant::now();
        for i in 0..4 {
            let file = tmp.path().join(format!("slow{}.txt", i));
            std::fs::write(&file, "slow").unwrap();
            tx.send(WatchEvent {
                path: file,
                kind: WatchEventKind::Created,
            })
            .await
            .unwrap();
        }
        drop(tx);
        while workers.join_next().await.is_some() {}

        assert_eq!(fake.add_calls().len(), 4);
        assert!(fake.max_in_flight.load(std::sync::atomic::Ordering::SeqCst) >= 2);
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn watcher_picks_up_new_file() {
        let tmp = TempDir::new().unwrap();
        let fake = Arc::new(FakeService::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(pipeline(fake.clone(), sink, &["q"]));

        let handle = start_monitor(tmp.path(), pipeline, 2, 32).unwrap();
        let file = tmp.path().join("incoming.txt");
        std::fs::write(&file, "fresh content").unwrap();

        let expected = file.to_string_lossy().to_string();
        let mut seen = false;
        for _ in 0..100 {
            if fake.add_paths().contains(&expected) {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        handle.shutdown().await;
        assert!(seen, "watcher never ingested {}", expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn watcher_picks_up_file_moved_in() {
        let watched = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let fake = Arc::new(FakeService::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(pipeline(fake.clone(), sink, &["q"]));

        let staged = staging.path().join("report.txt");
        std::fs::write(&staged, "downloaded report").unwrap();

        let handle = start_monitor(watched.path(), pipeline, 2, 32).unwrap();
        let file = watched.path().join("report.txt");
        std::fs::rename(&staged, &file).unwrap();

        let expected = file.to_string_lossy().to_string();
        let mut seen = false;
        for _ in 0..100 {
            if fake.add_paths().contains(&expected) {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        handle.shutdown().await;
        assert!(seen, "moved-in file {} was never ingested", expected);
    }

    #[test]
    fn missing_dir_is_rejected() {
        let fake = Arc::new(FakeService::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Arc::new(pipeline(fake, sink, &["q"]));
        let err = start_monitor(Path::new("/no/such/dir"), pipeline, 1, 1).err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }
}
