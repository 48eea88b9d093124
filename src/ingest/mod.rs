//! Merge engine: applies a parsed list to the media store
//!
//! A run opens the list file, parses it on a blocking worker and applies the
//! resulting batches in arrival order. Full runs clear the store first; diff
//! runs upsert on top of it. Every run ends with exactly one terminal event
//! on its [`ProgressReporter`].

mod events;

pub use events::*;
pub use crate::store::IngestMode;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::media::MediaRecord;
use crate::parse::{BatchSink, ListHeader, ListParser, ParseError};
use crate::store::{MediaStore, RunCounts, RunStatus};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What stopped a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Io,
    Parse,
    Storage,
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Io => write!(f, "io"),
            FailureKind::Parse => write!(f, "parse"),
            FailureKind::Storage => write!(f, "storage"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal failure of a run, with the number of records committed before it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind} failure after {processed} records: {message}")]
pub struct IngestFailure {
    pub kind: FailureKind,
    pub message: String,
    pub processed: u64,
}

impl IngestFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>, processed: u64) -> Self {
        Self {
            kind,
            message: message.into(),
            processed,
        }
    }

    fn from_parse(error: ParseError, processed: u64) -> Self {
        let kind = match error {
            ParseError::Syntax(_) => FailureKind::Parse,
            ParseError::Io(_) => FailureKind::Io,
            ParseError::Cancelled => FailureKind::Cancelled,
        };
        Self::new(kind, error.to_string(), processed)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub run_id: String,
    pub mode: IngestMode,
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Rows removed before loading (full runs only)
    pub cleared: u64,
    pub header: Option<ListHeader>,
    pub duration_ms: u64,
}

/// Tuning knobs for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub batch_size: usize,
    /// Parsed batches buffered between the parser and the store
    pub channel_capacity: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            channel_capacity: config.channel_capacity,
        }
    }
}

/// Messages from the parse worker to the merge loop
enum ParserEvent {
    Header(ListHeader),
    Batch(Vec<MediaRecord>),
    Complete(usize),
    Failed(ParseError),
}

/// Forwards parser callbacks over a bounded channel
struct ChannelSink {
    tx: mpsc::Sender<ParserEvent>,
    cancel: CancellationToken,
}

impl BatchSink for ChannelSink {
    fn on_header(&mut self, header: ListHeader) {
        let _ = self.tx.blocking_send(ParserEvent::Header(header));
    }

    fn on_batch(&mut self, records: Vec<MediaRecord>, cumulative: usize) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        debug!(cumulative, "Parsed batch");
        match self.tx.blocking_send(ParserEvent::Batch(records)) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }

    fn on_complete(&mut self, total: usize) {
        let _ = self.tx.blocking_send(ParserEvent::Complete(total));
    }

    fn on_error(&mut self, error: ParseError, decoded: usize) {
        debug!(decoded, error = %error, "Parser stopped");
        let _ = self.tx.blocking_send(ParserEvent::Failed(error));
    }
}

/// Reader that stops with an error once its token is cancelled
struct CancellableReader<R> {
    inner: R,
    cancel: CancellationToken,
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("read cancelled"));
        }
        self.inner.read(buf)
    }
}

/// Runs list ingestion against one store, one run at a time
#[derive(Clone)]
pub struct Ingestor {
    store: MediaStore,
    options: IngestOptions,
    active: Arc<Mutex<()>>,
}

impl Ingestor {
    pub fn new(store: MediaStore, options: IngestOptions) -> Self {
        Self {
            store,
            options,
            active: Arc::new(Mutex::new(())),
        }
    }

    /// Ingest the list at `path`.
    ///
    /// Fails with [`Error::RunInProgress`] without emitting anything when
    /// another run on this ingestor is active. Otherwise exactly one of
    /// `Complete` or `Error` is sent to `reporter`, and failures are also
    /// returned as [`Error::Ingest`]. Batches committed before a failure or
    /// cancellation stay committed.
    pub async fn run(
        &self,
        path: &Path,
        mode: IngestMode,
        mut reporter: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<IngestSummary> {
        let _guard = self.active.try_lock().map_err(|_| Error::RunInProgress)?;
        let started = Instant::now();

        info!(path = %path.display(), %mode, "Starting ingestion run");

        let run = match self
            .store
            .start_ingestion_run(mode, &path.display().to_string())
            .await
        {
            Ok(run) => run,
            Err(err) => {
                let failure = IngestFailure::new(FailureKind::Storage, err.to_string(), 0);
                reporter.fail(failure.clone()).await;
                return Err(Error::Ingest(failure));
            }
        };

        let mut progress = RunProgress::default();
        let result = self
            .execute(path, mode, &mut reporter, &cancel, &mut progress)
            .await;

        let (status, message) = match &result {
            Ok(()) => (RunStatus::Completed, None),
            Err(failure) if failure.kind == FailureKind::Cancelled => {
                (RunStatus::Cancelled, Some(failure.to_string()))
            }
            Err(failure) => (RunStatus::Failed, Some(failure.to_string())),
        };
        if let Err(err) = self
            .store
            .complete_ingestion_run(&run.id, status, progress.counts, message)
            .await
        {
            warn!(run_id = %run.id, error = %err, "Failed to record ingestion run");
        }

        match result {
            Ok(()) => {
                let counts = progress.counts;
                info!(
                    processed = counts.processed,
                    inserted = counts.inserted,
                    updated = counts.updated,
                    "Ingestion run completed"
                );
                reporter.complete(counts.processed).await;
                Ok(IngestSummary {
                    run_id: run.id,
                    mode,
                    processed: counts.processed,
                    inserted: counts.inserted,
                    updated: counts.updated,
                    cleared: progress.cleared,
                    header: progress.header,
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(failure) => {
                warn!(
                    kind = %failure.kind,
                    processed = failure.processed,
                    "Ingestion run failed: {}",
                    failure.message
                );
                reporter.fail(failure.clone()).await;
                Err(Error::Ingest(failure))
            }
        }
    }

    async fn execute(
        &self,
        path: &Path,
        mode: IngestMode,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
        progress: &mut RunProgress,
    ) -> std::result::Result<(), IngestFailure> {
        // Nothing touches the store until the list can be read.
        let file = File::open(path).map_err(|err| {
            IngestFailure::new(
                FailureKind::Io,
                format!("cannot open {}: {}", path.display(), err),
                0,
            )
        })?;

        if cancel.is_cancelled() {
            return Err(cancelled(0));
        }

        if mode == IngestMode::Full {
            progress.cleared = self
                .store
                .clear_all()
                .await
                .map_err(|err| IngestFailure::new(FailureKind::Storage, err.to_string(), 0))?;
        }

        let worker_cancel = cancel.child_token();
        let (tx, mut rx) = mpsc::channel(self.options.channel_capacity.max(1));
        let parser = ListParser::new(self.options.batch_size);
        let sink_cancel = worker_cancel.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let reader = CancellableReader {
                inner: file,
                cancel: sink_cancel.clone(),
            };
            let mut sink = ChannelSink {
                tx,
                cancel: sink_cancel,
            };
            parser.parse(reader, &mut sink);
        });

        let result = self.merge(&mut rx, reporter, cancel, progress).await;

        // Unblock and stop the worker before joining it.
        worker_cancel.cancel();
        drop(rx);
        if let Err(err) = worker.await {
            warn!(error = %err, "List parser worker did not finish cleanly");
        }

        result
    }

    /// Apply parsed batches in arrival order until the parser finishes
    async fn merge(
        &self,
        rx: &mut mpsc::Receiver<ParserEvent>,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
        progress: &mut RunProgress,
    ) -> std::result::Result<(), IngestFailure> {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(progress.counts.processed)),
                event = rx.recv() => event,
            };

            match event {
                Some(ParserEvent::Header(header)) => {
                    debug!(created_at = %header.created_at, list_id = %header.list_id, "List header");
                    progress.header.get_or_insert(header);
                }
                Some(ParserEvent::Batch(records)) => {
                    let outcome = self.store.upsert_batch(&records).await.map_err(|err| {
                        IngestFailure::new(
                            FailureKind::Storage,
                            err.to_string(),
                            progress.counts.processed,
                        )
                    })?;
                    progress.counts.processed += records.len() as u64;
                    progress.counts.inserted += outcome.inserted as u64;
                    progress.counts.updated += outcome.updated as u64;
                    // A stalled listener must not hold off cancellation
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(progress.counts.processed)),
                        _ = reporter.progress(progress.counts.processed) => {}
                    }
                }
                Some(ParserEvent::Complete(total)) => {
                    debug!(total, "Parser completed");
                    return Ok(());
                }
                Some(ParserEvent::Failed(error)) => {
                    return Err(IngestFailure::from_parse(error, progress.counts.processed));
                }
                None => {
                    return Err(IngestFailure::new(
                        FailureKind::Parse,
                        "list parser stopped unexpectedly",
                        progress.counts.processed,
                    ));
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct RunProgress {
    counts: RunCounts,
    cleared: u64,
    header: Option<ListHeader>,
}

fn cancelled(processed: u64) -> IngestFailure {
    IngestFailure::new(FailureKind::Cancelled, "ingestion cancelled", processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::NaturalKey;
    use crate::store::tests::setup_test_store;
    use crate::store::MediaFilter;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn entry(
        channel: &str,
        theme: &str,
        title: &str,
        description: &str,
        is_new: bool,
    ) -> serde_json::Value {
        let flag = if is_new { "true" } else { "false" };
        json!([
            channel, theme, title, "01.01.2024", "20:00:00", "00:15:00", "120",
            description, "https://cdn.example.com/v.mp4", "https://example.com",
            "", "", "", "", "", "", "1704135600", "", "DE", flag
        ])
    }

    /// Build a list file with repeated "X" keys
    fn write_list(dir: &TempDir, name: &str, entries: &[serde_json::Value]) -> PathBuf {
        let mut body = String::from(
            r#"{"Filmliste":["01.01.2024, 10:00","01.01.2024, 09:00","3","gen","list-1"]"#,
        );
        for value in entries {
            body.push_str(r#","X":"#);
            body.push_str(&value.to_string());
        }
        body.push('}');
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn options(batch_size: usize) -> IngestOptions {
        IngestOptions {
            batch_size,
            channel_capacity: 2,
        }
    }

    async fn drain(mut rx: mpsc::Receiver<IngestEvent>) -> Vec<IngestEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_then_diff_end_to_end() {
        let (store, tmp) = setup_test_store().await;
        let ingestor = Ingestor::new(store.clone(), options(2));

        let full = write_list(
            &tmp,
            "full.json",
            &[
                entry("ARD", "News", "Morning", "original", false),
                entry("", "", "Evening", "original", false),
                entry("ZDF", "Sport", "Match", "original", false),
            ],
        );
        let summary = ingestor
            .run(&full, IngestMode::Full, ProgressReporter::detached(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.header.as_ref().map(|h| h.list_id.as_str()), Some("list-1"));
        assert_eq!(store.count().await.unwrap(), 3);
        assert!(store
            .get(&NaturalKey::new("ARD", "News", "Evening"))
            .await
            .unwrap()
            .is_some());

        let diff = write_list(
            &tmp,
            "diff.json",
            &[
                entry("ARD", "News", "Morning", "UPDATED description", true),
                entry("", "", "Late", "new", false),
                entry("3Sat", "Doku", "Nature", "new", false),
            ],
        );
        let (reporter, rx) = ProgressReporter::channel(16);
        let summary = ingestor
            .run(&diff, IngestMode::Diff, reporter, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.cleared, 0);
        assert_eq!(store.count().await.unwrap(), 5);

        let updated = store
            .get(&NaturalKey::new("ARD", "News", "Morning"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.record.description, "UPDATED description");
        assert!(updated.record.is_new);

        let page = store
            .query(&MediaFilter {
                text: Some("Morning".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let events = drain(rx).await;
        assert_eq!(
            events,
            vec![
                IngestEvent::Progress { processed: 2 },
                IngestEvent::Progress { processed: 3 },
                IngestEvent::Complete { total: 3 },
            ]
        );

        // Applying the same diff again changes nothing
        let before = store.query(&MediaFilter::default()).await.unwrap();
        let again = ingestor
            .run(&diff, IngestMode::Diff, ProgressReporter::detached(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.updated, 3);
        assert_eq!(store.query(&MediaFilter::default()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_full_load_clears_prior_state() {
        let (store, tmp) = setup_test_store().await;
        let ingestor = Ingestor::new(store.clone(), options(10));

        let list_a = write_list(
            &tmp,
            "a.json",
            &[
                entry("ARD", "News", "A1", "", false),
                entry("ARD", "News", "A2", "", false),
                entry("ZDF", "Sport", "A3", "", false),
            ],
        );
        let list_b = write_list(&tmp, "b.json", &[entry("NDR", "Talk", "B1", "", false)]);

        ingestor
            .run(&list_a, IngestMode::Full, ProgressReporter::detached(), CancellationToken::new())
            .await
            .unwrap();
        let summary = ingestor
            .run(&list_b, IngestMode::Full, ProgressReporter::detached(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.cleared, 3);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.channels().await.unwrap(), vec!["NDR"]);
    }

    #[tokio::test]
    async fn test_missing_file_leaves_store_untouched() {
        let (store, tmp) = setup_test_store().await;
        store
            .upsert_batch(&[crate::store::tests::record("ARD", "News", "Kept")])
            .await
            .unwrap();
        let ingestor = Ingestor::new(store.clone(), options(10));

        let (reporter, rx) = ProgressReporter::channel(4);
        let err = ingestor
            .run(
                &tmp.path().join("missing.json"),
                IngestMode::Full,
                reporter,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            Error::Ingest(failure) => {
                assert_eq!(failure.kind, FailureKind::Io);
                assert_eq!(failure.processed, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.count().await.unwrap(), 1);

        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            IngestEvent::Error { failure } if failure.kind == FailureKind::Io
        ));

        let run = store.get_latest_run().await.unwrap().unwrap();
        assert_eq!(run.get_status().unwrap(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_truncated_list_keeps_committed_batches() {
        let (store, tmp) = setup_test_store().await;
        let ingestor = Ingestor::new(store.clone(), options(2));

        let path = write_list(
            &tmp,
            "whole.json",
            &[
                entry("ARD", "News", "One", "", false),
                entry("ARD", "News", "Two", "", false),
                entry("ARD", "News", "Three", "", false),
            ],
        );
        let body = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, &body[..body.len() - 20]).unwrap();

        let (reporter, rx) = ProgressReporter::channel(8);
        let err = ingestor
            .run(&path, IngestMode::Diff, reporter, CancellationToken::new())
            .await
            .unwrap_err();

        let Error::Ingest(failure) = err else {
            panic!("expected ingest failure");
        };
        assert_eq!(failure.kind, FailureKind::Parse);
        assert_eq!(failure.processed, 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let events = drain(rx).await;
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(events.first(), Some(&IngestEvent::Progress { processed: 2 }));
        assert!(matches!(events.last(), Some(IngestEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let (store, tmp) = setup_test_store().await;
        sqlx::query("DROP TABLE media_entries")
            .execute(store.pool())
            .await
            .unwrap();
        let ingestor = Ingestor::new(store.clone(), options(2));
        let path = write_list(&tmp, "list.json", &[entry("ARD", "News", "One", "", false)]);

        let (reporter, rx) = ProgressReporter::channel(4);
        let err = ingestor
            .run(&path, IngestMode::Diff, reporter, CancellationToken::new())
            .await
            .unwrap_err();

        let Error::Ingest(failure) = err else {
            panic!("expected ingest failure");
        };
        assert_eq!(failure.kind, FailureKind::Storage);
        assert_eq!(failure.processed, 0);

        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (store, tmp) = setup_test_store().await;
        let ingestor = Ingestor::new(store.clone(), options(1));
        let path = write_list(&tmp, "list.json", &[entry("ARD", "News", "One", "", false)]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let (reporter, rx) = ProgressReporter::channel(4);
        let err = ingestor
            .run(&path, IngestMode::Full, reporter, cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Ingest(IngestFailure { kind: FailureKind::Cancelled, .. })
        ));
        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            IngestEvent::Error { failure } if failure.kind == FailureKind::Cancelled
        ));
        assert_eq!(
            store.get_latest_run().await.unwrap().unwrap().get_status().unwrap(),
            RunStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_committed_batches() {
        let (store, tmp) = setup_test_store().await;
        let ingestor = Ingestor::new(store.clone(), options(1));
        let entries: Vec<_> = (0..5)
            .map(|i| entry("ARD", "News", &format!("T{i}"), "", false))
            .collect();
        let path = write_list(&tmp, "list.json", &entries);

        let cancel = CancellationToken::new();
        let (reporter, mut rx) = ProgressReporter::channel(1);
        let run = {
            let ingestor = ingestor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                ingestor
                    .run(&path, IngestMode::Diff, reporter, cancel)
                    .await
            })
        };

        let first = rx.recv().await.unwrap();
        assert_eq!(first, IngestEvent::Progress { processed: 1 });
        cancel.cancel();

        let mut events = vec![first];
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let result = run.await.unwrap();

        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        let Some(IngestEvent::Error { failure }) = events.last() else {
            panic!("run must end with an error event");
        };
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(store.count().await.unwrap(), failure.processed);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancel_while_listener_stalls() {
        let (store, tmp) = setup_test_store().await;
        let ingestor = Ingestor::new(store.clone(), options(1));
        let entries: Vec<_> = (0..5)
            .map(|i| entry("ARD", "News", &format!("T{i}"), "", false))
            .collect();
        let path = write_list(&tmp, "list.json", &entries);

        let cancel = CancellationToken::new();
        // Nobody reads until the run has been cancelled
        let (reporter, rx) = ProgressReporter::channel(1);
        let run = {
            let ingestor = ingestor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                ingestor
                    .run(&path, IngestMode::Diff, reporter, cancel)
                    .await
            })
        };

        // First event fills the channel; the second batch commits and then
        // its progress event waits for room.
        let wait = Duration::from_secs(5);
        timeout(wait, async {
            while store.count().await.unwrap() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        timeout(wait, async {
            loop {
                let latest = store.get_latest_run().await.unwrap().unwrap();
                if latest.get_status().unwrap() == RunStatus::Cancelled {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], IngestEvent::Progress { processed: 1 });
        let IngestEvent::Error { failure } = &events[1] else {
            panic!("run must end with an error event");
        };
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(failure.processed, 2);
        assert!(run.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let (store, tmp) = setup_test_store().await;
        let ingestor = Ingestor::new(store, options(1));
        let path = write_list(&tmp, "list.json", &[entry("ARD", "News", "One", "", false)]);

        let _held = ingestor.active.try_lock().unwrap();
        let (reporter, rx) = ProgressReporter::channel(4);
        let err = ingestor
            .run(&path, IngestMode::Diff, reporter, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RunInProgress));
        assert!(drain(rx).await.is_empty());
    }
}
