//! Import command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::{IngestEvent, IngestMode, IngestOptions, IngestSummary, Ingestor, ProgressReporter};
use crate::progress::{finish_progress, start_record_bar};
use crate::store::MediaStore;
use crate::update::{AutoDecompressor, Decompressor};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Options for importing a local list file
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub path: PathBuf,
    pub mode: IngestMode,
    pub show_progress: bool,
}

/// Import a local list file, plain or xz-compressed
pub async fn cmd_import(
    config: &Config,
    store: &MediaStore,
    options: ImportOptions,
) -> Result<IngestSummary> {
    if !options.path.exists() {
        return Err(Error::NotFound(options.path.display().to_string()));
    }

    let work_dir = config.work_dir();
    let list = decompress_list(&options.path, &work_dir).await?;
    let result = ingest_list(config, store, &list, options.mode, options.show_progress).await;

    if list != options.path {
        if let Err(e) = tokio::fs::remove_file(&list).await {
            warn!(path = %list.display(), "Failed to remove decompressed list: {}", e);
        }
    }
    result
}

/// Decompress `path` into `work_dir` when needed, off the async runtime
pub(crate) async fn decompress_list(path: &Path, work_dir: &Path) -> Result<PathBuf> {
    let path = path.to_path_buf();
    let work_dir = work_dir.to_path_buf();
    tokio::task::spawn_blocking(move || AutoDecompressor.decompress(&path, &work_dir))
        .await
        .map_err(|e| Error::Decompress(format!("decompression task failed: {}", e)))?
}

/// Run one ingestion, rendering its events and cancelling on Ctrl-C
pub(crate) async fn ingest_list(
    config: &Config,
    store: &MediaStore,
    path: &Path,
    mode: IngestMode,
    show_progress: bool,
) -> Result<IngestSummary> {
    let ingestor = Ingestor::new(store.clone(), IngestOptions::from(&config.ingest));
    let cancel = CancellationToken::new();

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current batch");
                cancel.cancel();
            }
        })
    };

    let (reporter, mut events) = ProgressReporter::channel(config.ingest.channel_capacity);
    let label = format!("Importing {} list", mode);
    let consumer = tokio::spawn(async move {
        let bar = show_progress.then(|| start_record_bar(&label));
        while let Some(event) = events.recv().await {
            match (&bar, event) {
                (Some(bar), IngestEvent::Progress { processed }) => bar.set_position(processed),
                (Some(bar), IngestEvent::Complete { total }) => {
                    bar.set_position(total);
                }
                (_, IngestEvent::Error { failure }) => {
                    info!(kind = %failure.kind, processed = failure.processed, "Import stopped");
                }
                (None, _) => {}
            }
        }
        if let Some(bar) = bar {
            finish_progress(bar, "done");
        }
    });

    let result = ingestor.run(path, mode, reporter, cancel).await;

    interrupt.abort();
    if let Err(e) = consumer.await {
        warn!("Progress display task failed: {}", e);
    }
    result
}

/// Print import summary to console
pub fn print_import_summary(summary: &IngestSummary) {
    println!("\n✓ {} import complete", summary.mode);
    if let Some(header) = &summary.header {
        if !header.created_at.is_empty() {
            println!("  List created: {}", header.created_at);
        }
    }
    if summary.cleared > 0 {
        println!("  Entries cleared: {}", summary.cleared);
    }
    println!("  Records processed: {}", summary.processed);
    println!("  Inserted: {}", summary.inserted);
    println!("  Updated: {}", summary.updated);
    println!("  Time: {:.1}s", summary.duration_ms as f64 / 1000.0);
}
