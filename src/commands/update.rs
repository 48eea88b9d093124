//! Update command implementation

use super::import::{decompress_list, ingest_list};
use crate::config::Config;
use crate::error::Result;
use crate::ingest::{IngestMode, IngestSummary};
use crate::store::MediaStore;
use crate::update::{
    Fetcher, HttpProbe, MetadataProbe, RemoteMetadata, UpdateDecision, UpdatePolicy,
    UpdateSelector,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Options for the update command
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Check the remote list even if the interval has not passed
    pub force: bool,
    pub show_progress: bool,
}

/// Update statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStats {
    pub decision: UpdateDecision,
    pub summary: Option<IngestSummary>,
}

/// Check the remote list and import whatever the policy asks for
pub async fn cmd_update(
    config: &Config,
    store: &MediaStore,
    options: UpdateOptions,
) -> Result<UpdateStats> {
    let probe = HttpProbe::new(&config.filmlist)?;
    run_update(config, store, probe, options).await
}

pub(crate) async fn run_update<P: MetadataProbe>(
    config: &Config,
    store: &MediaStore,
    probe: P,
    options: UpdateOptions,
) -> Result<UpdateStats> {
    let selector = UpdateSelector::new(
        probe,
        UpdatePolicy::new(config.update.check_interval()),
        &config.filmlist.full_url,
    );
    let decision = selector.decide(store, options.force).await?;

    let summary = match &decision {
        UpdateDecision::SkipCheck | UpdateDecision::CheckFailed(_) => None,
        UpdateDecision::UpToDate(metadata) => {
            store.touch_remote_check(&metadata.url).await?;
            None
        }
        UpdateDecision::RequestFull => {
            let summary = fetch_and_ingest(
                config,
                store,
                &config.filmlist.full_url,
                "Filmliste-akt.xz",
                IngestMode::Full,
                None,
                options.show_progress,
            )
            .await?;
            Some(summary)
        }
        UpdateDecision::RequestDiff(metadata) => {
            let summary = fetch_and_ingest(
                config,
                store,
                &config.filmlist.diff_url,
                "Filmliste-diff.xz",
                IngestMode::Diff,
                Some(metadata),
                options.show_progress,
            )
            .await?;
            Some(summary)
        }
    };

    Ok(UpdateStats { decision, summary })
}

/// Download `url`, ingest it and remember the list fingerprint.
///
/// Full downloads fingerprint themselves; a diff records the probed
/// fingerprint of the full list that triggered it.
async fn fetch_and_ingest(
    config: &Config,
    store: &MediaStore,
    url: &str,
    file_name: &str,
    mode: IngestMode,
    probed: Option<&RemoteMetadata>,
    show_progress: bool,
) -> Result<IngestSummary> {
    let work_dir = config.work_dir();
    let fetcher = Fetcher::new(&config.filmlist, &work_dir)?.with_progress(show_progress);
    let download = fetcher
        .download(url, file_name, &CancellationToken::new())
        .await?;

    let list = decompress_list(&download.path, &work_dir).await?;
    let result = ingest_list(config, store, &list, mode, show_progress).await;

    remove_quietly(&download.path).await;
    if list != download.path {
        remove_quietly(&list).await;
    }
    let summary = result?;

    let metadata = probed.cloned().unwrap_or(download.metadata);
    store
        .save_remote_check(&metadata, summary.header.as_ref())
        .await?;
    info!(url = %metadata.url, "Recorded list fingerprint");

    Ok(summary)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), "Failed to remove list file: {}", e);
    }
}

/// Print update statistics to console
pub fn print_update_stats(stats: &UpdateStats) {
    match &stats.decision {
        UpdateDecision::SkipCheck => {
            println!("✓ Checked recently, nothing to do (use --force to check now)");
        }
        UpdateDecision::UpToDate(_) => println!("✓ Media list is up to date"),
        UpdateDecision::CheckFailed(reason) => {
            println!("⚠ Could not check for updates: {}", reason);
        }
        UpdateDecision::RequestFull | UpdateDecision::RequestDiff(_) => {
            if let Some(summary) = &stats.summary {
                super::print_import_summary(summary);
            }
        }
    }
}
