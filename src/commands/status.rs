//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{CatalogStats, IngestionRun, MediaStore, RemoteCheck};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub full_url: String,
    pub diff_url: String,
    pub stats: CatalogStats,
    pub latest_run: Option<IngestionRun>,
    pub last_check: Option<RemoteCheck>,
}

/// Get catalog status
pub async fn cmd_status(config: &Config, store: &MediaStore) -> Result<StatusInfo> {
    info!("Getting status");

    let stats = store.stats().await?;
    let latest_run = store.get_latest_run().await?;
    let last_check = store.get_remote_check(&config.filmlist.full_url).await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        full_url: config.filmlist.full_url.clone(),
        diff_url: config.filmlist.diff_url.clone(),
        stats,
        latest_run,
        last_check,
    })
}

/// Recent ingestion runs, newest first
pub async fn cmd_history(store: &MediaStore, limit: usize) -> Result<Vec<IngestionRun>> {
    store.list_runs(limit).await
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 kuckmal Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);

    println!("\nCatalog:");
    println!("  Entries: {}", status.stats.total);
    println!("  Channels: {}", status.stats.channels);
    println!("  Themes: {}", status.stats.themes);
    println!("  New: {}", status.stats.new_entries);
    if let Some(latest) = status
        .stats
        .latest_timestamp
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
    {
        println!("  Latest broadcast: {}", latest.format("%Y-%m-%d %H:%M"));
    }

    println!("\nLists:");
    println!("  Full: {}", status.full_url);
    println!("  Diff: {}", status.diff_url);
    match &status.last_check {
        Some(check) => {
            println!("  Last check: {}", check.checked_at);
            if let Some(created) = &check.list_created_at {
                println!("  List created: {}", created);
            }
        }
        None => println!("  Last check: never (run 'kuckmal update')"),
    }

    if let Some(run) = &status.latest_run {
        println!("\nLast import:");
        println!("  Mode: {}", run.mode);
        println!("  Source: {}", run.source_path);
        println!("  Started: {}", run.started_at);
        println!("  Status: {}", run.status);
        println!(
            "  Records: {} ({} inserted, {} updated)",
            run.records_processed, run.records_inserted, run.records_updated
        );
        if let Some(error) = &run.error {
            println!("  Error: {}", error);
        }
    }
}

/// Print ingestion history to console
pub fn print_history(runs: &[IngestionRun]) {
    if runs.is_empty() {
        println!("No imports yet.");
        return;
    }
    for run in runs {
        println!(
            "{}  {:<4} {:<9} {:>8} processed  {}",
            run.started_at, run.mode, run.status, run.records_processed, run.source_path
        );
        if let Some(error) = &run.error {
            println!("    {}", error);
        }
    }
}
