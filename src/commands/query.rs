//! Catalog query commands: search, show, channels, themes

use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::NaturalKey;
use crate::store::{MediaFilter, MediaPage, MediaStore, NamePage, StoredMedia};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// Search options
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub text: Option<String>,
    pub channel: Option<String>,
    pub theme: Option<String>,
    /// `YYYY-MM-DD` or a Unix timestamp
    pub since: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Search result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub page: MediaPage,
    pub offset: usize,
}

/// A single record with its URLs expanded
#[derive(Debug, Clone, Serialize)]
pub struct MediaDetails {
    pub media: StoredMedia,
    pub small_url: String,
    pub hd_url: String,
    pub best_url: String,
}

/// Parse a `--since` value into a Unix timestamp (UTC midnight for dates)
pub fn parse_since(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(timestamp) = value.parse::<i64>() {
        return Ok(timestamp);
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        Error::Parse(format!(
            "invalid --since value '{}': expected YYYY-MM-DD or a Unix timestamp",
            value
        ))
    })?;
    Ok(Utc
        .from_utc_datetime(&date.and_time(NaiveTime::MIN))
        .timestamp())
}

/// Search the catalog
pub async fn cmd_search(
    config: &Config,
    store: &MediaStore,
    options: SearchOptions,
) -> Result<SearchResult> {
    let min_timestamp = options.since.as_deref().map(parse_since).transpose()?;
    let filter = MediaFilter {
        channel: options.channel,
        theme: options.theme,
        min_timestamp,
        text: options.text,
        limit: options.limit.unwrap_or(config.query.default_limit),
        offset: options.offset,
    };
    info!(text = ?filter.text, channel = ?filter.channel, "Searching catalog");

    let page = store.query(&filter).await?;
    debug!(found = page.records.len(), total = page.total, "Search finished");

    Ok(SearchResult {
        page,
        offset: filter.offset,
    })
}

/// Look up one record and expand its URLs
pub async fn cmd_show(store: &MediaStore, key: &NaturalKey) -> Result<MediaDetails> {
    let media = store
        .get(key)
        .await?
        .ok_or_else(|| Error::NotFound(key.to_string()))?;

    let resolved = media.record.resolved();
    Ok(MediaDetails {
        small_url: resolved.small_url,
        hd_url: resolved.hd_url,
        best_url: media.record.best_quality_url(),
        media,
    })
}

/// Records broadcast within the last `hours`, newest first
pub async fn cmd_recent(
    config: &Config,
    store: &MediaStore,
    hours: u32,
    limit: Option<usize>,
) -> Result<Vec<StoredMedia>> {
    let since = Utc::now().timestamp() - i64::from(hours) * 3600;
    let limit = limit.unwrap_or(config.query.default_limit);
    store.recent(since, limit).await
}

pub async fn cmd_channels(store: &MediaStore) -> Result<Vec<String>> {
    store.channels().await
}

/// Options for browsing themes
#[derive(Debug, Clone, Default)]
pub struct ThemeOptions {
    pub channel: Option<String>,
    /// `YYYY-MM-DD` or a Unix timestamp
    pub since: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub async fn cmd_themes(
    config: &Config,
    store: &MediaStore,
    options: ThemeOptions,
) -> Result<NamePage> {
    let filter = MediaFilter {
        channel: options.channel,
        min_timestamp: options.since.as_deref().map(parse_since).transpose()?,
        limit: options.limit.unwrap_or(config.query.default_limit),
        offset: options.offset,
        ..Default::default()
    };
    store.themes(&filter).await
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Print search results to console
pub fn print_search_results(result: &SearchResult) {
    let page = &result.page;
    if page.records.is_empty() {
        println!("\nNo matching entries.");
        return;
    }

    println!(
        "\n🔍 Showing {}-{} of {} entries\n",
        result.offset + 1,
        result.offset + page.records.len(),
        page.total
    );

    for media in &page.records {
        let record = &media.record;
        let marker = if record.is_new { " [new]" } else { "" };
        println!(
            "{}  {} | {} | {}{}",
            format_timestamp(record.timestamp),
            record.channel,
            record.theme,
            record.title,
            marker
        );
        if !record.duration.is_empty() {
            println!("    Duration: {}", record.duration);
        }
    }
}

/// Print one record to console
pub fn print_media_details(details: &MediaDetails) {
    let record = &details.media.record;
    println!("\n🎬 {}\n", record.title);
    println!("Channel: {}", record.channel);
    println!("Theme: {}", record.theme);
    println!("Broadcast: {} {}", record.date, record.time);
    println!("Duration: {}", record.duration);
    if !record.size_mb.is_empty() {
        println!("Size: {} MB", record.size_mb);
    }
    if !record.geo.is_empty() {
        println!("Geo: {}", record.geo);
    }
    if !record.description.is_empty() {
        println!("\n{}\n", record.description);
    }
    println!("URL: {}", record.url);
    if !details.small_url.is_empty() {
        println!("Small: {}", details.small_url);
    }
    if !details.hd_url.is_empty() {
        println!("HD: {}", details.hd_url);
    }
    if !record.subtitle_url.is_empty() {
        println!("Subtitles: {}", record.subtitle_url);
    }
    if !record.website.is_empty() {
        println!("Website: {}", record.website);
    }
    println!("Best quality: {}", details.best_url);
}

/// Print a plain list of names, one per line
pub fn print_names(names: &[String]) {
    for name in names {
        println!("{}", name);
    }
}
