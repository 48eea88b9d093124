//! SQLite schema definition

/// SQL schema for the media catalog
pub const SCHEMA_SQL: &str = r#"
-- Media entries: one row per (channel, theme, title)
CREATE TABLE IF NOT EXISTS media_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel TEXT NOT NULL,
    theme TEXT NOT NULL,
    title TEXT NOT NULL,
    date TEXT NOT NULL DEFAULT '',
    time TEXT NOT NULL DEFAULT '',
    duration TEXT NOT NULL DEFAULT '',
    size_mb TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    website TEXT NOT NULL DEFAULT '',
    subtitle_url TEXT NOT NULL DEFAULT '',
    small_url TEXT NOT NULL DEFAULT '',
    hd_url TEXT NOT NULL DEFAULT '',
    timestamp INTEGER NOT NULL DEFAULT 0,
    geo TEXT NOT NULL DEFAULT '',
    is_new INTEGER NOT NULL DEFAULT 0,
    UNIQUE(channel, theme, title)
);

-- Ingestion runs: tracking history
CREATE TABLE IF NOT EXISTS ingestion_runs (
    id TEXT PRIMARY KEY,
    mode TEXT NOT NULL,
    source_path TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    records_processed INTEGER NOT NULL DEFAULT 0,
    records_inserted INTEGER NOT NULL DEFAULT 0,
    records_updated INTEGER NOT NULL DEFAULT 0,
    error TEXT
);

-- Remote checks: last observed metadata per list URL
CREATE TABLE IF NOT EXISTS remote_checks (
    url TEXT PRIMARY KEY,
    content_length INTEGER,
    last_modified TEXT,
    etag TEXT,
    checked_at TEXT NOT NULL,
    list_created_at TEXT,
    list_id TEXT
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_media_channel_theme ON media_entries(channel, theme);
CREATE INDEX IF NOT EXISTS idx_media_timestamp ON media_entries(timestamp);
CREATE INDEX IF NOT EXISTS idx_runs_started ON ingestion_runs(started_at);
"#;

/// Upsert statement shared by full loads and diffs; yields the row id
pub(crate) const UPSERT_SQL: &str = r#"
INSERT INTO media_entries (
    channel, theme, title, date, time, duration, size_mb, description,
    url, website, subtitle_url, small_url, hd_url, timestamp, geo, is_new
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(channel, theme, title) DO UPDATE SET
    date = excluded.date,
    time = excluded.time,
    duration = excluded.duration,
    size_mb = excluded.size_mb,
    description = excluded.description,
    url = excluded.url,
    website = excluded.website,
    subtitle_url = excluded.subtitle_url,
    small_url = excluded.small_url,
    hd_url = excluded.hd_url,
    timestamp = excluded.timestamp,
    geo = excluded.geo,
    is_new = excluded.is_new
RETURNING id
"#;
