//! Persistent media catalog on SQLite
//!
//! This module owns the only shared mutable resource of the pipeline:
//! - Media entries, unique by (channel, theme, title)
//! - Ingestion runs (history and counts)
//! - Remote checks (last observed list metadata)
//!
//! Writes happen one batch per transaction. Every committed write is
//! announced on a broadcast channel so readers can refresh.

mod query;
mod runs;
mod schema;

pub use query::*;
pub use runs::*;
pub use schema::SCHEMA_SQL;

use crate::config::Config;
use crate::error::Result;
use crate::media::MediaRecord;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, info};

const CHANGE_CAPACITY: usize = 64;

/// Notification published after a committed write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreChange {
    Cleared { removed: u64 },
    BatchCommitted { inserted: usize, updated: usize },
}

/// Result of applying one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub updated: usize,
}

/// Media catalog handle
#[derive(Clone)]
pub struct MediaStore {
    pool: SqlitePool,
    changes: broadcast::Sender<StoreChange>,
    max_limit: usize,
}

impl MediaStore {
    /// Connect to the catalog configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut store = Self::open(&config.paths.db_file).await?;
        store.max_limit = config.query.max_limit;
        Ok(store)
    }

    /// Open the database at `db_path`, creating schema when missing
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let store = Self {
            pool,
            changes,
            max_limit: crate::config::default_query_max_limit(),
        };

        if !store.is_initialized().await? {
            store.init_schema().await?;
        }

        Ok(store)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='media_entries'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    /// Close all connections; later operations fail
    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Subscribe to committed writes
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn publish(&self, change: StoreChange) {
        // No subscribers is not an error.
        let _ = self.changes.send(change);
    }

    // ===== Write Operations =====

    /// Remove every media entry
    pub async fn clear_all(&self) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM media_entries")
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!(removed, "Cleared media entries");
        self.publish(StoreChange::Cleared { removed });
        Ok(removed)
    }

    /// Insert or update a batch of records in one transaction.
    ///
    /// Rows are matched on (channel, theme, title); a match keeps its id and
    /// takes every other attribute from the incoming record. Later records
    /// in `records` win over earlier ones with the same key.
    pub async fn upsert_batch(&self, records: &[MediaRecord]) -> Result<BatchOutcome> {
        if records.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let mut tx = self.pool.begin().await?;

        let max_id_before: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM media_entries")
                .fetch_one(&mut *tx)
                .await?;

        let mut new_ids = HashSet::new();
        for record in records {
            let id: i64 = sqlx::query_scalar(schema::UPSERT_SQL)
                .bind(&record.channel)
                .bind(&record.theme)
                .bind(&record.title)
                .bind(&record.date)
                .bind(&record.time)
                .bind(&record.duration)
                .bind(&record.size_mb)
                .bind(&record.description)
                .bind(&record.url)
                .bind(&record.website)
                .bind(&record.subtitle_url)
                .bind(&record.small_url)
                .bind(&record.hd_url)
                .bind(record.timestamp)
                .bind(&record.geo)
                .bind(record.is_new)
                .fetch_one(&mut *tx)
                .await?;
            // Ids only grow, so anything above the previous maximum is new.
            if id > max_id_before {
                new_ids.insert(id);
            }
        }

        tx.commit().await?;

        let outcome = BatchOutcome {
            inserted: new_ids.len(),
            updated: records.len() - new_ids.len(),
        };
        debug!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            "Committed batch"
        );
        self.publish(StoreChange::BatchCommitted {
            inserted: outcome.inserted,
            updated: outcome.updated,
        });
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::media::NaturalKey;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_store() -> (MediaStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = MediaStore::open(&tmp.path().join("test.db")).await.unwrap();
        (store, tmp)
    }

    pub(crate) fn record(channel: &str, theme: &str, title: &str) -> MediaRecord {
        MediaRecord {
            channel: channel.to_string(),
            theme: theme.to_string(),
            title: title.to_string(),
            description: format!("About {}", title),
            url: format!("https://cdn.example.com/{}.mp4", title),
            timestamp: 1_700_000_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_creates_schema() {
        let (store, _tmp) = setup_test_store().await;
        assert!(store.is_initialized().await.unwrap());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let (store, _tmp) = setup_test_store().await;

        let outcome = store
            .upsert_batch(&[record("ARD", "News", "A"), record("ARD", "News", "B")])
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome { inserted: 2, updated: 0 });

        let original = store
            .get(&NaturalKey::new("ARD", "News", "A"))
            .await
            .unwrap()
            .unwrap();

        let mut changed = record("ARD", "News", "A");
        changed.description = "Changed".to_string();
        changed.is_new = true;
        changed.timestamp = 1_800_000_000;
        let outcome = store
            .upsert_batch(&[changed, record("ZDF", "Sport", "C")])
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome { inserted: 1, updated: 1 });

        assert_eq!(store.count().await.unwrap(), 3);
        let updated = store
            .get(&NaturalKey::new("ARD", "News", "A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.record.description, "Changed");
        assert!(updated.record.is_new);
        assert_eq!(updated.record.timestamp, 1_800_000_000);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (store, _tmp) = setup_test_store().await;
        let batch = vec![record("ARD", "News", "A"), record("ZDF", "Sport", "B")];

        store.upsert_batch(&batch).await.unwrap();
        let first = store.query(&MediaFilter::default()).await.unwrap();

        let outcome = store.upsert_batch(&batch).await.unwrap();
        assert_eq!(outcome, BatchOutcome { inserted: 0, updated: 2 });
        let second = store.query(&MediaFilter::default()).await.unwrap();

        assert_eq!(first.total, second.total);
        assert_eq!(first.records, second.records);
    }

    #[tokio::test]
    async fn test_duplicate_keys_within_batch_last_wins() {
        let (store, _tmp) = setup_test_store().await;
        let mut later = record("ARD", "News", "A");
        later.description = "Later".to_string();

        let outcome = store
            .upsert_batch(&[record("ARD", "News", "A"), later])
            .await
            .unwrap();
        assert_eq!(outcome, BatchOutcome { inserted: 1, updated: 1 });
        assert_eq!(store.count().await.unwrap(), 1);

        let stored = store
            .get(&NaturalKey::new("ARD", "News", "A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.record.description, "Later");
    }

    #[tokio::test]
    async fn test_clear_all_and_subscribe() {
        let (store, _tmp) = setup_test_store().await;
        let mut changes = store.subscribe();

        store
            .upsert_batch(&[record("ARD", "News", "A")])
            .await
            .unwrap();
        let removed = store.clear_all().await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.is_empty().await.unwrap());

        assert_eq!(
            changes.recv().await.unwrap(),
            StoreChange::BatchCommitted { inserted: 1, updated: 0 }
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            StoreChange::Cleared { removed: 1 }
        );
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_clear() {
        let (store, _tmp) = setup_test_store().await;
        store
            .upsert_batch(&[record("ARD", "News", "A"), record("ARD", "News", "B")])
            .await
            .unwrap();
        store.clear_all().await.unwrap();

        let outcome = store
            .upsert_batch(&[record("ARD", "News", "A")])
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 1);
    }
}
