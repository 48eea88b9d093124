//! Ingestion run history and remote check bookkeeping

use super::MediaStore;
use crate::error::{Error, Result};
use crate::parse::ListHeader;
use crate::update::RemoteMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// How a list is merged into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Clear the store, then load every record
    Full,
    /// Upsert records on top of the existing store
    Diff,
}

impl std::fmt::Display for IngestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestMode::Full => write!(f, "full"),
            IngestMode::Diff => write!(f, "diff"),
        }
    }
}

impl FromStr for IngestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full" => Ok(IngestMode::Full),
            "diff" => Ok(IngestMode::Diff),
            _ => Err(Error::Other(format!("Unknown ingest mode: {}", s))),
        }
    }
}

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            _ => Err(Error::Other(format!("Unknown run status: {}", s))),
        }
    }
}

/// Record counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
}

/// An ingestion run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: String,
    pub mode: String,
    pub source_path: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub records_processed: i64,
    pub records_inserted: i64,
    pub records_updated: i64,
    pub error: Option<String>,
}

impl IngestionRun {
    pub fn new(mode: IngestMode, source_path: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mode: mode.to_string(),
            source_path,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            records_processed: 0,
            records_inserted: 0,
            records_updated: 0,
            error: None,
        }
    }

    pub fn get_status(&self) -> Result<RunStatus> {
        self.status.parse()
    }
}

/// Last observed metadata of a remote list
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RemoteCheck {
    pub url: String,
    pub content_length: Option<i64>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub checked_at: String,
    pub list_created_at: Option<String>,
    pub list_id: Option<String>,
}

impl RemoteCheck {
    pub fn metadata(&self) -> RemoteMetadata {
        RemoteMetadata {
            url: self.url.clone(),
            content_length: self.content_length.and_then(|len| u64::try_from(len).ok()),
            last_modified: self.last_modified.clone(),
            etag: self.etag.clone(),
        }
    }

    /// When the remote was last checked; `None` if the stored value is unreadable
    pub fn checked_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.checked_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl MediaStore {
    // ===== Ingestion Run Operations =====

    /// Start a new ingestion run
    pub async fn start_ingestion_run(
        &self,
        mode: IngestMode,
        source_path: &str,
    ) -> Result<IngestionRun> {
        let run = IngestionRun::new(mode, source_path.to_string());
        sqlx::query(
            r#"
            INSERT INTO ingestion_runs (id, mode, source_path, started_at, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.mode)
        .bind(&run.source_path)
        .bind(&run.started_at)
        .bind(&run.status)
        .execute(&self.pool)
        .await?;
        Ok(run)
    }

    /// Complete an ingestion run
    pub async fn complete_ingestion_run(
        &self,
        id: &str,
        status: RunStatus,
        counts: RunCounts,
        error: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingestion_runs SET
                completed_at = ?,
                status = ?,
                records_processed = ?,
                records_inserted = ?,
                records_updated = ?,
                error = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status.to_string())
        .bind(counts.processed as i64)
        .bind(counts.inserted as i64)
        .bind(counts.updated as i64)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the most recent ingestion run
    pub async fn get_latest_run(&self) -> Result<Option<IngestionRun>> {
        let run = sqlx::query_as::<_, IngestionRun>(
            "SELECT * FROM ingestion_runs ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    /// List recent ingestion runs, newest first
    pub async fn list_runs(&self, limit: usize) -> Result<Vec<IngestionRun>> {
        let runs = sqlx::query_as::<_, IngestionRun>(
            "SELECT * FROM ingestion_runs ORDER BY started_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }

    // ===== Remote Check Operations =====

    pub async fn get_remote_check(&self, url: &str) -> Result<Option<RemoteCheck>> {
        let check = sqlx::query_as::<_, RemoteCheck>("SELECT * FROM remote_checks WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(check)
    }

    /// Store the metadata of a list that was just imported
    pub async fn save_remote_check(
        &self,
        metadata: &RemoteMetadata,
        header: Option<&ListHeader>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO remote_checks (url, content_length, last_modified, etag, checked_at, list_created_at, list_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                content_length = excluded.content_length,
                last_modified = excluded.last_modified,
                etag = excluded.etag,
                checked_at = excluded.checked_at,
                list_created_at = excluded.list_created_at,
                list_id = excluded.list_id
            "#,
        )
        .bind(&metadata.url)
        .bind(metadata.content_length.and_then(|len| i64::try_from(len).ok()))
        .bind(&metadata.last_modified)
        .bind(&metadata.etag)
        .bind(Utc::now().to_rfc3339())
        .bind(header.and_then(|h| non_empty(&h.created_at_utc)))
        .bind(header.and_then(|h| non_empty(&h.list_id)))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record that `url` was checked without importing anything
    pub async fn touch_remote_check(&self, url: &str) -> Result<()> {
        sqlx::query("UPDATE remote_checks SET checked_at = ? WHERE url = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::setup_test_store;

    #[test]
    fn test_mode_and_status_round_trip() {
        assert_eq!("full".parse::<IngestMode>().unwrap(), IngestMode::Full);
        assert_eq!("DIFF".parse::<IngestMode>().unwrap(), IngestMode::Diff);
        assert!("partial".parse::<IngestMode>().is_err());
        assert_eq!(
            RunStatus::Cancelled.to_string().parse::<RunStatus>().unwrap(),
            RunStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_ingestion_run_lifecycle() {
        let (store, _tmp) = setup_test_store().await;

        let run = store
            .start_ingestion_run(IngestMode::Diff, "/tmp/list.json")
            .await
            .unwrap();
        let latest = store.get_latest_run().await.unwrap().unwrap();
        assert_eq!(latest.id, run.id);
        assert_eq!(latest.get_status().unwrap(), RunStatus::Running);

        store
            .complete_ingestion_run(
                &run.id,
                RunStatus::Failed,
                RunCounts {
                    processed: 10,
                    inserted: 7,
                    updated: 3,
                },
                Some("broken".to_string()),
            )
            .await
            .unwrap();

        let runs = store.list_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].mode, "diff");
        assert_eq!(runs[0].get_status().unwrap(), RunStatus::Failed);
        assert_eq!(runs[0].records_processed, 10);
        assert_eq!(runs[0].records_inserted, 7);
        assert_eq!(runs[0].error.as_deref(), Some("broken"));
        assert!(runs[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_remote_check_save_and_touch() {
        let (store, _tmp) = setup_test_store().await;
        let url = "https://lists.example.com/Filmliste-akt.xz";
        assert!(store.get_remote_check(url).await.unwrap().is_none());

        let metadata = RemoteMetadata {
            url: url.to_string(),
            content_length: Some(1024),
            last_modified: Some("Mon, 01 Jan 2024 10:00:00 GMT".to_string()),
            etag: Some("\"abc\"".to_string()),
        };
        let header = ListHeader {
            created_at_utc: "01.01.2024, 09:00".to_string(),
            list_id: "id-1".to_string(),
            ..Default::default()
        };
        store
            .save_remote_check(&metadata, Some(&header))
            .await
            .unwrap();

        let check = store.get_remote_check(url).await.unwrap().unwrap();
        assert_eq!(check.metadata(), metadata);
        assert_eq!(check.list_id.as_deref(), Some("id-1"));
        assert_eq!(check.list_created_at.as_deref(), Some("01.01.2024, 09:00"));
        let first_checked = check.checked_at().unwrap();

        store.touch_remote_check(url).await.unwrap();
        let touched = store.get_remote_check(url).await.unwrap().unwrap();
        assert!(touched.checked_at().unwrap() >= first_checked);
        assert_eq!(touched.etag, check.etag);
    }
}
