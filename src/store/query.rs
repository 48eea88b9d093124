//! Read side of the media catalog

use super::MediaStore;
use crate::error::Result;
use crate::media::{MediaRecord, NaturalKey};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};

/// A stored record with its row id
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StoredMedia {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: MediaRecord,
}

/// Filter for catalog queries; all set conditions must match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFilter {
    pub channel: Option<String>,
    pub theme: Option<String>,
    /// Only records broadcast at or after this Unix timestamp
    pub min_timestamp: Option<i64>,
    /// Whitespace-separated words; each must occur (case-insensitively)
    /// in the title, theme or description
    pub text: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self {
            channel: None,
            theme: None,
            min_timestamp: None,
            text: None,
            limit: crate::config::default_query_limit(),
            offset: 0,
        }
    }
}

/// One page of query results, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPage {
    pub records: Vec<StoredMedia>,
    /// Number of matches ignoring limit and offset
    pub total: u64,
}

/// One page of distinct names, sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePage {
    pub names: Vec<String>,
    /// Number of distinct names ignoring limit and offset
    pub total: u64,
}

/// Catalog-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total: u64,
    pub channels: u64,
    pub themes: u64,
    pub new_entries: u64,
    pub latest_timestamp: Option<i64>,
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &MediaFilter) {
    let mut separator = " WHERE ";

    if let Some(channel) = &filter.channel {
        builder.push(separator).push("channel = ").push_bind(channel.clone());
        separator = " AND ";
    }
    if let Some(theme) = &filter.theme {
        builder.push(separator).push("theme = ").push_bind(theme.clone());
        separator = " AND ";
    }
    if let Some(min) = filter.min_timestamp {
        builder.push(separator).push("timestamp >= ").push_bind(min);
        separator = " AND ";
    }
    // Every word must appear somewhere, in any order
    for word in filter.text.iter().flat_map(|text| text.split_whitespace()) {
        let pattern = format!("%{}%", escape_like(word));
        builder
            .push(separator)
            .push("(title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR theme LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
        separator = " AND ";
    }
}

impl MediaStore {
    /// Run a filtered, paged query ordered by timestamp, newest first.
    /// The limit is clamped to the configured maximum.
    pub async fn query(&self, filter: &MediaFilter) -> Result<MediaPage> {
        let limit = filter.limit.min(self.max_limit);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM media_entries");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM media_entries");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);
        let records = select
            .build_query_as::<StoredMedia>()
            .fetch_all(&self.pool)
            .await?;

        Ok(MediaPage {
            records,
            total: total.max(0) as u64,
        })
    }

    /// Look up a single record by its natural key
    pub async fn get(&self, key: &NaturalKey) -> Result<Option<StoredMedia>> {
        let media = sqlx::query_as::<_, StoredMedia>(
            "SELECT * FROM media_entries WHERE channel = ? AND theme = ? AND title = ?",
        )
        .bind(&key.channel)
        .bind(&key.theme)
        .bind(&key.title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(media)
    }

    /// Records broadcast at or after `since`, newest first
    pub async fn recent(&self, since: i64, limit: usize) -> Result<Vec<StoredMedia>> {
        let filter = MediaFilter {
            min_timestamp: Some(since),
            limit,
            ..Default::default()
        };
        Ok(self.query(&filter).await?.records)
    }

    /// Distinct channel names, sorted
    pub async fn channels(&self) -> Result<Vec<String>> {
        let channels =
            sqlx::query_scalar("SELECT DISTINCT channel FROM media_entries ORDER BY channel")
                .fetch_all(&self.pool)
                .await?;
        Ok(channels)
    }

    /// Distinct themes of the records matching `filter`, sorted and paged
    pub async fn themes(&self, filter: &MediaFilter) -> Result<NamePage> {
        let limit = filter.limit.min(self.max_limit);

        let mut count =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(DISTINCT theme) FROM media_entries");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT DISTINCT theme FROM media_entries");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY theme LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(filter.offset as i64);
        let names = select
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        Ok(NamePage {
            names,
            total: total.max(0) as u64,
        })
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM media_entries)")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists == 0)
    }

    /// Get catalog statistics
    pub async fn stats(&self) -> Result<CatalogStats> {
        let (total, channels, themes, new_entries, latest_timestamp): (
            i64,
            i64,
            i64,
            i64,
            Option<i64>,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(DISTINCT channel),
                COUNT(DISTINCT channel || char(31) || theme),
                COALESCE(SUM(is_new), 0),
                MAX(timestamp)
            FROM media_entries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogStats {
            total: total.max(0) as u64,
            channels: channels.max(0) as u64,
            themes: themes.max(0) as u64,
            new_entries: new_entries.max(0) as u64,
            latest_timestamp,
        })
    }
}
