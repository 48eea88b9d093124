//! Media records and the positional record decoder
//!
//! A broadcast list encodes each entry as an array of at least 20 strings.
//! Channel and theme are inherited from the previous entry when empty, so
//! decoding is stateful: every parse owns exactly one [`Carry`].

mod url;

pub use self::url::*;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Field positions inside a raw record array
pub mod field {
    pub const CHANNEL: usize = 0;
    pub const THEME: usize = 1;
    pub const TITLE: usize = 2;
    pub const DATE: usize = 3;
    pub const TIME: usize = 4;
    pub const DURATION: usize = 5;
    pub const SIZE_MB: usize = 6;
    pub const DESCRIPTION: usize = 7;
    pub const URL: usize = 8;
    pub const WEBSITE: usize = 9;
    pub const SUBTITLE_URL: usize = 10;
    pub const SMALL_URL: usize = 12;
    pub const HD_URL: usize = 14;
    pub const TIMESTAMP: usize = 16;
    pub const GEO: usize = 18;
    pub const IS_NEW: usize = 19;

    /// Number of positions a complete record carries
    pub const COUNT: usize = 20;
}

/// Identity of a media record: unique per store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub channel: String,
    pub theme: String,
    pub title: String,
}

impl NaturalKey {
    pub fn new(
        channel: impl Into<String>,
        theme: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            theme: theme.into(),
            title: title.into(),
        }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.channel, self.theme, self.title)
    }
}

/// One broadcast item
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub channel: String,
    pub theme: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub duration: String,
    pub size_mb: String,
    pub description: String,
    pub url: String,
    pub website: String,
    pub subtitle_url: String,
    pub small_url: String,
    pub hd_url: String,
    pub timestamp: i64,
    pub geo: String,
    pub is_new: bool,
}

impl MediaRecord {
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(&self.channel, &self.theme, &self.title)
    }

    /// Copy of this record with compact small/HD URLs expanded against the main URL
    pub fn resolved(&self) -> MediaRecord {
        let mut resolved = self.clone();
        if !self.small_url.is_empty() {
            resolved.small_url = expand_url(&self.small_url, &self.url);
        }
        if !self.hd_url.is_empty() {
            resolved.hd_url = expand_url(&self.hd_url, &self.url);
        }
        resolved
    }

    /// Best playable URL: HD, then normal, then small
    pub fn best_quality_url(&self) -> String {
        let resolved = self.resolved();
        [resolved.hd_url, normalize_protocol(&resolved.url), resolved.small_url]
            .into_iter()
            .find(|u| !u.is_empty())
            .unwrap_or_default()
    }

    /// Re-encode as a raw field array. Legacy slots are emitted empty and
    /// channel/theme are always written out in full.
    pub fn to_raw_fields(&self) -> Vec<String> {
        let mut fields = vec![String::new(); field::COUNT];
        fields[field::CHANNEL] = self.channel.clone();
        fields[field::THEME] = self.theme.clone();
        fields[field::TITLE] = self.title.clone();
        fields[field::DATE] = self.date.clone();
        fields[field::TIME] = self.time.clone();
        fields[field::DURATION] = self.duration.clone();
        fields[field::SIZE_MB] = self.size_mb.clone();
        fields[field::DESCRIPTION] = self.description.clone();
        fields[field::URL] = self.url.clone();
        fields[field::WEBSITE] = self.website.clone();
        fields[field::SUBTITLE_URL] = self.subtitle_url.clone();
        fields[field::SMALL_URL] = self.small_url.clone();
        fields[field::HD_URL] = self.hd_url.clone();
        fields[field::TIMESTAMP] = self.timestamp.to_string();
        fields[field::GEO] = self.geo.clone();
        fields[field::IS_NEW] = self.is_new.to_string();
        fields
    }
}

/// Channel and theme carried forward between consecutive records of one parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Carry {
    pub channel: String,
    pub theme: String,
}

impl Carry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn field_at(fields: &[String], index: usize) -> &str {
    fields.get(index).map(String::as_str).unwrap_or("")
}

fn inherit(value: &str, carried: &mut String) -> String {
    if !value.is_empty() {
        carried.clear();
        carried.push_str(value);
    }
    carried.clone()
}

fn parse_timestamp(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Decode one raw field array. Never fails: short rows read as empty
/// strings, unparsable timestamps as 0 and anything but "true" as false.
pub fn decode(fields: &[String], carry: &mut Carry) -> MediaRecord {
    let channel = inherit(field_at(fields, field::CHANNEL), &mut carry.channel);
    let theme = inherit(field_at(fields, field::THEME), &mut carry.theme);
    let text = |index| field_at(fields, index).to_string();

    MediaRecord {
        channel,
        theme,
        title: text(field::TITLE),
        date: text(field::DATE),
        time: text(field::TIME),
        duration: text(field::DURATION),
        size_mb: text(field::SIZE_MB),
        description: text(field::DESCRIPTION),
        url: text(field::URL),
        website: text(field::WEBSITE),
        subtitle_url: text(field::SUBTITLE_URL),
        small_url: text(field::SMALL_URL),
        hd_url: text(field::HD_URL),
        timestamp: parse_timestamp(field_at(fields, field::TIMESTAMP)),
        geo: text(field::GEO),
        is_new: parse_flag(field_at(fields, field::IS_NEW)),
    }
}
