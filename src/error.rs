//! Custom error types for kuckmal

use crate::ingest::IngestFailure;
use thiserror::Error;

/// Main error type for kuckmal operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Ingestion failed: {0}")]
    Ingest(IngestFailure),

    #[error("An ingestion run is already in progress")]
    RunInProgress,

    #[error("Download error: {0}")]
    Download(String),

    #[error("Decompression error: {0}")]
    Decompress(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not initialized: run 'kuckmal init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<IngestFailure> for Error {
    fn from(failure: IngestFailure) -> Self {
        Error::Ingest(failure)
    }
}

/// Result type alias for kuckmal
pub type Result<T> = std::result::Result<T, Error>;
