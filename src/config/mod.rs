//! Configuration management for kuckmal
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream list locations
    #[serde(default)]
    pub filmlist: FilmlistConfig,

    /// Update check scheduling
    #[serde(default)]
    pub update: UpdateConfig,

    /// Ingestion pipeline tuning
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Query paging limits
    #[serde(default)]
    pub query: QueryConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Upstream broadcast list configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilmlistConfig {
    /// URL of the complete list
    #[serde(default = "default_full_url")]
    pub full_url: String,

    /// URL of the differential list
    #[serde(default = "default_diff_url")]
    pub diff_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Update check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Minimum hours between two remote checks unless forced
    #[serde(default = "default_check_interval_hours")]
    pub check_interval_hours: u64,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per batch handed to the store
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batches buffered between the parser and the merge loop
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default number of results per page
    #[serde(default = "default_query_limit")]
    pub default_limit: usize,

    /// Maximum results per page
    #[serde(default = "default_query_max_limit")]
    pub max_limit: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for kuckmal data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for FilmlistConfig {
    fn default() -> Self {
        Self {
            full_url: default_full_url(),
            diff_url: default_diff_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check_interval_hours: default_check_interval_hours(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_query_limit(),
            max_limit: default_query_max_limit(),
        }
    }
}

impl UpdateConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_hours * 3600)
    }
}

impl Config {
    /// Get the default base directory for kuckmal (~/.kuckmal)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kuckmal")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    fn paths_for(base: PathBuf, config_file: PathBuf) -> PathsConfig {
        PathsConfig {
            config_file,
            db_file: base.join("kuckmal.db"),
            base_dir: base,
        }
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = Self::paths_for(base.clone(), base.join("config.toml"));
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = Self::paths_for(base, config_path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if kuckmal is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Directory used for downloaded and decompressed lists
    pub fn work_dir(&self) -> PathBuf {
        self.paths.base_dir.join("lists")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 || self.ingest.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "ingest.batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }

        if self.ingest.channel_capacity == 0 {
            return Err(Error::Config(
                "ingest.channel_capacity must be positive".to_string(),
            ));
        }

        if self.update.check_interval_hours == 0 {
            return Err(Error::Config(
                "update.check_interval_hours must be positive".to_string(),
            ));
        }

        if self.query.default_limit > self.query.max_limit {
            return Err(Error::Config(
                "query.default_limit must be <= query.max_limit".to_string(),
            ));
        }

        for (name, value) in [
            ("filmlist.full_url", &self.filmlist.full_url),
            ("filmlist.diff_url", &self.filmlist.diff_url),
        ] {
            let parsed = Url::parse(value)
                .map_err(|e| Error::Config(format!("{} is not a valid URL: {}", name, e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(Error::Config(format!("{} must use http or https", name)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ingest.batch_size, 5000);
        assert_eq!(config.update.check_interval_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.ingest.batch_size = 750;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.ingest.batch_size, 750);
        assert_eq!(loaded.paths.db_file, tmp.path().join("kuckmal.db"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[ingest]\nbatch_size = 10\n").unwrap();
        assert_eq!(config.ingest.batch_size, 10);
        assert_eq!(config.ingest.channel_capacity, 4);
        assert_eq!(config.query.max_limit, 10_000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.ingest.batch_size = 0;
        assert!(config.validate().is_err());
        config.ingest.batch_size = 500;
        assert!(config.validate().is_ok());

        config.query.default_limit = config.query.max_limit + 1;
        assert!(config.validate().is_err());
        config.query.default_limit = 10;

        config.filmlist.diff_url = "ftp://example.com/diff.xz".to_string();
        assert!(config.validate().is_err());

        config.filmlist.diff_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
