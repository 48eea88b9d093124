//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::MediaStore;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Where `init` put things
#[derive(Debug, Clone, Serialize)]
pub struct InitStats {
    pub base_dir: PathBuf,
    pub config_file: PathBuf,
    pub db_file: PathBuf,
}

/// Write a default configuration and create the catalog database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitStats> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.validate()?;
    config.save()?;
    info!("Created config at {:?}", config.paths.config_file);

    let store = MediaStore::connect(&config).await?;
    store.close().await;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(InitStats {
        base_dir: config.paths.base_dir,
        config_file: config.paths.config_file,
        db_file: config.paths.db_file,
    })
}

/// Print init result to console
pub fn print_init_stats(stats: &InitStats) {
    println!("✓ Initialized kuckmal at {:?}", stats.base_dir);
    println!("\nConfiguration: {:?}", stats.config_file);
    println!("Database: {:?}", stats.db_file);
    println!("\nNext steps:");
    println!("  kuckmal update                  # Download the full list");
    println!("  kuckmal import ./Filmliste.xz   # Or import a local list");
    println!("  kuckmal search tatort           # Search the catalog");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("home");

        let stats = cmd_init(Some(base.clone()), false).await.unwrap();
        assert!(stats.config_file.exists());
        assert!(stats.db_file.exists());

        let config = Config::load(&stats.config_file).unwrap();
        assert!(config.is_initialized());
        assert_eq!(config.paths.base_dir, base);
    }

    #[tokio::test]
    async fn test_init_refuses_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_path_buf();

        cmd_init(Some(base.clone()), false).await.unwrap();
        let err = cmd_init(Some(base.clone()), false).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        cmd_init(Some(base), true).await.unwrap();
    }
}
