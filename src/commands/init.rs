//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Initialize bookforge configuration and data directories
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let base = base_dir.unwrap_or_else(Config::default_base_dir);
    let config = Config::load_from(Some(base.clone()))?;

    if config.paths.config_file.exists() && !force {
        return Err(Error::AlreadyInitialized(
            config.paths.config_file.display().to_string(),
        ));
    }

    let fresh = {
        let mut c = Config::default();
        c.paths = config.paths.clone();
        c
    };
    fresh.save()?;

    for dir in [
        &fresh.paths.novels_dir,
        &fresh.paths.processed_dir,
        &fresh.paths.quarantine_dir,
        &fresh.paths.checkpoints_dir,
    ] {
        std::fs::create_dir_all(dir)?;
    }

    info!("Initialized bookforge at {:?}", base);
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let config = cmd_init(Some(tmp.path().to_path_buf()), false).await.unwrap();

        assert!(config.paths.config_file.exists());
        assert!(config.paths.novels_dir.exists());
        assert!(config.paths.quarantine_dir.exists());
    }

    #[tokio::test]
    async fn test_init_refuses_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        cmd_init(Some(tmp.path().to_path_buf()), false).await.unwrap();

        let err = cmd_init(Some(tmp.path().to_path_buf()), false).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized(_)));

        cmd_init(Some(tmp.path().to_path_buf()), true).await.unwrap();
    }
}
