//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::generate::verify_sample_file;
use crate::registry::SiteRegistry;
use serde::Serialize;
use tracing::info;

/// Corpus and configuration status
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub base_dir: String,
    pub registered_sites: usize,
    pub persisted_novels: usize,
    pub quarantined_novels: usize,
    pub organized_novels: usize,
    pub live_checkpoints: usize,
    pub training_samples: usize,
}

fn count_files_with_extension(dir: &std::path::Path, depth: usize, ext: &str) -> usize {
    walkdir::WalkDir::new(dir)
        .min_depth(depth)
        .max_depth(depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file() && e.path().extension().map_or(false, |x| x == ext)
        })
        .count()
}

/// Get corpus status
pub fn cmd_status(config: &Config) -> Result<StatusInfo> {
    info!("Getting status");

    let registry = SiteRegistry::open(&config.paths.registry_file)?;

    let training_samples = verify_sample_file(&config.paths.training_data_file()).unwrap_or(0);

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        base_dir: config.paths.base_dir.display().to_string(),
        registered_sites: registry.list().len(),
        persisted_novels: count_files_with_extension(&config.paths.novels_dir, 4, "json"),
        quarantined_novels: walkdir::WalkDir::new(&config.paths.quarantine_dir)
            .min_depth(4)
            .max_depth(4)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() == "verdict.json")
            .count(),
        organized_novels: count_files_with_extension(&config.paths.processed_dir, 2, "txt"),
        live_checkpoints: count_files_with_extension(&config.paths.checkpoints_dir, 1, "json"),
        training_samples,
    })
}

/// Human-readable status
pub fn print_status(status: &StatusInfo) {
    println!("bookforge status:");
    println!("  Config: {}", status.config_path);
    println!("  Data dir: {}", status.base_dir);
    println!("  Registered sites: {}", status.registered_sites);
    println!("  Persisted novels: {}", status.persisted_novels);
    println!("  Quarantined novels: {}", status.quarantined_novels);
    println!("  Organized novels: {}", status.organized_novels);
    println!("  Live checkpoints: {}", status.live_checkpoints);
    println!("  Training samples: {}", status.training_samples);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_on_empty_base() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();

        let status = cmd_status(&config).unwrap();
        assert_eq!(status.registered_sites, 0);
        assert_eq!(status.persisted_novels, 0);
        assert_eq!(status.training_samples, 0);
    }
}
