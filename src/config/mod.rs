//! Configuration management for bookforge
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Crawl engine configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Anti-bot detection configuration
    #[serde(default)]
    pub antibot: AntiBotConfig,

    /// Content validation configuration
    #[serde(default)]
    pub validate: ValidateConfig,

    /// Training-data generation configuration
    #[serde(default)]
    pub generate: GenerateConfig,

    /// External trainer configuration
    #[serde(default)]
    pub trainer: TrainerConfig,

    /// Paths configuration (internal, derived from the base directory)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Crawl engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Minimum spacing between requests to the same site (ms)
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Maximum retries per fetch before aborting the novel
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Base retry wait (seconds); doubles per attempt
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,

    /// Cap on the retry wait (seconds)
    #[serde(default = "default_retry_max_secs")]
    pub retry_max_secs: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Number of sites crawled concurrently
    #[serde(default = "default_max_concurrent_sites")]
    pub max_concurrent_sites: usize,

    /// Global requests-per-second ceiling across all sites
    #[serde(default = "default_global_requests_per_second")]
    pub global_requests_per_second: u32,

    /// Site cooldown after anti-bot detection (seconds)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Raise the per-site delay after repeated server errors
    #[serde(default = "default_adaptive_delay")]
    pub adaptive_delay: bool,

    /// Delay increment applied per error-threshold crossing (ms)
    #[serde(default = "default_delay_increment_ms")]
    pub delay_increment_ms: u64,

    /// Ceiling for the adaptive per-site delay (ms)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive server errors that trigger a delay increase
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,

    /// Only crawl novels marked as completed
    #[serde(default = "default_filter_completed")]
    pub filter_completed: bool,

    /// Minimum characters for extracted chapter content
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

/// Anti-bot detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiBotConfig {
    /// Substrings identifying known block pages
    #[serde(default = "default_fingerprints")]
    pub fingerprints: Vec<String>,

    /// Content shorter than this fraction of the site's average chapter
    /// length is treated as a swapped-in block page
    #[serde(default = "default_min_length_ratio")]
    pub min_length_ratio: f64,
}

/// Content validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfig {
    /// Minimum characters for a chapter to count as valid
    #[serde(default = "default_min_content_chars")]
    pub min_chapter_chars: usize,

    /// Minimum total characters across all chapters
    #[serde(default = "default_min_total_chars")]
    pub min_total_chars: usize,

    /// Minimum ratio of CJK characters to total characters
    #[serde(default = "default_min_cjk_ratio")]
    pub min_cjk_ratio: f64,

    /// Minimum ratio of valid chapters to total chapters
    #[serde(default = "default_min_valid_chapter_ratio")]
    pub min_valid_chapter_ratio: f64,
}

/// Training-data generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Minimum chunk length (chars)
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,

    /// Maximum chunk length (chars)
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Overlap between consecutive chunks (chars)
    #[serde(default = "default_chunk_overlap")]
    pub overlap_chars: usize,

    /// Hard floor below which a trailing chunk is dropped (chars)
    #[serde(default = "default_chunk_floor_chars")]
    pub chunk_floor_chars: usize,

    /// Maximum context attached to a chunk (chars)
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Maximum samples contributed by one novel
    #[serde(default = "default_per_novel_cap")]
    pub per_novel_cap: usize,

    /// Maximum samples in the whole corpus
    #[serde(default = "default_global_cap")]
    pub global_cap: usize,
}

/// External trainer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Command invoked as `<command> <samples_file> <model_dir>`; when unset
    /// the train stage is reported as skipped
    #[serde(default)]
    pub command: Option<String>,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for bookforge data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Registered-sites store
    pub registry_file: PathBuf,

    /// Crawled novel tree (site/category/novel)
    pub novels_dir: PathBuf,

    /// Organized tree (category/novel.txt)
    pub processed_dir: PathBuf,

    /// Validation-failed novels, kept for inspection
    pub quarantine_dir: PathBuf,

    /// Per-novel crawl checkpoints
    pub checkpoints_dir: PathBuf,

    /// Trained model artifacts
    pub model_dir: PathBuf,
}

impl PathsConfig {
    fn from_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.toml"),
            registry_file: base.join("sites.json"),
            novels_dir: base.join("novels"),
            processed_dir: base.join("processed"),
            quarantine_dir: base.join("quarantine"),
            checkpoints_dir: base.join("checkpoints"),
            model_dir: base.join("model"),
            base_dir: base,
        }
    }

    /// Path of the generated training-sample file
    pub fn training_data_file(&self) -> PathBuf {
        self.processed_dir.join("training_data.txt")
    }

    /// Path of the generation stats sidecar
    pub fn training_stats_file(&self) -> PathBuf {
        self.processed_dir.join("training_stats.json")
    }

    /// Path of the crawl batch summary
    pub fn crawl_summary_file(&self) -> PathBuf {
        self.novels_dir.join("summary.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig::default(),
            antibot: AntiBotConfig::default(),
            validate: ValidateConfig::default(),
            generate: GenerateConfig::default(),
            trainer: TrainerConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            politeness_delay_ms: default_politeness_delay_ms(),
            max_retries: default_max_retries(),
            timeout_secs: default_request_timeout_secs(),
            retry_base_secs: default_retry_base_secs(),
            retry_max_secs: default_retry_max_secs(),
            user_agent: default_user_agent(),
            max_concurrent_sites: default_max_concurrent_sites(),
            global_requests_per_second: default_global_requests_per_second(),
            cooldown_secs: default_cooldown_secs(),
            adaptive_delay: default_adaptive_delay(),
            delay_increment_ms: default_delay_increment_ms(),
            max_delay_ms: default_max_delay_ms(),
            error_threshold: default_error_threshold(),
            filter_completed: default_filter_completed(),
            min_content_chars: default_min_content_chars(),
        }
    }
}

impl Default for AntiBotConfig {
    fn default() -> Self {
        Self {
            fingerprints: default_fingerprints(),
            min_length_ratio: default_min_length_ratio(),
        }
    }
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            min_chapter_chars: default_min_content_chars(),
            min_total_chars: default_min_total_chars(),
            min_cjk_ratio: default_min_cjk_ratio(),
            min_valid_chapter_ratio: default_min_valid_chapter_ratio(),
        }
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: default_min_chunk_chars(),
            max_chunk_chars: default_max_chunk_chars(),
            overlap_chars: default_chunk_overlap(),
            chunk_floor_chars: default_chunk_floor_chars(),
            context_window: default_context_window(),
            per_novel_cap: default_per_novel_cap(),
            global_cap: default_global_cap(),
        }
    }
}

impl Config {
    /// Get the default base directory for bookforge (~/.bookforge)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bookforge")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
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
        config.paths = PathsConfig::from_base(base);
        config.paths.config_file = config_path.to_path_buf();

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to
    /// defaults when no config file exists there
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        let mut config = Config::default();
        config.paths = PathsConfig::from_base(base);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
            config.validate()?;
        } else {
            debug!("No config file found, using defaults");
        }

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

    /// Check if bookforge is initialized (config file exists)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.generate.max_chunk_chars < self.generate.min_chunk_chars {
            return Err(Error::Config(
                "generate.max_chunk_chars must be >= generate.min_chunk_chars".to_string(),
            ));
        }

        if self.generate.overlap_chars >= self.generate.max_chunk_chars {
            return Err(Error::Config(
                "generate.overlap_chars must be < generate.max_chunk_chars".to_string(),
            ));
        }

        if self.generate.chunk_floor_chars > self.generate.min_chunk_chars {
            return Err(Error::Config(
                "generate.chunk_floor_chars must be <= generate.min_chunk_chars".to_string(),
            ));
        }

        if self.generate.per_novel_cap == 0 || self.generate.global_cap == 0 {
            return Err(Error::Config(
                "generate sample caps must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.validate.min_cjk_ratio) {
            return Err(Error::Config(
                "validate.min_cjk_ratio must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.validate.min_valid_chapter_ratio) {
            return Err(Error::Config(
                "validate.min_valid_chapter_ratio must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.antibot.min_length_ratio) {
            return Err(Error::Config(
                "antibot.min_length_ratio must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.crawl.politeness_delay_ms == 0 {
            return Err(Error::Config(
                "crawl.politeness_delay_ms must be positive".to_string(),
            ));
        }

        if self.crawl.max_concurrent_sites == 0 {
            return Err(Error::Config(
                "crawl.max_concurrent_sites must be positive".to_string(),
            ));
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
        assert_eq!(config.generate.min_chunk_chars, 300);
        assert_eq!(config.generate.max_chunk_chars, 3000);
        assert_eq!(config.crawl.max_retries, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths = PathsConfig::from_base(tmp.path().to_path_buf());
        config.crawl.politeness_delay_ms = 2500;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.crawl.politeness_delay_ms, 2500);
        assert_eq!(loaded.paths.novels_dir, tmp.path().join("novels"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Invalid: overlap >= max
        config.generate.overlap_chars = config.generate.max_chunk_chars;
        assert!(config.validate().is_err());

        // Fix it
        config.generate.overlap_chars = 200;
        assert!(config.validate().is_ok());

        // Invalid: min > max
        config.generate.min_chunk_chars = config.generate.max_chunk_chars + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_ratios() {
        let mut config = Config::default();
        config.validate.min_cjk_ratio = 1.5;
        assert!(config.validate().is_err());

        config.validate.min_cjk_ratio = 0.5;
        config.antibot.min_length_ratio = -0.1;
        assert!(config.validate().is_err());
    }
}
