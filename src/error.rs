//! Custom error types for bookforge

use thiserror::Error;

/// Main error type for bookforge operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Page not found (404): {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Extracted content too short ({length} chars, expected at least {min}): {url}")]
    EmptyContent {
        url: String,
        length: usize,
        min: usize,
    },

    #[error("Anti-bot page detected: {0}")]
    AntiBot(String),

    #[error("Unknown site: {0} (register it first)")]
    UnknownSite(String),

    #[error("Site not crawlable: {0}")]
    NotCrawlable(String),

    #[error("Stage precondition failed: {0}")]
    Precondition(String),

    #[error("Pipeline verification failed: {0}")]
    Verification(String),

    #[error("Trainer error: {0}")]
    Trainer(String),

    #[error("Generation produced no samples from {0}")]
    NoSamples(String),

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

    #[error("Not initialized: run 'bookforge init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for bookforge
pub type Result<T> = std::result::Result<T, Error>;
