use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a mirror run before any crawling starts
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("unsupported scheme '{0}', only http and https can be mirrored")]
    UnsupportedScheme(String),

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("request timeout must be at least 1 second")]
    InvalidTimeout,

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("cannot read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    ConfigJson(#[from] serde_json::Error),
}
