use crate::error::MirrorError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Run configuration for a mirror crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// URL to start mirroring from (may be supplied on the command line instead)
    #[serde(default)]
    pub seed_url: String,

    /// Directory the mirror is written into (created if absent)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// How many page hops to follow from the seed
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Number of workers fetching in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout for a single HTTP request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether to honour robots.txt
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Whether to stay on the seed's host
    #[serde(default = "default_true")]
    pub same_host_only: bool,

    /// Regex patterns a discovered URL must match (if non-empty)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns that reject a discovered URL
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("mirror_output")
}

fn default_max_depth() -> usize {
    2
}

fn default_concurrency() -> usize {
    8
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    "site-mirror/1.0 (+https://example.local)".to_string()
}

fn default_true() -> bool {
    true
}

impl MirrorConfig {
    /// Create a new configuration with default values
    pub fn new(seed_url: &str, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            output_dir: output_dir.into(),
            max_depth: default_max_depth(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            respect_robots: true,
            same_host_only: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MirrorError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, MirrorError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Per-request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks the configuration and returns the parsed seed URL
    pub fn validate(&self) -> Result<Url, MirrorError> {
        let seed = Url::parse(&self.seed_url).map_err(|e| MirrorError::InvalidSeed {
            url: self.seed_url.clone(),
            reason: e.to_string(),
        })?;

        if seed.scheme() != "http" && seed.scheme() != "https" {
            return Err(MirrorError::UnsupportedScheme(seed.scheme().to_string()));
        }
        if seed.host_str().is_none_or(str::is_empty) {
            return Err(MirrorError::InvalidSeed {
                url: self.seed_url.clone(),
                reason: "missing host".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(MirrorError::InvalidConcurrency);
        }
        if self.timeout_secs == 0 {
            return Err(MirrorError::InvalidTimeout);
        }

        Ok(seed)
    }
}
