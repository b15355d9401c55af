// Re-export modules
pub mod config;
pub mod crawlers;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod pathmap;
pub mod results;
pub mod rewriters;
pub mod robots;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::MirrorConfig;
pub use error::MirrorError;
pub use results::{CrawlOutcome, CrawlStats};
pub use tokio_util::sync::CancellationToken;

use std::path::{Path, PathBuf};
use url::Url;

/// What a discovered URL is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A navigable document: its links are followed and it consumes depth
    Page,
    /// A resource needed to render a page (stylesheet, script, image, media)
    Asset,
}

/// A link found while rewriting a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Absolute URL without fragment
    pub url: Url,
    pub kind: ResourceKind,
}

/// Main builder for mirroring a site
pub struct Mirror {
    config: MirrorConfig,
}

impl Mirror {
    /// Create a new Mirror builder for the given seed URL
    pub fn new(seed_url: &str) -> Self {
        Self {
            config: MirrorConfig::new(seed_url, "mirror_output"),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: MirrorConfig) -> Self {
        Self { config }
    }

    /// Load configuration from a JSON file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, MirrorError> {
        Ok(Self::from_config(MirrorConfig::from_file(path)?))
    }

    /// Set the directory the mirror is written into
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Set how many page hops to follow from the seed
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Set the number of concurrent workers
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the per-request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.config.user_agent = user_agent.to_string();
        self
    }

    /// Enable or disable robots.txt handling
    pub fn with_respect_robots(mut self, respect: bool) -> Self {
        self.config.respect_robots = respect;
        self
    }

    /// Restrict (or not) the crawl to the seed's host
    pub fn with_same_host_only(mut self, same_host: bool) -> Self {
        self.config.same_host_only = same_host;
        self
    }

    /// Only follow URLs matching one of these regex patterns
    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.include_patterns = patterns;
        self
    }

    /// Never follow URLs matching any of these regex patterns
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude_patterns = patterns;
        self
    }

    /// The configuration the run will use
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Run the crawl until the frontier drains or `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> Result<CrawlOutcome, MirrorError> {
        crawlers::web::run(self.config, cancel).await
    }
}
