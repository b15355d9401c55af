use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for deciding which URLs belong to the mirror
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    /// Host every crawled URL must be on (None allows any host)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_host: Option<String>,

    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Scope filter shared by the crawler and the rewriters
#[derive(Debug)]
pub struct UrlFilter {
    config: UrlFilterConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Filter that keeps everything on the seed's host
    pub fn same_host(seed: &Url) -> Self {
        Self {
            config: UrlFilterConfig {
                required_host: seed.host_str().map(str::to_string),
                ..UrlFilterConfig::default()
            },
            include_regexes: Vec::new(),
            exclude_regexes: Vec::new(),
        }
    }

    /// Filter that accepts every http(s) URL
    pub fn permissive() -> Self {
        Self {
            config: UrlFilterConfig::default(),
            include_regexes: Vec::new(),
            exclude_regexes: Vec::new(),
        }
    }

    /// Determine if a URL should be mirrored based on all filtering rules
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_host_scope(url) {
            return false;
        }

        // Exclusions take precedence
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|r| r.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|r| r.is_match(url_str))
    }

    /// Check if a URL is on the required host (always true without a restriction)
    pub fn is_in_host_scope(&self, url: &Url) -> bool {
        match &self.config.required_host {
            Some(host) => url
                .host_str()
                .is_some_and(|h| h.eq_ignore_ascii_case(host)),
            None => true,
        }
    }
}

/// Canonical form of a URL used for deduplication and path mapping
///
/// The fragment is dropped. Scheme and host are lowercased and default
/// ports removed by `Url::parse` itself, so only the fragment needs work.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}

/// Visited-set key for a URL
pub fn url_key(url: &Url) -> String {
    normalize_url(url).into()
}

/// Compares hostnames, ignoring case and port
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}
