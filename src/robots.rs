//! Minimal robots.txt support.
//!
//! Only the `User-agent: *` section is honoured. Matching is a
//! case-insensitive longest-prefix match over the URL path where `Allow` wins
//! ties at equal length; anything unmatched is allowed.

use crate::fetch::FetchClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

/// Cap for robots.txt bodies (1 MiB)
const ROBOTS_MAX_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RobotRule {
    allow: bool,
    /// Lowercased path prefix
    prefix: String,
}

/// Parsed rules for one host
#[derive(Debug, Clone, Default)]
pub struct RobotsHostRules {
    /// Whether a robots.txt was actually fetched and parsed
    pub loaded: bool,
    rules: Vec<RobotRule>,
}

impl RobotsHostRules {
    /// Rules for a host without a usable robots.txt
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses the `User-agent: *` rules out of a robots.txt body
    pub fn parse(body: &str) -> Self {
        let mut rules = Vec::new();
        let mut in_star_section = false;

        for line in body.lines() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => in_star_section = value == "*",
                "allow" | "disallow" if in_star_section => {
                    // An empty value restricts nothing
                    if !value.is_empty() {
                        rules.push(RobotRule {
                            allow: key.trim().eq_ignore_ascii_case("allow"),
                            prefix: value.to_lowercase(),
                        });
                    }
                }
                _ => {}
            }
        }

        Self {
            loaded: true,
            rules,
        }
    }

    /// Whether `path` may be fetched under these rules
    pub fn is_allowed(&self, path: &str) -> bool {
        let target = path.to_lowercase();

        let mut best: Option<&RobotRule> = None;
        for rule in self.rules.iter().filter(|r| target.starts_with(&r.prefix)) {
            best = match best {
                Some(current)
                    if current.prefix.len() > rule.prefix.len()
                        || (current.prefix.len() == rule.prefix.len() && current.allow) =>
                {
                    Some(current)
                }
                _ => Some(rule),
            };
        }

        best.is_none_or(|rule| rule.allow)
    }
}

/// Per-host robots.txt cache for the lifetime of a run
pub struct RobotsPolicy {
    client: FetchClient,
    cache: Mutex<HashMap<String, Arc<RobotsHostRules>>>,
}

impl RobotsPolicy {
    pub fn new(client: FetchClient) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Checks a URL against its host's robots.txt, fetching it on first use
    pub async fn allowed(&self, url: &Url) -> bool {
        let host = host_key(url);

        let cached = self.lookup(&host);
        let rules = match cached {
            Some(rules) => rules,
            None => {
                // Fetched without holding the lock; if two workers race on a
                // new host the first stored result wins.
                let fresh = Arc::new(self.load(url).await);
                let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
                Arc::clone(cache.entry(host).or_insert(fresh))
            }
        };

        rules.is_allowed(url.path())
    }

    fn lookup(&self, host: &str) -> Option<Arc<RobotsHostRules>> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(host).cloned()
    }

    async fn load(&self, url: &Url) -> RobotsHostRules {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        match self.client.get_text(&robots_url, ROBOTS_MAX_BYTES).await {
            Ok(result) if !result.body.is_empty() => {
                ::log::debug!("Loaded {}", robots_url);
                RobotsHostRules::parse(&String::from_utf8_lossy(&result.body))
            }
            Ok(_) => {
                ::log::debug!("Empty {}, allowing everything", robots_url);
                RobotsHostRules::allow_all()
            }
            Err(e) => {
                ::log::debug!("No usable {} ({}), allowing everything", robots_url, e);
                RobotsHostRules::allow_all()
            }
        }
    }
}

/// Cache key: lowercased host plus any non-default port
fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}
