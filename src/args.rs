use clap::{ArgAction, Parser};
use site_mirror::MirrorConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "site-mirror")]
#[command(about = "Mirrors a website into a local directory for offline browsing")]
#[command(version)]
pub struct Args {
    /// Seed URL to start mirroring from
    #[arg(long, required_unless_present = "config")]
    pub url: Option<String>,

    /// Output directory [default: mirror_output]
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Maximum number of page hops from the seed [default: 2]
    #[arg(long)]
    pub depth: Option<usize>,

    /// Number of concurrent workers [default: 8]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds [default: 20]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Honour robots.txt (true/false) [default: true]
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub respect_robots: Option<bool>,

    /// Only follow links on the seed's host (true/false) [default: true]
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub same_host_only: Option<bool>,

    /// JSON configuration file; explicit flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Applies the flags that were given on top of `config`
    pub fn apply(self, mut config: MirrorConfig) -> MirrorConfig {
        if let Some(url) = self.url {
            config.seed_url = url;
        }
        if let Some(out) = self.out {
            config.output_dir = out;
        }
        if let Some(depth) = self.depth {
            config.max_depth = depth;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        if let Some(respect_robots) = self.respect_robots {
            config.respect_robots = respect_robots;
        }
        if let Some(same_host_only) = self.same_host_only {
            config.same_host_only = same_host_only;
        }
        config
    }
}
