use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters describing a finished (or cancelled) run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// HTML documents written
    pub pages_saved: usize,
    /// Stylesheets and binary assets written
    pub assets_saved: usize,
    /// Tasks dropped because of a transport, status or write error
    pub failed: usize,
    /// Tasks skipped because robots.txt disallowed them
    pub robots_skipped: usize,
    /// Tasks skipped because they left the seed's host
    pub out_of_scope: usize,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlOutcome {
    /// The frontier drained
    Completed(CrawlStats),
    /// Cancellation was requested before the frontier drained
    Cancelled(CrawlStats),
}

impl CrawlOutcome {
    pub fn stats(&self) -> &CrawlStats {
        match self {
            CrawlOutcome::Completed(stats) | CrawlOutcome::Cancelled(stats) => stats,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CrawlOutcome::Cancelled(_))
    }
}

/// Counters updated concurrently by the workers
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub pages_saved: AtomicUsize,
    pub assets_saved: AtomicUsize,
    pub failed: AtomicUsize,
    pub robots_skipped: AtomicUsize,
    pub out_of_scope: AtomicUsize,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CrawlStats {
        CrawlStats {
            pages_saved: self.pages_saved.load(Ordering::Relaxed),
            assets_saved: self.assets_saved.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            robots_skipped: self.robots_skipped.load(Ordering::Relaxed),
            out_of_scope: self.out_of_scope.load(Ordering::Relaxed),
        }
    }
}
