use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::fetch::{FetchClient, FetchError};
use crate::filter::{UrlFilter, UrlFilterConfig, normalize_url, same_host, url_key};
use crate::pathmap::local_path;
use crate::results::{CrawlOutcome, StatsCounters};
use crate::rewriters::css::rewrite_css;
use crate::rewriters::html::rewrite_html;
use crate::rewriters::{ContentKind, Rewritten, charset_from_content_type};
use crate::robots::RobotsPolicy;
use crate::{DiscoveredLink, ResourceKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Frontier buffer size per worker
const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// A URL waiting to be mirrored
#[derive(Debug, Clone)]
pub struct Task {
    pub url: Url,
    /// Page hops still allowed below this task
    pub depth_left: usize,
    pub kind: ResourceKind,
    /// Document the URL was found in (diagnostics only)
    pub from: Option<Url>,
}

/// Depth budget of a link found in a document with `parent` budget left
///
/// Pages cost one level, assets are free. None means the budget would go
/// negative and the link must not be scheduled.
pub fn child_depth(parent: usize, kind: ResourceKind) -> Option<usize> {
    match kind {
        ResourceKind::Page => parent.checked_sub(1),
        ResourceKind::Asset => Some(parent),
    }
}

/// Errors that end a single task
#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// State shared by every worker of one run
struct CrawlState {
    seed: Url,
    output_dir: PathBuf,
    respect_robots: bool,
    same_host_only: bool,
    scope: UrlFilter,
    client: FetchClient,
    robots: RobotsPolicy,
    visited: StdMutex<HashSet<String>>,
    /// Tasks queued, being queued, or being processed
    pending: AtomicUsize,
    /// Dropped once `pending` reaches zero, which closes the queue
    queue_tx: StdMutex<Option<mpsc::Sender<Task>>>,
    stats: StatsCounters,
    cancel: CancellationToken,
}

/// Mirrors a site according to `config`
///
/// Only configuration problems are returned as errors; failures of single
/// tasks are logged and the crawl carries on.
pub async fn run(
    config: MirrorConfig,
    cancel: CancellationToken,
) -> Result<CrawlOutcome, MirrorError> {
    let seed = normalize_url(&config.validate()?);
    let scope = create_url_filter(&seed, &config)?;
    let client = FetchClient::new(config.timeout(), &config.user_agent)?;

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| MirrorError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;

    let (queue_tx, queue_rx) =
        mpsc::channel::<Task>(config.concurrency * QUEUE_SLOTS_PER_WORKER);

    ::log::info!(
        "Mirroring {} into {} (depth {}, {} workers)",
        seed,
        config.output_dir.display(),
        config.max_depth,
        config.concurrency
    );

    let state = Arc::new(CrawlState {
        seed: seed.clone(),
        output_dir: config.output_dir.clone(),
        respect_robots: config.respect_robots,
        same_host_only: config.same_host_only,
        scope,
        robots: RobotsPolicy::new(client.clone()),
        client,
        visited: StdMutex::new(HashSet::new()),
        pending: AtomicUsize::new(0),
        queue_tx: StdMutex::new(Some(queue_tx)),
        stats: StatsCounters::default(),
        cancel: cancel.clone(),
    });

    state.mark_visited(&seed);
    state.enqueue(Task {
        url: seed,
        depth_left: config.max_depth,
        kind: ResourceKind::Page,
        from: None,
    });

    let queue_rx = Arc::new(Mutex::new(queue_rx));
    let workers: Vec<_> = (0..config.concurrency)
        .map(|worker_id| {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&state),
                Arc::clone(&queue_rx),
            ))
        })
        .collect();

    for handle in workers {
        if let Err(e) = handle.await {
            ::log::error!("Worker task failed: {}", e);
        }
    }

    // After a cancellation the queue may still be open; close it so blocked
    // producers give up.
    state.close_queue();

    let stats = state.stats.snapshot();
    if cancel.is_cancelled() {
        ::log::info!("Mirror cancelled: {:?}", stats);
        Ok(CrawlOutcome::Cancelled(stats))
    } else {
        ::log::info!("Mirror complete: {:?}", stats);
        Ok(CrawlOutcome::Completed(stats))
    }
}

/// Creates the scope filter from the seed and the configured patterns
fn create_url_filter(seed: &Url, config: &MirrorConfig) -> Result<UrlFilter, regex::Error> {
    UrlFilter::new(UrlFilterConfig {
        required_host: if config.same_host_only {
            seed.host_str().map(str::to_string)
        } else {
            None
        },
        include_patterns: config.include_patterns.clone(),
        exclude_patterns: config.exclude_patterns.clone(),
    })
}

/// Pulls tasks until the queue closes or cancellation is observed
async fn worker_loop(
    worker_id: usize,
    state: Arc<CrawlState>,
    queue_rx: Arc<Mutex<mpsc::Receiver<Task>>>,
) {
    ::log::trace!("Worker {} started", worker_id);

    while let Some(task) = next_task(worker_id, &state.cancel, &queue_rx).await {
        state.process(worker_id, task).await;
        state.finish_task();
    }

    ::log::trace!("Worker {} shutting down", worker_id);
}

/// Gets the next task, or None once the queue is closed or the run is cancelled
async fn next_task(
    worker_id: usize,
    cancel: &CancellationToken,
    queue_rx: &Arc<Mutex<mpsc::Receiver<Task>>>,
) -> Option<Task> {
    if cancel.is_cancelled() {
        return None;
    }

    let mut rx = queue_rx.lock().await;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            ::log::debug!("Worker {} observed cancellation", worker_id);
            None
        }
        task = rx.recv() => task,
    }
}

impl CrawlState {
    /// Records a URL as visited; false if it already was
    fn mark_visited(&self, url: &Url) -> bool {
        let mut visited = self.visited.lock().unwrap_or_else(PoisonError::into_inner);
        visited.insert(url_key(url))
    }

    /// Hands a task to a producer that waits for room in the queue
    fn enqueue(self: &Arc<Self>, task: Task) {
        let sender = self
            .queue_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            ::log::debug!("Queue closed, dropping {}", task.url);
            return;
        };

        self.pending.fetch_add(1, Ordering::AcqRel);
        let state = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                sent = sender.send(task) => {
                    if sent.is_err() {
                        state.finish_task();
                    }
                }
                _ = state.cancel.cancelled() => state.finish_task(),
            }
        });
    }

    /// Marks one task as done; the last one closes the queue
    fn finish_task(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            ::log::debug!("Frontier drained");
            self.close_queue();
        }
    }

    fn close_queue(&self) {
        self.queue_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Runs one task, logging (not propagating) its failure
    async fn process(self: &Arc<Self>, worker_id: usize, task: Task) {
        if let Err(e) = self.handle(&task).await {
            StatsCounters::bump(&self.stats.failed);
            let level = match e {
                TaskError::Write { .. } => ::log::Level::Error,
                _ => ::log::Level::Warn,
            };
            match &task.from {
                Some(from) => ::log::log!(
                    level,
                    "[worker {}] Failed {} (linked from {}): {}",
                    worker_id,
                    task.url,
                    from,
                    e
                ),
                None => ::log::log!(level, "[worker {}] Failed {}: {}", worker_id, task.url, e),
            }
        }
    }

    async fn handle(self: &Arc<Self>, task: &Task) -> Result<(), TaskError> {
        if self.respect_robots && !self.robots.allowed(&task.url).await {
            ::log::debug!("robots.txt disallows {}", task.url);
            StatsCounters::bump(&self.stats.robots_skipped);
            return Ok(());
        }

        if self.same_host_only && !same_host(&self.seed, &task.url) {
            ::log::debug!("Skipping off-host {}", task.url);
            StatsCounters::bump(&self.stats.out_of_scope);
            return Ok(());
        }

        let response = self.client.get(&task.url).await?;
        if response.status >= 400 {
            return Err(TaskError::Status(response.status));
        }

        // The redirect target decides where the document lives
        let url = normalize_url(&response.final_url);
        if url != task.url {
            ::log::debug!("{} redirected to {}", task.url, url);
            // Another task already owns the target's file
            if !self.mark_visited(&url) {
                ::log::debug!("Redirect target {} already handled, skipping", url);
                return Ok(());
            }
        }

        let relative = local_path(&url);
        let target = self.output_dir.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| TaskError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let content = ContentKind::classify(&response.content_type, &url, task.kind);
        let charset = charset_from_content_type(&response.content_type);
        let rewritten = match content {
            ContentKind::Html => Some(rewrite_html(
                &url,
                &relative,
                &response.body,
                charset,
                &self.scope,
            )),
            ContentKind::Css => Some(rewrite_css(
                &url,
                &relative,
                &response.body,
                charset,
                &self.scope,
            )),
            ContentKind::Binary => None,
        };

        let links = match rewritten {
            Some(Ok(Rewritten { body, links })) => {
                write_file(&target, &body).await?;
                links
            }
            Some(Err(e)) => {
                // Keep the original bytes but follow nothing from them
                write_file(&target, &response.body).await?;
                ::log::warn!("Saved {} without rewriting: {}", url, e);
                Vec::new()
            }
            None => {
                write_file(&target, &response.body).await?;
                Vec::new()
            }
        };

        if content == ContentKind::Html {
            StatsCounters::bump(&self.stats.pages_saved);
        } else {
            StatsCounters::bump(&self.stats.assets_saved);
        }
        ::log::info!("Saved {} -> {}", url, relative.display());

        for link in links {
            self.enqueue_if_new(link, task, &url);
        }
        Ok(())
    }

    /// Schedules a discovered link unless it is out of budget, out of scope or seen
    fn enqueue_if_new(self: &Arc<Self>, link: DiscoveredLink, parent: &Task, parent_url: &Url) {
        let Some(depth_left) = child_depth(parent.depth_left, link.kind) else {
            ::log::trace!("Depth budget exhausted for {}", link.url);
            return;
        };

        if !self.scope.should_crawl(&link.url) {
            ::log::trace!("Out of scope: {}", link.url);
            return;
        }

        if !self.mark_visited(&link.url) {
            ::log::trace!("Already queued: {}", link.url);
            return;
        }

        ::log::debug!("Queuing {:?} {} (depth left {})", link.kind, link.url, depth_left);
        self.enqueue(Task {
            url: link.url,
            depth_left,
            kind: link.kind,
            from: Some(parent_url.clone()),
        });
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), TaskError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| TaskError::Write {
            path: path.to_path_buf(),
            source,
        })
}
