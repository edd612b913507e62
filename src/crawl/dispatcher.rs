use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use super::novelty::select_new_items;
use super::subscription::Subscription;
use crate::feed::{Feed, FeedFetcher, FetchError, Item};
use crate::state::{StateError, StateStore};

/// Worker count used when none (or zero) is configured.
pub const DEFAULT_WORKERS: usize = 3;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    State(#[from] StateError),

    /// Every worker stopped before all results were delivered.
    #[error("Crawl workers exited early: received {received} of {expected} results")]
    WorkersExited { expected: usize, received: usize },
}

/// A successfully fetched feed and the items that are new in it.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    pub feed: Feed,
    /// New items in feed order.
    pub new_items: Vec<Item>,
}

/// Outcome of crawling one subscription.
#[derive(Debug)]
pub struct CrawlResult {
    pub subscription: Subscription,
    pub result: Result<FeedUpdate, FetchError>,
}

impl CrawlResult {
    pub fn feed(&self) -> Option<&Feed> {
        self.result.as_ref().ok().map(|u| &u.feed)
    }

    /// New items; empty when the fetch failed.
    pub fn new_items(&self) -> &[Item] {
        self.result
            .as_ref()
            .map(|u| u.new_items.as_slice())
            .unwrap_or_default()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.result.as_ref().err()
    }
}

struct CrawlTask {
    subscription: Subscription,
    cutoff: Option<DateTime<Utc>>,
}

/// Fetches subscriptions on a fixed pool of workers and tracks novelty
/// across runs.
///
/// All state mutation and result callbacks happen on the task that awaits
/// [`Crawler::crawl_with`]; workers only fetch and classify.
pub struct Crawler {
    fetcher: Arc<dyn FeedFetcher>,
    workers: usize,
    state_file: Option<PathBuf>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            fetcher,
            workers: DEFAULT_WORKERS,
            state_file: None,
        }
    }

    /// Sets the worker pool size; `0` selects [`DEFAULT_WORKERS`].
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            DEFAULT_WORKERS
        } else {
            workers
        };
        self
    }

    /// Loads state from and saves it to `path` around each crawl.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Crawls every subscription and collects the results.
    ///
    /// Results are in completion order, not input order.
    pub async fn crawl(
        &self,
        subscriptions: &[Subscription],
        prior: Option<StateStore>,
    ) -> Result<(Vec<CrawlResult>, StateStore), CrawlError> {
        let mut results = Vec::with_capacity(subscriptions.len());
        let state = self
            .crawl_with(subscriptions, prior, |r| results.push(r))
            .await?;
        Ok((results, state))
    }

    /// Crawls every subscription, calling `on_result` once per subscription.
    ///
    /// `prior` is the state to diff against; when `None`, it is loaded from
    /// the configured state file (or starts empty). Each result updates the
    /// state before `on_result` sees it. After the last result the state is
    /// saved to the state file, if any, and returned either way.
    ///
    /// # Errors
    ///
    /// - [`CrawlError::State`] - the state file could not be read, parsed or written
    /// - [`CrawlError::WorkersExited`] - a worker died and results went missing
    ///
    /// Fetch failures are not errors here; they arrive in [`CrawlResult::result`].
    pub async fn crawl_with<F>(
        &self,
        subscriptions: &[Subscription],
        prior: Option<StateStore>,
        mut on_result: F,
    ) -> Result<StateStore, CrawlError>
    where
        F: FnMut(CrawlResult),
    {
        let mut state = match (prior, &self.state_file) {
            (Some(state), _) => state,
            (None, Some(path)) => StateStore::load(path)?,
            (None, None) => StateStore::new(),
        };

        if subscriptions.is_empty() {
            return Ok(state);
        }

        let total = subscriptions.len();
        let workers = self.workers.min(total);
        tracing::info!(subscriptions = total, workers = workers, "Starting crawl");

        // Both queues hold every subscription, so neither side ever waits on capacity
        let (task_tx, task_rx) = mpsc::channel::<CrawlTask>(total);
        let (result_tx, mut result_rx) = mpsc::channel::<CrawlResult>(total);

        // A task that fails to enqueue still surfaces below as `WorkersExited`
        enqueue_tasks(&task_tx, subscriptions, &state);
        drop(task_tx);

        let task_rx = Arc::new(Mutex::new(task_rx));
        let mut pool = JoinSet::new();
        for id in 1..=workers {
            pool.spawn(worker(
                id,
                Arc::clone(&self.fetcher),
                Arc::clone(&task_rx),
                result_tx.clone(),
            ));
        }
        drop(result_tx);

        let mut failed = 0;
        for received in 0..total {
            let Some(result) = result_rx.recv().await else {
                tracing::error!(expected = total, received = received, "Crawl workers exited early");
                return Err(CrawlError::WorkersExited {
                    expected: total,
                    received,
                });
            };

            state.record(result.subscription.id(), Utc::now(), result.feed());
            match &result.result {
                Ok(update) => tracing::debug!(
                    feed = %result.subscription.id(),
                    items = update.feed.items.len(),
                    new_items = update.new_items.len(),
                    "Crawled feed"
                ),
                Err(_) => failed += 1,
            }
            on_result(result);
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Crawl worker did not shut down cleanly");
            }
        }

        if let Some(path) = &self.state_file {
            state.save(path)?;
        }

        tracing::info!(subscriptions = total, failed = failed, "Crawl finished");
        Ok(state)
    }
}

/// Queues one task per subscription, each carrying its feed's cutoff.
///
/// Returns how many tasks were queued.
fn enqueue_tasks(
    task_tx: &mpsc::Sender<CrawlTask>,
    subscriptions: &[Subscription],
    state: &StateStore,
) -> usize {
    let mut queued = 0;
    for subscription in subscriptions {
        let task = CrawlTask {
            cutoff: state.cutoff(subscription.id()),
            subscription: subscription.clone(),
        };
        match task_tx.try_send(task) {
            Ok(()) => queued += 1,
            Err(e) => {
                tracing::error!(feed = %subscription.id(), error = %e, "Failed to enqueue crawl task")
            }
        }
    }
    queued
}

async fn worker(
    id: usize,
    fetcher: Arc<dyn FeedFetcher>,
    tasks: Arc<Mutex<mpsc::Receiver<CrawlTask>>>,
    results: mpsc::Sender<CrawlResult>,
) {
    loop {
        // The queue is filled and closed before workers start, so this never parks
        let next = tasks.lock().await.recv().await;
        let Some(CrawlTask {
            subscription,
            cutoff,
        }) = next
        else {
            break;
        };

        let result = match fetcher.fetch(subscription.uri()).await {
            Ok(feed) => {
                let new_items = select_new_items(&subscription, cutoff, &feed);
                Ok(FeedUpdate { feed, new_items })
            }
            Err(e) => {
                tracing::warn!(
                    worker = id,
                    feed = %subscription.id(),
                    uri = %subscription.uri(),
                    error = %e,
                    "Feed fetch failed"
                );
                Err(e)
            }
        };

        if results
            .send(CrawlResult {
                subscription,
                result,
            })
            .await
            .is_err()
        {
            tracing::debug!(worker = id, "Result receiver dropped, stopping worker");
            break;
        }
    }
}
