//! # Traverser
//!
//! Drives a full traversal: fetch a page, take a concurrency slot, dispatch the
//! page to the batch handler without waiting for it, optionally sleep, repeat.
//! When the fetcher is exhausted every outstanding handler is awaited before the
//! summary (or the first failure) is returned.
//!
//! Dispatch order always follows cursor order. With `max_concurrent_batch_count`
//! of 1 the next page is not even fetched until the previous handler has settled,
//! so completion order matches dispatch order too. With higher concurrency,
//! completion order is unspecified.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use traverser_core::config::TraversalConfigOverrides;
//! use traverser_core::memory::MemoryCollection;
//! use traverser_core::create_traverser;
//!
//! # async fn example() -> traverser_core::TraversalResult<()> {
//! let users = Arc::new(MemoryCollection::new());
//! let traverser = create_traverser(
//!     users,
//!     &TraversalConfigOverrides::new().batch_size(100).max_concurrent_batch_count(4),
//! )?;
//!
//! let summary = traverser
//!     .traverse(|batch| async move {
//!         tracing::info!(docs = batch.len(), "processing batch");
//!         Ok(())
//!     })
//!     .await?;
//! println!("{} docs in {} batches", summary.doc_count, summary.batch_count);
//! # Ok(())
//! # }
//! ```

use super::batch::Batch;
use super::fetcher::BatchFetcher;
use super::throttle::ConcurrencyThrottle;
use super::traversable::Traversable;
use crate::config::{TraversalConfig, TraversalConfigOverrides};
use crate::error::{TraversalError, TraversalResult};
use crate::logging::log_batch_operation;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, instrument};

/// Aggregate counts for one completed traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSummary {
    /// Batches dispatched to the handler
    pub batch_count: usize,
    /// Documents in those batches
    pub doc_count: usize,
}

/// Returns `true` to stop fetching after the given batch
pub type ExitEarlyPredicate<T> = Arc<dyn Fn(&Batch<T>) -> bool + Send + Sync>;

/// Create a traverser over `traversable` with overrides applied to the defaults
pub fn create_traverser<S: Traversable>(
    traversable: Arc<S>,
    overrides: &TraversalConfigOverrides,
) -> TraversalResult<Traverser<S>> {
    Traverser::new(traversable, TraversalConfig::from_overrides(overrides)?)
}

pub struct Traverser<S: Traversable> {
    traversable: Arc<S>,
    config: TraversalConfig,
    exit_early_predicates: Vec<ExitEarlyPredicate<S::Item>>,
}

impl<S: Traversable> Clone for Traverser<S> {
    fn clone(&self) -> Self {
        Self {
            traversable: self.traversable.clone(),
            config: self.config.clone(),
            exit_early_predicates: self.exit_early_predicates.clone(),
        }
    }
}

impl<S: Traversable> std::fmt::Debug for Traverser<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Traverser")
            .field("config", &self.config)
            .field("exit_early_predicates", &self.exit_early_predicates.len())
            .finish()
    }
}

impl<S: Traversable> Traverser<S> {
    /// Create a traverser, failing fast on an invalid config
    pub fn new(traversable: Arc<S>, config: TraversalConfig) -> TraversalResult<Self> {
        config.validate()?;

        info!(
            batch_size = config.batch_size,
            max_concurrent_batch_count = config.max_concurrent_batch_count,
            max_doc_count = config.max_doc_count,
            sleep_between_batches = config.sleep_between_batches,
            "Traverser created"
        );

        Ok(Self {
            traversable,
            config,
            exit_early_predicates: Vec::new(),
        })
    }

    pub fn traversable(&self) -> &Arc<S> {
        &self.traversable
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    /// A new traverser with `overrides` merged onto this one's config
    ///
    /// Exit-early predicates carry over; `self` is left unchanged.
    pub fn with_config(&self, overrides: &TraversalConfigOverrides) -> TraversalResult<Self> {
        let mut traverser = Self::new(self.traversable.clone(), overrides.apply_to(&self.config))?;
        traverser.exit_early_predicates = self.exit_early_predicates.clone();
        Ok(traverser)
    }

    /// A new traverser that also stops once `predicate` returns `true` for a batch
    ///
    /// The batch that triggers the predicate is still dispatched and counted.
    pub fn with_exit_early_predicate<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Batch<S::Item>) -> bool + Send + Sync + 'static,
    {
        let mut traverser = self.clone();
        traverser.exit_early_predicates.push(Arc::new(predicate));
        traverser
    }

    /// Traverse the whole source, handing each batch to `handler`
    ///
    /// Fails with the first error recorded (fetch, handler, commit, ...) but only
    /// after every already-dispatched handler has settled. No new page is fetched
    /// once a failure has been recorded.
    #[instrument(skip_all, fields(
        batch_size = self.config.batch_size,
        max_concurrent_batch_count = self.config.max_concurrent_batch_count
    ))]
    pub async fn traverse<H, Fut>(&self, handler: H) -> TraversalResult<TraversalSummary>
    where
        H: Fn(Batch<S::Item>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.run(handler).await.0
    }

    /// The traversal loop; also reports the most handler tasks held at once
    async fn run<H, Fut>(&self, handler: H) -> (TraversalResult<TraversalSummary>, usize)
    where
        H: Fn(Batch<S::Item>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let started = Instant::now();
        let handler = Arc::new(handler);
        let throttle = ConcurrencyThrottle::new(&self.config);
        let mut fetcher = BatchFetcher::new(self.traversable.clone(), &self.config);
        let failure: Arc<Mutex<Option<TraversalError>>> = Arc::new(Mutex::new(None));
        let mut in_flight = JoinSet::new();
        let mut held_tasks = 0;
        let mut summary = TraversalSummary::default();

        loop {
            if has_failed(&failure) {
                break;
            }

            let permit = match throttle.acquire_slot().await {
                Ok(permit) => permit,
                Err(e) => {
                    record_failure(&failure, e);
                    break;
                }
            };

            // Settled tasks leave the set so it stays bounded by the slot count
            while let Some(joined) = in_flight.try_join_next() {
                record_join_error(&failure, joined);
            }

            // A handler may have failed while we waited for the slot
            if has_failed(&failure) {
                break;
            }

            let batch = match fetcher.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    record_failure(&failure, e);
                    break;
                }
            };

            let batch_index = batch.index();
            let batch_len = batch.len();
            let exit_early = self.should_exit_early(&batch);

            summary.batch_count += 1;
            summary.doc_count += batch_len;
            log_batch_operation("dispatch", batch_index, batch_len, throttle.in_flight(), None);

            let handler = handler.clone();
            let failure = failure.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                match handler(batch).await {
                    Ok(()) => log_batch_operation("settled", batch_index, batch_len, 0, None),
                    Err(e) => {
                        let error = TraversalError::from_handler(batch_index, e);
                        error!(batch_index = batch_index, error = %error, "Batch handler failed");
                        record_failure(&failure, error);
                    }
                }
            });
            held_tasks = held_tasks.max(in_flight.len());

            if exit_early {
                info!(batch_index = batch_index, "Exit-early predicate matched, stopping traversal");
                fetcher.finish();
                break;
            }
            if fetcher.is_exhausted() {
                break;
            }

            throttle.pause().await;
        }

        while let Some(joined) = in_flight.join_next().await {
            record_join_error(&failure, joined);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(error) = failure.lock().take() {
            error!(
                dispatched_batches = summary.batch_count,
                dispatched_docs = summary.doc_count,
                elapsed_ms = elapsed_ms,
                error = %error,
                "Traversal failed"
            );
            return (Err(error), held_tasks);
        }

        info!(
            batch_count = summary.batch_count,
            doc_count = summary.doc_count,
            max_in_flight = throttle.high_water_mark(),
            max_concurrent_batch_count = throttle.max_in_flight(),
            elapsed_ms = elapsed_ms,
            "Traversal completed"
        );

        (Ok(summary), held_tasks)
    }

    fn should_exit_early(&self, batch: &Batch<S::Item>) -> bool {
        self.exit_early_predicates
            .iter()
            .any(|predicate| predicate(batch))
    }
}

fn has_failed(failure: &Mutex<Option<TraversalError>>) -> bool {
    failure.lock().is_some()
}

fn record_join_error(failure: &Mutex<Option<TraversalError>>, joined: Result<(), JoinError>) {
    if let Err(join_error) = joined {
        error!(error = %join_error, "Batch handler task did not complete");
        record_failure(
            failure,
            TraversalError::Runtime(format!("batch handler task failed: {join_error}")),
        );
    }
}

/// Keep only the first failure
fn record_failure(failure: &Mutex<Option<TraversalError>>, error: TraversalError) {
    let mut slot = failure.lock();
    if slot.is_none() {
        *slot = Some(error);
    }
}
