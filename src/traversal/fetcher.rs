//! # Batch Fetcher
//!
//! Pulls successive pages from a [`Traversable`], moving the cursor to the last
//! item of every page it yields. Fetching ends when a page comes back empty, when
//! the source reports no more items, or when the configured document ceiling is
//! reached. A page that would cross the ceiling is requested (and, if the source
//! over-delivers, truncated) at exactly the remaining allowance.

use super::batch::Batch;
use super::traversable::Traversable;
use crate::config::TraversalConfig;
use crate::error::{TraversalError, TraversalResult};
use std::sync::Arc;
use tracing::{debug, error};

pub struct BatchFetcher<S: Traversable> {
    traversable: Arc<S>,
    batch_size: usize,
    doc_limit: Option<usize>,
    cursor: Option<S::Cursor>,
    docs_fetched: usize,
    next_index: usize,
    exhausted: bool,
}

impl<S: Traversable> BatchFetcher<S> {
    pub fn new(traversable: Arc<S>, config: &TraversalConfig) -> Self {
        Self {
            traversable,
            batch_size: config.batch_size,
            doc_limit: config.doc_limit(),
            cursor: None,
            docs_fetched: 0,
            next_index: 0,
            exhausted: false,
        }
    }

    pub fn cursor(&self) -> Option<&S::Cursor> {
        self.cursor.as_ref()
    }

    pub fn docs_fetched(&self) -> usize {
        self.docs_fetched
    }

    pub fn batches_fetched(&self) -> usize {
        self.next_index
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Stop fetching; later calls to [`next_batch`](Self::next_batch) return `None`
    pub fn finish(&mut self) {
        self.exhausted = true;
    }

    /// Fetch the next batch, or `None` once the traversal is exhausted
    ///
    /// Cursor and document count only advance after a page is retrieved. A failed
    /// fetch leaves them untouched and marks the fetcher exhausted.
    pub async fn next_batch(&mut self) -> TraversalResult<Option<Batch<S::Item>>> {
        if self.exhausted {
            return Ok(None);
        }

        let limit = match self.doc_limit {
            Some(max) => {
                let remaining = max.saturating_sub(self.docs_fetched);
                if remaining == 0 {
                    self.exhausted = true;
                    return Ok(None);
                }
                remaining.min(self.batch_size)
            }
            None => self.batch_size,
        };

        let batch_index = self.next_index;
        let page = match self
            .traversable
            .get_page(self.cursor.as_ref(), limit)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                error!(batch_index = batch_index, error = %e, "Page fetch failed");
                return Err(TraversalError::Fetch {
                    batch_index,
                    reason: format!("{e:#}"),
                });
            }
        };

        let has_more = page.has_more;
        let mut items = page.items;
        if items.is_empty() {
            self.exhausted = true;
            debug!(batch_index = batch_index, "Empty page, traversal exhausted");
            return Ok(None);
        }
        items.truncate(limit);

        if let Some(last) = items.last() {
            self.cursor = Some(self.traversable.cursor_of(last));
        }
        self.docs_fetched += items.len();
        self.next_index += 1;

        let limit_reached = self
            .doc_limit
            .is_some_and(|max| self.docs_fetched >= max);
        if !has_more || limit_reached {
            self.exhausted = true;
        }

        debug!(
            batch_index = batch_index,
            batch_size = items.len(),
            docs_fetched = self.docs_fetched,
            cursor = ?self.cursor,
            exhausted = self.exhausted,
            "Fetched batch"
        );

        Ok(Some(Batch::new(batch_index, items)))
    }
}
