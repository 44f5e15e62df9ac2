//! # Migrator
//!
//! Mass, predicate-filtered updates on top of the traversal engine. Each update
//! call resolves its request once, then traverses the collection staging one
//! mutation per matching document into a write batch per page and committing
//! that batch when the page is done. Pages commit independently: a later
//! failure never rolls back pages that already committed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use traverser_core::config::TraversalConfigOverrides;
//! use traverser_core::memory::{MemoryCollection, MemoryDocument};
//! use traverser_core::migration::{create_migrator, UpdateRequest};
//!
//! # async fn example() -> traverser_core::TraversalResult<()> {
//! let orders = Arc::new(MemoryCollection::new());
//! let migrator = create_migrator(orders.clone(), orders, &TraversalConfigOverrides::new())?;
//!
//! let summary = migrator
//!     .update(
//!         UpdateRequest::field("status", "archived")
//!             .when(|doc: &MemoryDocument| doc.get("status") == Some(&json!("closed"))),
//!     )
//!     .await?;
//! println!("updated {} docs", summary.updated_doc_count);
//! # Ok(())
//! # }
//! ```

use super::document::{Document, FieldPath, UpdateData};
use super::update::{
    resolve_update_args, DocumentMutation, UpdateArg, UpdatePredicate, UpdateRequest,
};
use super::write_batch::{WriteBatch, WriteBatchProvider};
use crate::config::{TraversalConfig, TraversalConfigOverrides};
use crate::error::{TraversalError, TraversalResult};
use crate::traversal::{Batch, Traversable, TraversalSummary, Traverser};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Outcome of one update call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// Pages traversed
    pub batch_count: usize,
    /// Documents that passed the predicate and were committed
    pub updated_doc_count: usize,
}

/// Create a migrator over `traversable`, writing through `writer`
pub fn create_migrator<S, W>(
    traversable: Arc<S>,
    writer: Arc<W>,
    overrides: &TraversalConfigOverrides,
) -> TraversalResult<Migrator<S, W>>
where
    S: Traversable,
    S::Item: Document,
    W: WriteBatchProvider,
    W::Batch: WriteBatch<Ref = <S::Item as Document>::Ref>,
{
    Migrator::new(traversable, writer, TraversalConfig::from_overrides(overrides)?)
}

pub struct Migrator<S: Traversable, W> {
    traverser: Traverser<S>,
    writer: Arc<W>,
}

impl<S: Traversable, W> Clone for Migrator<S, W> {
    fn clone(&self) -> Self {
        Self {
            traverser: self.traverser.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<S, W> Migrator<S, W>
where
    S: Traversable,
    S::Item: Document,
    W: WriteBatchProvider,
    W::Batch: WriteBatch<Ref = <S::Item as Document>::Ref>,
{
    pub fn new(traversable: Arc<S>, writer: Arc<W>, config: TraversalConfig) -> TraversalResult<Self> {
        Ok(Self::from_traverser(Traverser::new(traversable, config)?, writer))
    }

    pub fn from_traverser(traverser: Traverser<S>, writer: Arc<W>) -> Self {
        Self { traverser, writer }
    }

    pub fn traverser(&self) -> &Traverser<S> {
        &self.traverser
    }

    pub fn writer(&self) -> &Arc<W> {
        &self.writer
    }

    pub fn with_config(&self, overrides: &TraversalConfigOverrides) -> TraversalResult<Self> {
        Ok(Self::from_traverser(
            self.traverser.with_config(overrides)?,
            self.writer.clone(),
        ))
    }

    pub fn with_exit_early_predicate<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Batch<S::Item>) -> bool + Send + Sync + 'static,
    {
        Self::from_traverser(
            self.traverser.with_exit_early_predicate(predicate),
            self.writer.clone(),
        )
    }

    /// Plain traversal with an arbitrary handler, see [`Traverser::traverse`]
    pub async fn traverse<H, Fut>(&self, handler: H) -> TraversalResult<TraversalSummary>
    where
        H: Fn(Batch<S::Item>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.traverser.traverse(handler).await
    }

    /// Apply `data` to every document passing `predicate` (all when `None`)
    pub async fn update_data(
        &self,
        data: UpdateData,
        predicate: Option<UpdatePredicate<S::Item>>,
    ) -> TraversalResult<UpdateSummary> {
        self.update(UpdateRequest::data(data).with_predicate(predicate))
            .await
    }

    /// Set the field at `path` to `value` on every document passing `predicate`
    pub async fn update_field(
        &self,
        path: impl Into<FieldPath>,
        value: impl Into<Value>,
        predicate: Option<UpdatePredicate<S::Item>>,
    ) -> TraversalResult<UpdateSummary> {
        self.update(UpdateRequest::field(path, value).with_predicate(predicate))
            .await
    }

    /// Apply the data computed by `getter` to every document passing `predicate`
    pub async fn update_computed<G>(
        &self,
        getter: G,
        predicate: Option<UpdatePredicate<S::Item>>,
    ) -> TraversalResult<UpdateSummary>
    where
        G: Fn(&S::Item) -> UpdateData + Send + Sync + 'static,
    {
        self.update(UpdateRequest::computed(getter).with_predicate(predicate))
            .await
    }

    /// Update from positional arguments, see [`resolve_update_args`]
    pub async fn update_args(&self, args: Vec<UpdateArg<S::Item>>) -> TraversalResult<UpdateSummary> {
        self.update(resolve_update_args(args)?).await
    }

    #[instrument(skip_all, fields(kind = request.kind(), filtered = request.has_predicate()))]
    pub async fn update(&self, request: UpdateRequest<S::Item>) -> TraversalResult<UpdateSummary> {
        let mutation = Arc::new(request.resolve()?);
        let writer = self.writer.clone();
        let updated = Arc::new(AtomicUsize::new(0));
        let counter = updated.clone();

        let traversal = self
            .traverser
            .traverse(move |batch: Batch<S::Item>| {
                commit_page(mutation.clone(), writer.clone(), counter.clone(), batch)
            })
            .await?;

        let summary = UpdateSummary {
            batch_count: traversal.batch_count,
            updated_doc_count: updated.load(Ordering::Acquire),
        };

        info!(
            batch_count = summary.batch_count,
            visited_doc_count = traversal.doc_count,
            updated_doc_count = summary.updated_doc_count,
            "Update completed"
        );

        Ok(summary)
    }
}

/// Stage every matching document of one page and commit the page's write batch
async fn commit_page<D, W>(
    mutation: Arc<DocumentMutation<D>>,
    writer: Arc<W>,
    counter: Arc<AtomicUsize>,
    batch: Batch<D>,
) -> anyhow::Result<()>
where
    D: Document,
    W: WriteBatchProvider,
    W::Batch: WriteBatch<Ref = D::Ref>,
{
    let batch_index = batch.index();
    let mut write_batch = writer.batch();

    for doc in batch.items() {
        mutation.apply(&mut write_batch, doc, batch_index)?;
    }

    let staged = write_batch.staged_count();
    if staged == 0 {
        debug!(batch_index = batch_index, "No documents matched, skipping commit");
        return Ok(());
    }

    write_batch
        .commit()
        .await
        .map_err(|e| TraversalError::Commit {
            batch_index,
            reason: format!("{e:#}"),
        })?;
    counter.fetch_add(staged, Ordering::AcqRel);

    debug!(
        batch_index = batch_index,
        visited = batch.len(),
        committed = staged,
        "Write batch committed"
    );
    Ok(())
}
