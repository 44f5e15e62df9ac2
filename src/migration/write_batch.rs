//! Atomic multi-document write units.

use super::document::{FieldPath, UpdateData};
use async_trait::async_trait;
use serde_json::Value;

/// Mutations staged against several documents and committed all-or-nothing
///
/// Staging only records the mutation; nothing is visible until `commit`
/// succeeds, and a failed commit applies nothing.
#[async_trait]
pub trait WriteBatch: Send + 'static {
    type Ref: Send + Sync;

    /// Stage an update of every field in `data` (keys may be dotted paths)
    fn stage_field_merge(&mut self, doc: &Self::Ref, data: UpdateData) -> anyhow::Result<()>;

    /// Stage an update of the single field at `path`
    fn stage_field_path_update(
        &mut self,
        doc: &Self::Ref,
        path: &FieldPath,
        value: Value,
    ) -> anyhow::Result<()>;

    fn staged_count(&self) -> usize;

    async fn commit(self) -> anyhow::Result<()>;
}

/// Hands out a fresh [`WriteBatch`] per traversed page
pub trait WriteBatchProvider: Send + Sync + 'static {
    type Batch: WriteBatch;

    fn batch(&self) -> Self::Batch;
}
