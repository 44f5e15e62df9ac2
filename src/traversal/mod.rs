//! # Traversal Engine
//!
//! Walks an arbitrarily large, externally held collection in bounded batches.
//!
//! ## Components
//!
//! - **[`Traversable`]**: the paginated source (`get_page` after a cursor)
//! - **[`BatchFetcher`]**: advances the cursor page by page and enforces the document ceiling
//! - **[`ConcurrencyThrottle`]**: bounds in-flight batches and applies the inter-batch sleep
//! - **[`Traverser`]**: composes the two and drives `traverse(handler)`

pub mod batch;
pub mod fetcher;
pub mod throttle;
pub mod traversable;
pub mod traverser;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::Batch;
pub use fetcher::BatchFetcher;
pub use throttle::{ConcurrencyThrottle, SlotPermit};
pub use traversable::{Page, Traversable};
pub use traverser::{create_traverser, ExitEarlyPredicate, TraversalSummary, Traverser};
