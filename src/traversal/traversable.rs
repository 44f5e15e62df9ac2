//! The paginated data source a traversal walks.

use async_trait::async_trait;
use std::fmt::Debug;

/// One page returned by [`Traversable::get_page`]
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in the source's stable total order
    pub items: Vec<T>,
    /// Whether the source holds items beyond this page
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, has_more: bool) -> Self {
        Self { items, has_more }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A collection-like source that can be paged by cursor
///
/// Implementations must return items in a stable total order: asking for the
/// page after the cursor of the last item seen never skips or repeats an item.
/// The engine never retries a failed `get_page`; the error fails the traversal.
#[async_trait]
pub trait Traversable: Send + Sync + 'static {
    type Item: Send + Sync + 'static;
    type Cursor: Clone + Debug + Send + Sync + 'static;

    /// Fetch up to `limit` items strictly after `after` (`None` = start)
    async fn get_page(
        &self,
        after: Option<&Self::Cursor>,
        limit: usize,
    ) -> anyhow::Result<Page<Self::Item>>;

    /// Ordering key of `item`, used as the cursor for the next page
    fn cursor_of(&self, item: &Self::Item) -> Self::Cursor;
}
