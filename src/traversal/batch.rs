use std::ops::Deref;

/// An ordered group of items fetched in one page request
///
/// `index` starts at 0 and increases by one for every batch a traversal yields.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    index: usize,
    items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn new(index: usize, items: Vec<T>) -> Self {
        Self { index, items }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Deref for Batch<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T> IntoIterator for Batch<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Batch<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
