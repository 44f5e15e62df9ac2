//! # In-Memory Collection
//!
//! An ordered, in-process document collection implementing both [`Traversable`]
//! (documents ordered by id, cursor = id) and [`WriteBatchProvider`]. Commits
//! are atomic: every staged mutation is checked under the write lock before any
//! of them is applied, so a failing commit leaves the collection untouched.

use crate::migration::document::{Document, FieldPath, UpdateData};
use crate::migration::write_batch::{WriteBatch, WriteBatchProvider};
use crate::traversal::traversable::{Page, Traversable};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Snapshot of one stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub id: String,
    pub data: UpdateData,
}

impl MemoryDocument {
    pub fn new(id: impl Into<String>, data: UpdateData) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Value at a (possibly dotted) field path
    pub fn get(&self, path: &str) -> Option<&Value> {
        FieldPath::from(path).get_in(&self.data)
    }
}

impl Document for MemoryDocument {
    type Ref = String;

    fn reference(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Default)]
struct Store {
    documents: RwLock<BTreeMap<String, UpdateData>>,
    commit_count: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCollection {
    store: Arc<Store>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from `(id, object)` pairs; non-object values are stored under `value`
    pub fn with_documents<I, K>(documents: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let collection = Self::new();
        for (id, value) in documents {
            collection.insert(id, value);
        }
        collection
    }

    pub fn insert(&self, id: impl Into<String>, value: Value) {
        let data = match value {
            Value::Object(map) => map,
            other => {
                let mut map = UpdateData::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.store.documents.write().insert(id.into(), data);
    }

    pub fn get(&self, id: &str) -> Option<MemoryDocument> {
        self.store
            .documents
            .read()
            .get(id)
            .map(|data| MemoryDocument::new(id, data.clone()))
    }

    pub fn remove(&self, id: &str) -> Option<UpdateData> {
        self.store.documents.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.store.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.documents.read().is_empty()
    }

    pub fn documents(&self) -> Vec<MemoryDocument> {
        self.store
            .documents
            .read()
            .iter()
            .map(|(id, data)| MemoryDocument::new(id.clone(), data.clone()))
            .collect()
    }

    /// Number of successful write-batch commits
    pub fn commit_count(&self) -> usize {
        self.store.commit_count.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Traversable for MemoryCollection {
    type Item = MemoryDocument;
    type Cursor = String;

    async fn get_page(
        &self,
        after: Option<&String>,
        limit: usize,
    ) -> anyhow::Result<Page<MemoryDocument>> {
        let documents = self.store.documents.read();
        let lower = match after {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => Bound::Unbounded,
        };

        let mut range = documents.range((lower, Bound::Unbounded));
        let items: Vec<MemoryDocument> = range
            .by_ref()
            .take(limit)
            .map(|(id, data)| MemoryDocument::new(id.clone(), data.clone()))
            .collect();
        let has_more = range.next().is_some();

        Ok(Page::new(items, has_more))
    }

    fn cursor_of(&self, item: &MemoryDocument) -> String {
        item.id.clone()
    }
}

impl WriteBatchProvider for MemoryCollection {
    type Batch = MemoryWriteBatch;

    fn batch(&self) -> MemoryWriteBatch {
        MemoryWriteBatch {
            store: self.store.clone(),
            writes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum StagedWrite {
    Merge { id: String, data: UpdateData },
    SetField { id: String, path: FieldPath, value: Value },
}

impl StagedWrite {
    fn id(&self) -> &str {
        match self {
            StagedWrite::Merge { id, .. } | StagedWrite::SetField { id, .. } => id,
        }
    }

    fn apply(&self, target: &mut UpdateData) {
        match self {
            StagedWrite::Merge { data, .. } => {
                for (key, value) in data {
                    FieldPath::from(key.as_str()).set_in(target, value.clone());
                }
            }
            StagedWrite::SetField { path, value, .. } => path.set_in(target, value.clone()),
        }
    }
}

/// Write batch over a [`MemoryCollection`]; updates require existing documents
#[derive(Debug)]
pub struct MemoryWriteBatch {
    store: Arc<Store>,
    writes: Vec<StagedWrite>,
}

#[async_trait]
impl WriteBatch for MemoryWriteBatch {
    type Ref = String;

    fn stage_field_merge(&mut self, doc: &String, data: UpdateData) -> anyhow::Result<()> {
        if data.is_empty() {
            anyhow::bail!("update data for document '{doc}' is empty");
        }
        for key in data.keys() {
            FieldPath::from(key.as_str()).validate()?;
        }
        self.writes.push(StagedWrite::Merge {
            id: doc.clone(),
            data,
        });
        Ok(())
    }

    fn stage_field_path_update(
        &mut self,
        doc: &String,
        path: &FieldPath,
        value: Value,
    ) -> anyhow::Result<()> {
        path.validate()?;
        self.writes.push(StagedWrite::SetField {
            id: doc.clone(),
            path: path.clone(),
            value,
        });
        Ok(())
    }

    fn staged_count(&self) -> usize {
        self.writes.len()
    }

    async fn commit(self) -> anyhow::Result<()> {
        let mut documents = self.store.documents.write();

        if let Some(missing) = self.writes.iter().find(|w| !documents.contains_key(w.id())) {
            anyhow::bail!("no document to update: '{}'", missing.id());
        }

        for write in &self.writes {
            if let Some(target) = documents.get_mut(write.id()) {
                write.apply(target);
            }
        }
        drop(documents);

        self.store.commit_count.fetch_add(1, Ordering::AcqRel);
        debug!(writes = self.writes.len(), "Memory write batch committed");
        Ok(())
    }
}
