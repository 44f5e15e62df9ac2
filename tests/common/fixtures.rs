//! Shared fixtures: seeded collections, an instrumented batch handler and
//! failure-injecting collaborators.

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use traverser_core::memory::{MemoryCollection, MemoryWriteBatch};
use traverser_core::migration::{FieldPath, UpdateData, WriteBatch, WriteBatchProvider};
use traverser_core::{Batch, Page, Traversable};

/// `count` documents `doc-0000..`, each `{"n": i, "status": "active"}`
pub fn numbered_collection(count: usize) -> MemoryCollection {
    MemoryCollection::with_documents(
        (0..count).map(|i| (format!("doc-{i:04}"), json!({"n": i, "status": "active"}))),
    )
}

pub fn object(value: Value) -> UpdateData {
    value.as_object().cloned().expect("fixture value must be an object")
}

/// Records what an instrumented handler observed during a traversal
#[derive(Debug, Default)]
pub struct BatchRecorder {
    started: Mutex<Vec<usize>>,
    completed: Mutex<Vec<usize>>,
    sizes: Mutex<Vec<usize>>,
    start_times: Mutex<Vec<tokio::time::Instant>>,
    current: AtomicUsize,
    high_water_mark: AtomicUsize,
}

impl BatchRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A handler that records start/finish and sleeps `delay(batch_index)` in between
    pub fn handler<T, F>(
        self: &Arc<Self>,
        delay: F,
    ) -> impl Fn(Batch<T>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static
    where
        T: Send + Sync + 'static,
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        let recorder = self.clone();
        let delay = Arc::new(delay);
        move |batch: Batch<T>| {
            let recorder = recorder.clone();
            let pause = delay(batch.index());
            Box::pin(async move {
                recorder.on_start(batch.index(), batch.len());
                tokio::time::sleep(pause).await;
                recorder.on_complete(batch.index());
                Ok(())
            })
        }
    }

    fn on_start(&self, index: usize, size: usize) {
        self.started.lock().push(index);
        self.sizes.lock().push(size);
        self.start_times.lock().push(tokio::time::Instant::now());
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water_mark.fetch_max(now, Ordering::SeqCst);
    }

    fn on_complete(&self, index: usize) {
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().push(index);
    }

    pub fn started(&self) -> Vec<usize> {
        self.started.lock().clone()
    }

    pub fn completed(&self) -> Vec<usize> {
        self.completed.lock().clone()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.sizes.lock().clone()
    }

    pub fn start_times(&self) -> Vec<tokio::time::Instant> {
        self.start_times.lock().clone()
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark.load(Ordering::SeqCst)
    }
}

/// Wraps a traversable and fails its n-th `get_page` call (0-based)
pub struct FlakyTraversable<S> {
    inner: S,
    fail_on_call: usize,
    calls: AtomicUsize,
}

impl<S> FlakyTraversable<S> {
    pub fn new(inner: S, fail_on_call: usize) -> Self {
        Self {
            inner,
            fail_on_call,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: Traversable> Traversable for FlakyTraversable<S> {
    type Item = S::Item;
    type Cursor = S::Cursor;

    async fn get_page(
        &self,
        after: Option<&Self::Cursor>,
        limit: usize,
    ) -> anyhow::Result<Page<Self::Item>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on_call {
            anyhow::bail!("store unavailable on page request {call}");
        }
        self.inner.get_page(after, limit).await
    }

    fn cursor_of(&self, item: &Self::Item) -> Self::Cursor {
        self.inner.cursor_of(item)
    }
}

/// Write-batch provider over a [`MemoryCollection`] that counts commits and can
/// fail the n-th one (0-based)
pub struct CountingWriter {
    collection: MemoryCollection,
    fail_on_commit: Option<usize>,
    commits: Arc<AtomicUsize>,
}

impl CountingWriter {
    pub fn new(collection: MemoryCollection) -> Self {
        Self {
            collection,
            fail_on_commit: None,
            commits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on_commit(mut self, commit: usize) -> Self {
        self.fail_on_commit = Some(commit);
        self
    }

    /// Commit attempts, successful or not
    pub fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl WriteBatchProvider for CountingWriter {
    type Batch = CountingWriteBatch;

    fn batch(&self) -> CountingWriteBatch {
        CountingWriteBatch {
            inner: self.collection.batch(),
            fail_on_commit: self.fail_on_commit,
            commits: self.commits.clone(),
        }
    }
}

pub struct CountingWriteBatch {
    inner: MemoryWriteBatch,
    fail_on_commit: Option<usize>,
    commits: Arc<AtomicUsize>,
}

#[async_trait]
impl WriteBatch for CountingWriteBatch {
    type Ref = String;

    fn stage_field_merge(&mut self, doc: &String, data: UpdateData) -> anyhow::Result<()> {
        self.inner.stage_field_merge(doc, data)
    }

    fn stage_field_path_update(
        &mut self,
        doc: &String,
        path: &FieldPath,
        value: Value,
    ) -> anyhow::Result<()> {
        self.inner.stage_field_path_update(doc, path, value)
    }

    fn staged_count(&self) -> usize {
        self.inner.staged_count()
    }

    async fn commit(self) -> anyhow::Result<()> {
        let attempt = self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_commit == Some(attempt) {
            anyhow::bail!("commit {attempt} rejected by store");
        }
        self.inner.commit().await
    }
}
