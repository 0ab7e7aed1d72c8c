//! Store wrapper that records the calls a repository makes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tabled_rust::store::{RowResult, StoreError, TableStore};
use tabled_rust::{
    ContinuationToken, InMemoryTableStore, QuerySegment, TableBatch, TableOperation, TableQuery,
    TableRow,
};

/// Delegates to an [`InMemoryTableStore`] while counting calls.
pub struct RecordingStore {
    inner: InMemoryTableStore,
    create_delay: Duration,
    creates: AtomicUsize,
    queries: AtomicUsize,
    retrieves: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::wrap(InMemoryTableStore::new())
    }

    pub fn wrap(inner: InMemoryTableStore) -> Self {
        Self {
            inner,
            create_delay: Duration::ZERO,
            creates: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            retrieves: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Page size of the wrapped store.
    pub fn with_page_size(page_size: usize) -> Self {
        Self::wrap(InMemoryTableStore::new().with_page_size(page_size))
    }

    /// Makes table creation slow enough for concurrent callers to overlap.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn inner(&self) -> &InMemoryTableStore {
        &self.inner
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn retrieves(&self) -> usize {
        self.retrieves.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.queries.store(0, Ordering::SeqCst);
        self.retrieves.store(0, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().clear();
    }
}

#[async_trait]
impl TableStore for RecordingStore {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.inner.create_table_if_not_exists(table).await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        self.inner.table_exists(table).await
    }

    async fn delete_table(&self, table: &str) -> Result<bool, StoreError> {
        self.inner.delete_table(table).await
    }

    async fn execute(&self, table: &str, operation: TableOperation) -> Result<RowResult, StoreError> {
        if matches!(operation, TableOperation::Retrieve(_)) {
            self.retrieves.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.execute(table, operation).await
    }

    async fn execute_batch(
        &self,
        table: &str,
        batch: TableBatch,
    ) -> Result<Vec<RowResult>, StoreError> {
        self.batch_sizes.lock().unwrap().push(batch.len());
        self.inner.execute_batch(table, batch).await
    }

    async fn query_segment(
        &self,
        table: &str,
        query: &TableQuery,
        token: Option<ContinuationToken>,
    ) -> Result<QuerySegment<TableRow>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query_segment(table, query, token).await
    }
}
