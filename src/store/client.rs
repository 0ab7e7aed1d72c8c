use std::sync::Arc;

use tracing::debug;

use super::{RowResult, TableStore};
use crate::batch::{TableBatch, TableOperation};
use crate::error::{RepositoryError, RepositoryResult};
use crate::query::{ContinuationToken, QuerySegment, TableQuery};
use crate::row::TableRow;

/// Handle to one table of a store. Read-only once built; clone-friendly via Arc.
pub struct TableClient<S: ?Sized> {
    store: Arc<S>,
    name: Arc<str>,
}

impl<S: ?Sized> Clone for TableClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            name: Arc::clone(&self.name),
        }
    }
}

impl<S: TableStore + ?Sized> TableClient<S> {
    pub fn new(store: Arc<S>, name: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn map_err(&self, err: super::StoreError) -> RepositoryError {
        RepositoryError::from_store(&self.name, err)
    }

    pub async fn create_if_not_exists(&self) -> RepositoryResult<bool> {
        self.store
            .create_table_if_not_exists(&self.name)
            .await
            .map_err(|e| self.map_err(e))
    }

    pub async fn exists(&self) -> RepositoryResult<bool> {
        self.store
            .table_exists(&self.name)
            .await
            .map_err(|e| self.map_err(e))
    }

    pub async fn execute(&self, operation: TableOperation) -> RepositoryResult<RowResult> {
        debug!(
            table = %self.name,
            operation = operation.kind(),
            partition_key = operation.partition_key(),
            row_key = operation.row_key(),
            "executing table operation"
        );
        self.store
            .execute(&self.name, operation)
            .await
            .map_err(|e| self.map_err(e))
    }

    pub async fn execute_batch(&self, batch: TableBatch) -> RepositoryResult<Vec<RowResult>> {
        debug!(table = %self.name, operations = batch.len(), "submitting batch");
        self.store
            .execute_batch(&self.name, batch)
            .await
            .map_err(|e| self.map_err(e))
    }

    pub async fn query_segment(
        &self,
        query: &TableQuery,
        token: Option<ContinuationToken>,
    ) -> RepositoryResult<QuerySegment<TableRow>> {
        self.store
            .query_segment(&self.name, query, token)
            .await
            .map_err(|e| self.map_err(e))
    }
}
