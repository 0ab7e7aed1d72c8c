//! TableStore - the client surface of a partitioned key-value table store.
//!
//! Implementations talk to the remote service (or, for [`InMemoryTableStore`],
//! emulate it in process). The repository only ever reaches a store through a
//! [`TableClient`] bound to one table.

mod client;
mod in_memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::batch::{TableBatch, TableOperation};
use crate::query::{ContinuationToken, QuerySegment, TableQuery};
use crate::row::{ETag, TableRow};

pub use client::TableClient;
pub use in_memory::InMemoryTableStore;

/// Errors reported by a table store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("table {0} does not exist")]
    TableNotFound(String),

    #[error("entity ({partition_key}, {row_key}) already exists")]
    EntityAlreadyExists {
        partition_key: String,
        row_key: String,
    },

    #[error("entity ({partition_key}, {row_key}) does not exist")]
    ResourceNotFound {
        partition_key: String,
        row_key: String,
    },

    #[error("version tag of ({partition_key}, {row_key}) does not match")]
    PreconditionFailed {
        partition_key: String,
        row_key: String,
    },

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// One operation of an otherwise valid batch failed; nothing was applied.
    #[error("batch operation {index} failed: {source}")]
    BatchOperationFailed {
        index: usize,
        source: Box<StoreError>,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Outcome of a single row operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowResult {
    /// The row as stored (or found). `None` when the operation addressed no row
    /// or the store did not echo content.
    pub row: Option<TableRow>,
    pub etag: Option<ETag>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RowResult {
    pub fn from_row(row: TableRow) -> Self {
        Self {
            etag: row.etag.clone(),
            timestamp: row.timestamp,
            row: Some(row),
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.row.is_some()
    }
}

/// Async client surface of a table store.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Creates the table if missing. Returns true if it was created.
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, StoreError>;

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    /// Drops the table. Returns true if it existed.
    async fn delete_table(&self, table: &str) -> Result<bool, StoreError>;

    /// Executes one operation. A `Retrieve` of a missing row succeeds with
    /// an empty result.
    async fn execute(&self, table: &str, operation: TableOperation)
        -> Result<RowResult, StoreError>;

    /// Executes a batch as a unit; results come back in submission order.
    async fn execute_batch(
        &self,
        table: &str,
        batch: TableBatch,
    ) -> Result<Vec<RowResult>, StoreError>;

    /// Fetches one page of a scan, resuming at `token` when given.
    async fn query_segment(
        &self,
        table: &str,
        query: &TableQuery,
        token: Option<ContinuationToken>,
    ) -> Result<QuerySegment<TableRow>, StoreError>;
}
