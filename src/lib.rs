//! Typed repositories over a partitioned key-value table store.
//!
//! Entities are mapped onto flat rows addressed by `(PartitionKey, RowKey)`.
//! A [`TableRepository`] turns CRUD and query calls into store operations,
//! chunks large writes into size-limited batches, follows continuation tokens
//! until a scan is exhausted and guards updates with version tags.

extern crate self as tabled_rust;

pub mod batch;
mod config;
mod entity;
mod error;
pub mod filter;
mod proxy;
mod query;
mod repository;
mod resolver;
pub mod row;
pub mod store;

pub use batch::{chunk_operations, TableBatch, TableOperation, MAX_BATCH_OPERATIONS};
pub use config::TableRepositoryConfig;
pub use entity::TableEntity;
pub use error::{ConflictReason, RepositoryError, RepositoryResult};
pub use filter::{ComparisonOp, Filter, LogicalOp};
pub use proxy::{BoundProxy, EntityProxy, IdPartitionProxy, ProxyFactory, SharedPartitionProxy};
pub use query::{ContinuationToken, QuerySegment, TableQuery};
pub use repository::{EntityRepository, TableRepository};
pub use resolver::{ComponentRegistry, RepositoryFactory};
pub use row::{ETag, RowKeyPair, RowProperties, RowProperty, TableRow};
pub use store::{InMemoryTableStore, RowResult, StoreError, TableClient, TableStore};

// Derive macro shares the trait's name; they live in different namespaces.
pub use tabled_rust_macros::TableEntity;

#[doc(hidden)]
pub mod __private {
    pub use chrono::{DateTime, Utc};
}
