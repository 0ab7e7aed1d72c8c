//! Table operations and size-limited batches.

mod chunker;

use crate::row::{ETag, RowKeyPair, TableRow};

pub use chunker::chunk_operations;

/// Upper bound the remote store places on operations per batch.
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// A single row operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TableOperation {
    /// Insert a new row; fails if the keys already exist.
    Insert(TableRow),
    /// Replace a stored row, conditioned on `row.etag`.
    Replace(TableRow),
    /// Delete a stored row, conditioned on `etag`.
    Delete { keys: RowKeyPair, etag: ETag },
    /// Upsert, merging properties into any stored row. No version check.
    InsertOrMerge(TableRow),
    /// Upsert, replacing any stored row. No version check.
    InsertOrReplace(TableRow),
    /// Point lookup.
    Retrieve(RowKeyPair),
}

impl TableOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            TableOperation::Insert(_) => "insert",
            TableOperation::Replace(_) => "replace",
            TableOperation::Delete { .. } => "delete",
            TableOperation::InsertOrMerge(_) => "insert_or_merge",
            TableOperation::InsertOrReplace(_) => "insert_or_replace",
            TableOperation::Retrieve(_) => "retrieve",
        }
    }

    pub fn partition_key(&self) -> &str {
        match self {
            TableOperation::Insert(row)
            | TableOperation::Replace(row)
            | TableOperation::InsertOrMerge(row)
            | TableOperation::InsertOrReplace(row) => &row.partition_key,
            TableOperation::Delete { keys, .. } | TableOperation::Retrieve(keys) => {
                &keys.partition_key
            }
        }
    }

    pub fn row_key(&self) -> &str {
        match self {
            TableOperation::Insert(row)
            | TableOperation::Replace(row)
            | TableOperation::InsertOrMerge(row)
            | TableOperation::InsertOrReplace(row) => &row.row_key,
            TableOperation::Delete { keys, .. } | TableOperation::Retrieve(keys) => &keys.row_key,
        }
    }

    pub fn keys(&self) -> RowKeyPair {
        RowKeyPair::new(self.partition_key(), self.row_key())
    }
}

/// An ordered group of operations submitted to the store as one unit.
///
/// The batch itself places no limit on its size or partitions; the store
/// rejects oversized or cross-partition batches, and the repository chunks
/// before submitting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableBatch {
    operations: Vec<TableOperation>,
}

impl TableBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: TableOperation) {
        self.operations.push(operation);
    }

    pub fn insert(&mut self, row: TableRow) {
        self.push(TableOperation::Insert(row));
    }

    pub fn replace(&mut self, row: TableRow) {
        self.push(TableOperation::Replace(row));
    }

    pub fn insert_or_replace(&mut self, row: TableRow) {
        self.push(TableOperation::InsertOrReplace(row));
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[TableOperation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<TableOperation> {
        self.operations
    }

    /// Splits into batches of at most `ceiling` operations, order preserved.
    pub fn into_chunks(self, ceiling: usize) -> Vec<TableBatch> {
        chunk_operations(self.operations, ceiling)
            .into_iter()
            .map(TableBatch::from)
            .collect()
    }
}

impl From<Vec<TableOperation>> for TableBatch {
    fn from(operations: Vec<TableOperation>) -> Self {
        Self { operations }
    }
}

impl FromIterator<TableOperation> for TableBatch {
    fn from_iter<I: IntoIterator<Item = TableOperation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_expose_their_keys() {
        let insert = TableOperation::Insert(TableRow::new("p", "r"));
        assert_eq!(insert.keys(), RowKeyPair::new("p", "r"));
        assert_eq!(insert.kind(), "insert");

        let delete = TableOperation::Delete {
            keys: RowKeyPair::new("p", "x"),
            etag: ETag::wildcard(),
        };
        assert_eq!(delete.row_key(), "x");
    }

    #[test]
    fn batch_chunks_preserve_order() {
        let batch: TableBatch = (0..7)
            .map(|i| TableOperation::Insert(TableRow::new("p", i.to_string())))
            .collect();
        let chunks = batch.into_chunks(3);
        let sizes: Vec<usize> = chunks.iter().map(TableBatch::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(chunks[2].operations()[0].row_key(), "6");
    }
}
