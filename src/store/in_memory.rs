//! InMemoryTableStore - HashMap-backed table store for testing and development.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};

use super::{RowResult, StoreError, TableStore};
use crate::batch::{TableBatch, TableOperation, MAX_BATCH_OPERATIONS};
use crate::query::{ContinuationToken, QuerySegment, TableQuery};
use crate::row::{ETag, RowKeyPair, RowProperties, TableRow};

/// Rows per page when a query sets no smaller `take`.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Internal stored representation of a row.
#[derive(Clone)]
struct StoredRow {
    timestamp: DateTime<Utc>,
    etag: ETag,
    properties: RowProperties,
}

impl StoredRow {
    fn to_row(&self, keys: &RowKeyPair) -> TableRow {
        TableRow {
            partition_key: keys.partition_key.clone(),
            row_key: keys.row_key.clone(),
            timestamp: Some(self.timestamp),
            etag: Some(self.etag.clone()),
            properties: self.properties.clone(),
        }
    }
}

type Table = BTreeMap<RowKeyPair, StoredRow>;

/// In-memory table store with the remote store's semantics: rows ordered by
/// `(PartitionKey, RowKey)`, server-assigned version tags, atomic
/// single-partition batches of at most 100 operations, and paged scans.
///
/// Clone-friendly via Arc; clones share storage.
#[derive(Clone)]
pub struct InMemoryTableStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    sequence: Arc<AtomicU64>,
    page_size: usize,
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTableStore {
    /// Create a new store with no tables.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Caps every page at `page_size` rows (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        let tables = self.read()?;
        let rows = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(rows.len())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Table>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Transport("lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Table>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Transport("lock poisoned".into()))
    }

    fn stamp(&self, properties: RowProperties) -> StoredRow {
        let version = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        StoredRow {
            timestamp: Utc::now(),
            etag: ETag::new(format!("W/\"{}\"", version)),
            properties,
        }
    }

    fn apply(&self, table: &mut Table, operation: TableOperation) -> Result<RowResult, StoreError> {
        let keys = operation.keys();
        match operation {
            TableOperation::Insert(row) => {
                if table.contains_key(&keys) {
                    return Err(StoreError::EntityAlreadyExists {
                        partition_key: keys.partition_key,
                        row_key: keys.row_key,
                    });
                }
                Ok(self.put(table, keys, row.properties))
            }
            TableOperation::Replace(row) => {
                check_version(table, &keys, row.etag.as_ref())?;
                Ok(self.put(table, keys, row.properties))
            }
            TableOperation::Delete { etag, .. } => {
                check_version(table, &keys, Some(&etag))?;
                table.remove(&keys);
                Ok(RowResult::not_found())
            }
            TableOperation::InsertOrMerge(row) => {
                let mut properties = table
                    .get(&keys)
                    .map(|stored| stored.properties.clone())
                    .unwrap_or_default();
                properties.extend(row.properties);
                Ok(self.put(table, keys, properties))
            }
            TableOperation::InsertOrReplace(row) => Ok(self.put(table, keys, row.properties)),
            TableOperation::Retrieve(_) => Ok(table
                .get(&keys)
                .map(|stored| RowResult::from_row(stored.to_row(&keys)))
                .unwrap_or_default()),
        }
    }

    fn put(&self, table: &mut Table, keys: RowKeyPair, properties: RowProperties) -> RowResult {
        let stored = self.stamp(properties);
        let row = stored.to_row(&keys);
        table.insert(keys, stored);
        RowResult::from_row(row)
    }
}

fn check_version(table: &Table, keys: &RowKeyPair, etag: Option<&ETag>) -> Result<(), StoreError> {
    let stored = table.get(keys).ok_or_else(|| StoreError::ResourceNotFound {
        partition_key: keys.partition_key.clone(),
        row_key: keys.row_key.clone(),
    })?;
    match etag {
        Some(etag) if etag.matches(&stored.etag) => Ok(()),
        _ => Err(StoreError::PreconditionFailed {
            partition_key: keys.partition_key.clone(),
            row_key: keys.row_key.clone(),
        }),
    }
}

fn validate_batch(batch: &TableBatch) -> Result<(), StoreError> {
    if batch.is_empty() {
        return Err(StoreError::InvalidBatch("batch contains no operations".into()));
    }
    if batch.len() > MAX_BATCH_OPERATIONS {
        return Err(StoreError::InvalidBatch(format!(
            "batch of {} operations exceeds the limit of {}",
            batch.len(),
            MAX_BATCH_OPERATIONS
        )));
    }

    let partition_key = batch.operations()[0].partition_key();
    let mut row_keys = HashSet::new();
    for operation in batch.operations() {
        if matches!(operation, TableOperation::Retrieve(_)) {
            return Err(StoreError::InvalidBatch(
                "retrieve operations cannot be batched".into(),
            ));
        }
        if operation.partition_key() != partition_key {
            return Err(StoreError::InvalidBatch(format!(
                "batch spans partitions {} and {}",
                partition_key,
                operation.partition_key()
            )));
        }
        if !row_keys.insert(operation.row_key()) {
            return Err(StoreError::InvalidBatch(format!(
                "row {} appears more than once",
                operation.row_key()
            )));
        }
    }
    Ok(())
}

fn encode_token(keys: &RowKeyPair) -> Result<ContinuationToken, StoreError> {
    let bytes = bitcode::serialize(&(&keys.partition_key, &keys.row_key))
        .map_err(|e| StoreError::Transport(e.to_string()))?;
    Ok(ContinuationToken::new(URL_SAFE_NO_PAD.encode(bytes)))
}

fn decode_token(token: &ContinuationToken) -> Result<RowKeyPair, StoreError> {
    let malformed = || StoreError::InvalidQuery("malformed continuation token".into());
    let bytes = URL_SAFE_NO_PAD
        .decode(token.as_str())
        .map_err(|_| malformed())?;
    let (partition_key, row_key): (String, String) =
        bitcode::deserialize(&bytes).map_err(|_| malformed())?;
    Ok(RowKeyPair::new(partition_key, row_key))
}

fn project(mut row: TableRow, select: Option<&Vec<String>>) -> TableRow {
    if let Some(select) = select {
        row.properties.retain(|name, _| select.contains(name));
    }
    row
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        if tables.contains_key(table) {
            return Ok(false);
        }
        tables.insert(table.to_string(), Table::new());
        Ok(true)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(table))
    }

    async fn delete_table(&self, table: &str) -> Result<bool, StoreError> {
        Ok(self.write()?.remove(table).is_some())
    }

    async fn execute(
        &self,
        table: &str,
        operation: TableOperation,
    ) -> Result<RowResult, StoreError> {
        let mut tables = self.write()?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        self.apply(rows, operation)
    }

    async fn execute_batch(
        &self,
        table: &str,
        batch: TableBatch,
    ) -> Result<Vec<RowResult>, StoreError> {
        validate_batch(&batch)?;

        let mut tables = self.write()?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        // all or nothing: apply to a copy and swap it in on success
        let mut staged = rows.clone();
        let mut results = Vec::with_capacity(batch.len());
        for (index, operation) in batch.into_operations().into_iter().enumerate() {
            let result = self
                .apply(&mut staged, operation)
                .map_err(|source| StoreError::BatchOperationFailed {
                    index,
                    source: Box::new(source),
                })?;
            results.push(result);
        }
        *rows = staged;

        Ok(results)
    }

    async fn query_segment(
        &self,
        table: &str,
        query: &TableQuery,
        token: Option<ContinuationToken>,
    ) -> Result<QuerySegment<TableRow>, StoreError> {
        let start = match &token {
            Some(token) => Bound::Included(decode_token(token)?),
            None => Bound::Unbounded,
        };
        let limit = query
            .take
            .map_or(self.page_size, |take| take.min(self.page_size))
            .max(1);

        let tables = self.read()?;
        let rows = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let mut results = Vec::new();
        let mut continuation_token = None;
        for (keys, stored) in rows.range((start, Bound::Unbounded)) {
            if results.len() == limit {
                continuation_token = Some(encode_token(keys)?);
                break;
            }
            let row = stored.to_row(keys);
            if query.filter.as_ref().map_or(true, |filter| filter.matches(&row)) {
                results.push(project(row, query.select.as_ref()));
            }
        }

        Ok(QuerySegment {
            results,
            continuation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::row::RowProperty;

    fn row(pk: &str, rk: &str, value: i32) -> TableRow {
        TableRow::new(pk, rk).with_property("Value", value)
    }

    async fn store_with_table() -> InMemoryTableStore {
        let store = InMemoryTableStore::new();
        store.create_table_if_not_exists("t").await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_table_is_idempotent() {
        let store = InMemoryTableStore::new();
        assert!(store.create_table_if_not_exists("t").await.unwrap());
        assert!(!store.create_table_if_not_exists("t").await.unwrap());
        assert!(store.table_exists("t").await.unwrap());
        assert!(store.delete_table("t").await.unwrap());
        assert!(!store.table_exists("t").await.unwrap());
    }

    #[tokio::test]
    async fn missing_table_is_reported() {
        let store = InMemoryTableStore::new();
        let err = store
            .execute("nope", TableOperation::Insert(row("p", "1", 1)))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::TableNotFound("nope".into()));
    }

    #[tokio::test]
    async fn insert_assigns_tag_and_rejects_duplicates() {
        let store = store_with_table().await;
        let result = store
            .execute("t", TableOperation::Insert(row("p", "1", 1)))
            .await
            .unwrap();
        assert!(result.etag.is_some());
        assert!(result.timestamp.is_some());

        let err = store
            .execute("t", TableOperation::Insert(row("p", "1", 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EntityAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn replace_checks_version_tag() {
        let store = store_with_table().await;
        let first = store
            .execute("t", TableOperation::Insert(row("p", "1", 1)))
            .await
            .unwrap();
        let tag = first.etag.unwrap();

        let second = store
            .execute(
                "t",
                TableOperation::Replace(row("p", "1", 2).with_etag(tag.clone())),
            )
            .await
            .unwrap();
        assert_ne!(second.etag.as_ref(), Some(&tag));

        let stale = store
            .execute("t", TableOperation::Replace(row("p", "1", 3).with_etag(tag)))
            .await
            .unwrap_err();
        assert!(matches!(stale, StoreError::PreconditionFailed { .. }));

        let forced = store
            .execute(
                "t",
                TableOperation::Replace(row("p", "1", 4).with_etag(ETag::wildcard())),
            )
            .await;
        assert!(forced.is_ok());
    }

    #[tokio::test]
    async fn replace_and_delete_of_missing_row_fail() {
        let store = store_with_table().await;
        let err = store
            .execute(
                "t",
                TableOperation::Replace(row("p", "x", 1).with_etag(ETag::wildcard())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ResourceNotFound { .. }));

        let err = store
            .execute(
                "t",
                TableOperation::Delete {
                    keys: RowKeyPair::new("p", "x"),
                    etag: ETag::wildcard(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn merge_keeps_unmentioned_properties() {
        let store = store_with_table().await;
        store
            .execute(
                "t",
                TableOperation::Insert(row("p", "1", 1).with_property("Name", "a")),
            )
            .await
            .unwrap();
        let merged = store
            .execute("t", TableOperation::InsertOrMerge(row("p", "1", 2)))
            .await
            .unwrap()
            .row
            .unwrap();
        assert_eq!(merged.properties.get("Name"), Some(&RowProperty::from("a")));
        assert_eq!(merged.properties.get("Value"), Some(&RowProperty::Int32(2)));

        let replaced = store
            .execute("t", TableOperation::InsertOrReplace(row("p", "1", 3)))
            .await
            .unwrap()
            .row
            .unwrap();
        assert!(replaced.properties.get("Name").is_none());
    }

    #[tokio::test]
    async fn retrieve_of_missing_row_is_empty() {
        let store = store_with_table().await;
        let result = store
            .execute("t", TableOperation::Retrieve(RowKeyPair::new("p", "x")))
            .await
            .unwrap();
        assert!(!result.is_found());
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = store_with_table().await;
        store
            .execute("t", TableOperation::Insert(row("p", "2", 0)))
            .await
            .unwrap();

        let batch: TableBatch = ["1", "2", "3"]
            .iter()
            .map(|rk| TableOperation::Insert(row("p", rk, 1)))
            .collect();
        let err = store.execute_batch("t", batch).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchOperationFailed { index: 1, .. }));
        assert_eq!(store.row_count("t").unwrap(), 1);
    }

    #[tokio::test]
    async fn batch_rules_are_enforced() {
        let store = store_with_table().await;

        let oversized: TableBatch = (0..=MAX_BATCH_OPERATIONS)
            .map(|i| TableOperation::Insert(row("p", &i.to_string(), 1)))
            .collect();
        assert!(matches!(
            store.execute_batch("t", oversized).await,
            Err(StoreError::InvalidBatch(_))
        ));

        let mixed: TableBatch = vec![
            TableOperation::Insert(row("a", "1", 1)),
            TableOperation::Insert(row("b", "1", 1)),
        ]
        .into();
        assert!(matches!(
            store.execute_batch("t", mixed).await,
            Err(StoreError::InvalidBatch(_))
        ));

        let duplicated: TableBatch = vec![
            TableOperation::Insert(row("a", "1", 1)),
            TableOperation::InsertOrReplace(row("a", "1", 2)),
        ]
        .into();
        assert!(matches!(
            store.execute_batch("t", duplicated).await,
            Err(StoreError::InvalidBatch(_))
        ));

        assert!(matches!(
            store.execute_batch("t", TableBatch::new()).await,
            Err(StoreError::InvalidBatch(_))
        ));
    }

    #[tokio::test]
    async fn scans_page_with_tokens() {
        let store = store_with_table().await.with_page_size(2);
        for i in 0..5 {
            store
                .execute("t", TableOperation::Insert(row("p", &i.to_string(), i)))
                .await
                .unwrap();
        }

        let query = TableQuery::new();
        let mut token = None;
        let mut seen = Vec::new();
        let mut pages = 0;
        loop {
            let segment = store.query_segment("t", &query, token).await.unwrap();
            pages += 1;
            seen.extend(segment.results.into_iter().map(|r| r.row_key));
            token = segment.continuation_token;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(seen, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn scans_filter_and_project() {
        let store = store_with_table().await;
        for i in 0..4 {
            store
                .execute(
                    "t",
                    TableOperation::Insert(row("p", &i.to_string(), i).with_property("Name", "n")),
                )
                .await
                .unwrap();
        }
        let query = TableQuery::new()
            .with_filter(Filter::compare("Value", crate::filter::ComparisonOp::Ge, 2))
            .select(["Value"]);
        let segment = store.query_segment("t", &query, None).await.unwrap();
        assert!(segment.is_last());
        assert_eq!(segment.results.len(), 2);
        assert!(segment.results.iter().all(|r| !r.properties.contains_key("Name")));
    }

    #[tokio::test]
    async fn malformed_token_is_rejected() {
        let store = store_with_table().await;
        let err = store
            .query_segment("t", &TableQuery::new(), Some(ContinuationToken::new("%%%")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }
}
