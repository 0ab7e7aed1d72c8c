use std::marker::PhantomData;

use super::EntityProxy;
use crate::entity::TableEntity;
use crate::error::RepositoryResult;
use crate::filter::Filter;
use crate::row::{ETag, TableRow};

/// Every entity of the type shares one constant partition key; the row key
/// is the id. Lets several entity kinds coexist in one table, each in its
/// own partition.
pub struct SharedPartitionProxy<E> {
    partition_key: String,
    optimistic: bool,
    _marker: PhantomData<fn() -> E>,
}

impl<E> SharedPartitionProxy<E> {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            optimistic: false,
            _marker: PhantomData,
        }
    }

    /// Writes without a caller-held tag fetch the stored tag first instead
    /// of using the wildcard.
    pub fn with_optimistic_concurrency(mut self) -> Self {
        self.optimistic = true;
        self
    }
}

impl<E: TableEntity> EntityProxy<E> for SharedPartitionProxy<E> {
    fn build_partition_key(&self, _id: Option<&str>) -> String {
        self.partition_key.clone()
    }

    fn build_row_key(&self, id: &str) -> String {
        id.to_string()
    }

    fn build_etag(&self) -> Option<ETag> {
        if self.optimistic {
            None
        } else {
            Some(ETag::wildcard())
        }
    }
}

/// Each entity gets its own partition: partition key and row key are both
/// the id. Rows of this shape are recognised by `PartitionKey == RowKey`.
pub struct IdPartitionProxy<E> {
    _marker: PhantomData<fn() -> E>,
}

impl<E> IdPartitionProxy<E> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E> Default for IdPartitionProxy<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TableEntity> EntityProxy<E> for IdPartitionProxy<E> {
    fn build_partition_key(&self, id: Option<&str>) -> String {
        id.unwrap_or_default().to_string()
    }

    fn build_row_key(&self, id: &str) -> String {
        id.to_string()
    }

    fn partition_scope(&self) -> Option<Filter> {
        None
    }

    fn resolve_entity(&self, row: &TableRow) -> RepositoryResult<Option<E>> {
        if row.partition_key != row.row_key {
            return Ok(None);
        }
        self.hydrate(row).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepositoryResult;
    use crate::row::{read_field, write_field, RowProperties};

    #[derive(Clone, Debug, PartialEq)]
    struct Note {
        id: String,
        text: String,
    }

    impl TableEntity for Note {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn write_properties(&self) -> RepositoryResult<RowProperties> {
            let mut properties = RowProperties::new();
            write_field(&mut properties, "id", &self.id);
            write_field(&mut properties, "Text", &self.text);
            Ok(properties)
        }

        fn read_properties(properties: &RowProperties) -> RepositoryResult<Self> {
            Ok(Self {
                id: read_field(properties, "id")?,
                text: read_field(properties, "Text")?,
            })
        }
    }

    fn note_row(pk: &str, rk: &str) -> TableRow {
        TableRow::new(pk, rk)
            .with_property("id", rk)
            .with_property("Text", "hello")
    }

    #[test]
    fn shared_partition_keys_are_stable() {
        let proxy = SharedPartitionProxy::<Note>::new("notes");
        for id in ["a", "b", "a"] {
            assert_eq!(proxy.build_partition_key(Some(id)), "notes");
            assert_eq!(proxy.build_row_key(id), id);
        }
        assert_eq!(proxy.build_partition_key(None), "notes");
    }

    #[test]
    fn optimistic_mode_has_no_default_tag() {
        let lww = SharedPartitionProxy::<Note>::new("notes");
        assert_eq!(lww.build_etag(), Some(ETag::wildcard()));
        let optimistic = SharedPartitionProxy::<Note>::new("notes").with_optimistic_concurrency();
        assert_eq!(optimistic.build_etag(), None);
    }

    #[test]
    fn shared_partition_skips_foreign_rows() {
        let proxy = SharedPartitionProxy::<Note>::new("notes");
        let own = proxy.resolve_entity(&note_row("notes", "1")).unwrap();
        assert_eq!(own.map(|n| n.id), Some("1".to_string()));
        assert!(proxy.resolve_entity(&note_row("tasks", "1")).unwrap().is_none());
    }

    #[test]
    fn id_partition_recognises_its_rows() {
        let proxy = IdPartitionProxy::<Note>::new();
        assert_eq!(proxy.build_partition_key(Some("x")), "x");
        assert!(proxy.partition_scope().is_none());
        assert!(proxy.resolve_entity(&note_row("x", "x")).unwrap().is_some());
        assert!(proxy.resolve_entity(&note_row("notes", "x")).unwrap().is_none());
    }

    #[test]
    fn hydrate_carries_tag_but_plain_entities_ignore_it() {
        let proxy = SharedPartitionProxy::<Note>::new("notes");
        let row = note_row("notes", "1").with_etag(ETag::new("W/\"3\""));
        let note = proxy.hydrate(&row).unwrap();
        assert_eq!(note.etag(), None);
        assert_eq!(note.text, "hello");
    }
}
