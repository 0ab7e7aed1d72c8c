//! Entity proxies - per-type addressing and row conversion.
//!
//! An [`EntityProxy`] is the strategy one entity type uses to live in a
//! table: how its id maps onto `(PartitionKey, RowKey)`, which version tag
//! writes carry by default, and how rows are turned back into entities.
//! The [`ProxyFactory`] selects the registered strategy per entity type and
//! hands out [`BoundProxy`] instances tied to one entity, id or key pair.

mod bound;
mod factory;
mod strategies;

use crate::entity::TableEntity;
use crate::error::RepositoryResult;
use crate::filter::Filter;
use crate::row::{ETag, RowProperties, TableRow, PARTITION_KEY};
use crate::store::RowResult;

pub use bound::BoundProxy;
pub use factory::ProxyFactory;
pub use strategies::{IdPartitionProxy, SharedPartitionProxy};

/// How an entity type is addressed, versioned and (de)serialized in a table.
pub trait EntityProxy<E: TableEntity>: Send + Sync {
    /// Partition key for `id`. `None` asks for the partition-key family
    /// shared by every row of this entity type.
    fn build_partition_key(&self, id: Option<&str>) -> String;

    fn build_row_key(&self, id: &str) -> String;

    /// Version tag presented by writes when the caller holds none.
    ///
    /// Defaults to the wildcard (last write wins). Returning `None` makes the
    /// repository fetch the row's current tag before updating or deleting it.
    fn build_etag(&self) -> Option<ETag> {
        Some(ETag::wildcard())
    }

    /// Filter confining scans to this entity type's rows.
    fn partition_scope(&self) -> Option<Filter> {
        Some(Filter::eq(PARTITION_KEY, self.build_partition_key(None)))
    }

    /// Hydrates a fresh entity from row properties.
    fn read_row(&self, properties: &RowProperties) -> RepositoryResult<E> {
        E::read_properties(properties)
    }

    fn write_row(&self, entity: &E) -> RepositoryResult<RowProperties> {
        entity.write_properties()
    }

    /// Converts a scanned row, or returns `None` for rows outside this type's
    /// partition-key family so that mixed tables can be scanned safely.
    fn resolve_entity(&self, row: &TableRow) -> RepositoryResult<Option<E>> {
        if row.partition_key != self.build_partition_key(None) {
            return Ok(None);
        }
        self.hydrate(row).map(Some)
    }

    /// Reads a row into an entity, carrying over its tag and timestamp.
    fn hydrate(&self, row: &TableRow) -> RepositoryResult<E> {
        let mut entity = self.read_row(&row.properties)?;
        if let Some(etag) = &row.etag {
            entity.set_etag(etag.clone());
        }
        if let Some(timestamp) = row.timestamp {
            entity.set_timestamp(timestamp);
        }
        Ok(entity)
    }

    /// `None` when the operation found no row; not-found is not an error here.
    fn entity_from_row_result(&self, result: &RowResult) -> RepositoryResult<Option<E>> {
        result.row.as_ref().map(|row| self.hydrate(row)).transpose()
    }
}
