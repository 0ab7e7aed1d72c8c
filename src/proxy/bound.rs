use std::sync::Arc;

use super::EntityProxy;
use crate::entity::TableEntity;
use crate::error::{RepositoryError, RepositoryResult};
use crate::row::{is_reserved_property, ETag, RowKeyPair, TableRow};
use crate::store::RowResult;

/// A proxy strategy bound to one entity, id or key pair.
///
/// Created by [`ProxyFactory`](super::ProxyFactory). A bound proxy is used for
/// a single operation and then dropped.
pub struct BoundProxy<E: TableEntity> {
    strategy: Arc<dyn EntityProxy<E>>,
    entity: Option<E>,
    partition_key: String,
    row_key: String,
    etag: Option<ETag>,
}

impl<E: TableEntity> BoundProxy<E> {
    /// Unbound instance, used to resolve scanned rows.
    pub fn fresh(strategy: Arc<dyn EntityProxy<E>>) -> Self {
        Self {
            strategy,
            entity: None,
            partition_key: String::new(),
            row_key: String::new(),
            etag: None,
        }
    }

    pub fn for_entity(strategy: Arc<dyn EntityProxy<E>>, entity: E) -> Self {
        let id = entity.id().to_string();
        let mut proxy = Self::for_id(strategy, &id);
        proxy.entity = Some(entity);
        proxy
    }

    pub fn for_id(strategy: Arc<dyn EntityProxy<E>>, id: &str) -> Self {
        let partition_key = strategy.build_partition_key(Some(id));
        let row_key = strategy.build_row_key(id);
        Self::for_keys(strategy, partition_key, row_key)
    }

    pub fn for_keys(
        strategy: Arc<dyn EntityProxy<E>>,
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
    ) -> Self {
        Self {
            strategy,
            entity: None,
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag: None,
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn row_key(&self) -> &str {
        &self.row_key
    }

    pub fn keys(&self) -> RowKeyPair {
        RowKeyPair::new(self.partition_key.clone(), self.row_key.clone())
    }

    pub fn entity(&self) -> Option<&E> {
        self.entity.as_ref()
    }

    pub fn into_entity(self) -> Option<E> {
        self.entity
    }

    /// Overrides the tag this proxy presents on writes.
    pub fn set_etag(&mut self, etag: ETag) {
        self.etag = Some(etag);
    }

    /// Tag presented on writes: an explicitly set tag, else the non-empty tag
    /// held by the entity, else the strategy's default. `None` means the
    /// stored tag has to be fetched first.
    pub fn etag(&self) -> Option<ETag> {
        if let Some(etag) = &self.etag {
            return Some(etag.clone());
        }
        if let Some(etag) = self.entity.as_ref().and_then(|e| e.etag()) {
            if !etag.is_empty() {
                return Some(etag.clone());
            }
        }
        self.strategy.build_etag()
    }

    /// Serializes the bound entity into a row addressed by this proxy's keys.
    pub fn to_row(&self) -> RepositoryResult<TableRow> {
        let entity = self.entity.as_ref().ok_or_else(|| {
            RepositoryError::InvalidArgument("proxy is not bound to an entity".into())
        })?;
        let properties = self.strategy.write_row(entity)?;
        if let Some(name) = properties.keys().find(|name| is_reserved_property(name)) {
            return Err(RepositoryError::mapping(
                name,
                "property name is reserved by the table store",
            ));
        }

        let mut row = TableRow::new(self.partition_key.clone(), self.row_key.clone())
            .with_properties(properties);
        row.etag = self.etag();
        Ok(row)
    }

    pub fn resolve_entity(&self, row: &TableRow) -> RepositoryResult<Option<E>> {
        self.strategy.resolve_entity(row)
    }

    pub fn hydrate(&self, row: &TableRow) -> RepositoryResult<E> {
        self.strategy.hydrate(row)
    }

    pub fn entity_from_row_result(&self, result: &RowResult) -> RepositoryResult<Option<E>> {
        self.strategy.entity_from_row_result(result)
    }
}
