use std::sync::Arc;

use super::{BoundProxy, EntityProxy};
use crate::entity::TableEntity;
use crate::error::RepositoryResult;
use crate::resolver::ComponentRegistry;

/// Selects the proxy strategy registered for an entity type.
#[derive(Clone)]
pub struct ProxyFactory {
    registry: Arc<ComponentRegistry>,
}

impl ProxyFactory {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Registers the strategy used for every `E`.
    pub fn register<E, P>(&self, proxy: P) -> RepositoryResult<()>
    where
        E: TableEntity,
        P: EntityProxy<E> + 'static,
    {
        self.registry
            .register::<dyn EntityProxy<E>>(Arc::new(proxy) as Arc<dyn EntityProxy<E>>)
    }

    /// The registered strategy itself.
    pub fn proxy<E: TableEntity>(&self) -> RepositoryResult<Arc<dyn EntityProxy<E>>> {
        self.registry.resolve::<dyn EntityProxy<E>>()
    }

    pub fn build<E: TableEntity>(&self) -> RepositoryResult<BoundProxy<E>> {
        Ok(BoundProxy::fresh(self.proxy::<E>()?))
    }

    pub fn build_for_entity<E: TableEntity>(&self, entity: &E) -> RepositoryResult<BoundProxy<E>> {
        Ok(BoundProxy::for_entity(self.proxy::<E>()?, entity.clone()))
    }

    pub fn build_for_id<E: TableEntity>(&self, id: &str) -> RepositoryResult<BoundProxy<E>> {
        Ok(BoundProxy::for_id(self.proxy::<E>()?, id))
    }

    pub fn build_for_keys<E: TableEntity>(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> RepositoryResult<BoundProxy<E>> {
        Ok(BoundProxy::for_keys(
            self.proxy::<E>()?,
            partition_key,
            row_key,
        ))
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new(Arc::new(ComponentRegistry::new()))
    }
}
