mod table;

use async_trait::async_trait;

use crate::entity::TableEntity;
use crate::error::RepositoryResult;

pub use table::TableRepository;

/// CRUD surface over one logical table of `E` entities.
///
/// Point lookups report a missing row as `Ok(None)`. Mutations of a missing
/// row fail with `NotFound`, stale version tags with `Conflict`.
#[async_trait]
pub trait EntityRepository<E: TableEntity>: Send + Sync {
    /// Inserts a new row; `Conflict` if its keys are taken.
    async fn add(&self, entity: &E) -> RepositoryResult<E>;

    /// Inserts every entity, batched, returning them in submission order.
    async fn add_range(&self, entities: &[E]) -> RepositoryResult<Vec<E>>;

    /// Every entity of this type, across all pages.
    async fn get_all(&self) -> RepositoryResult<Vec<E>>;

    async fn get(&self, id: &str) -> RepositoryResult<Option<E>>;

    /// Conditioned replace guarded by the entity's version tag.
    async fn update(&self, entity: &E) -> RepositoryResult<E>;

    async fn remove(&self, entity: &E) -> RepositoryResult<()>;

    async fn remove_by_id(&self, id: &str) -> RepositoryResult<()>;
}
