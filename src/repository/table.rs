use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use super::EntityRepository;
use crate::batch::{TableBatch, TableOperation};
use crate::config::TableRepositoryConfig;
use crate::entity::TableEntity;
use crate::error::{RepositoryError, RepositoryResult};
use crate::filter::Filter;
use crate::proxy::{BoundProxy, ProxyFactory};
use crate::query::TableQuery;
use crate::row::{ETag, RowKeyPair, RowProperties};
use crate::store::{RowResult, TableClient, TableStore};

/// Repository of `E` entities stored in one table.
///
/// Addressing and row conversion come from the proxy registered for `E` in
/// the [`ProxyFactory`]. The table is created on first use (at most once per
/// repository, even under concurrent first calls) unless
/// [`TableRepositoryConfig::create_table_if_not_exists`] is off.
pub struct TableRepository<E, S: ?Sized = dyn TableStore> {
    client: TableClient<S>,
    proxies: ProxyFactory,
    config: TableRepositoryConfig,
    table_ready: OnceCell<()>,
    _marker: PhantomData<fn() -> E>,
}

impl<E, S> TableRepository<E, S>
where
    E: TableEntity,
    S: TableStore + ?Sized,
{
    /// Builds a repository without touching the store; the table is ensured
    /// lazily by the first operation.
    pub fn new(
        store: Arc<S>,
        table_name: &str,
        proxies: ProxyFactory,
        config: TableRepositoryConfig,
    ) -> RepositoryResult<Self> {
        if table_name.is_empty() {
            return Err(RepositoryError::InvalidArgument(
                "table name must not be empty".into(),
            ));
        }
        config.validate()?;
        // Fail at construction rather than on first call when no proxy is wired.
        proxies.proxy::<E>()?;

        Ok(Self {
            client: TableClient::new(store, table_name),
            proxies,
            config,
            table_ready: OnceCell::new(),
            _marker: PhantomData,
        })
    }

    /// Builds a repository and waits for the table to exist.
    pub async fn connect(
        store: Arc<S>,
        table_name: &str,
        proxies: ProxyFactory,
        config: TableRepositoryConfig,
    ) -> RepositoryResult<Self> {
        let repository = Self::new(store, table_name, proxies, config)?;
        repository.ensure_table().await?;
        Ok(repository)
    }

    pub fn table_name(&self) -> &str {
        self.client.name()
    }

    pub fn config(&self) -> &TableRepositoryConfig {
        &self.config
    }

    /// Makes sure the table exists. Only the first successful call reaches
    /// the store; concurrent callers wait for it.
    pub async fn ensure_table(&self) -> RepositoryResult<()> {
        self.table_ready
            .get_or_try_init(|| self.prepare_table())
            .await
            .map(|_| ())
    }

    async fn prepare_table(&self) -> RepositoryResult<()> {
        if self.config.create_table_if_not_exists {
            if self.client.create_if_not_exists().await? {
                info!(table = self.table_name(), "created table");
            }
            return Ok(());
        }
        if self.client.exists().await? {
            Ok(())
        } else {
            Err(RepositoryError::Configuration(format!(
                "table {} does not exist and creation is disabled",
                self.table_name()
            )))
        }
    }

    pub async fn add(&self, entity: &E) -> RepositoryResult<E> {
        self.ensure_table().await?;
        let proxy = self.entity_proxy(entity)?;
        let result = self
            .client
            .execute(TableOperation::Insert(proxy.to_row()?))
            .await?;
        hydrate_written(proxy, &result)
    }

    pub async fn add_range(&self, entities: &[E]) -> RepositoryResult<Vec<E>> {
        self.ensure_table().await?;
        let proxies = entities
            .iter()
            .map(|entity| self.entity_proxy(entity))
            .collect::<RepositoryResult<Vec<_>>>()?;
        let operations = proxies
            .iter()
            .map(|proxy| proxy.to_row().map(TableOperation::Insert))
            .collect::<RepositoryResult<Vec<_>>>()?;
        self.write_all(proxies, operations).await
    }

    pub async fn get_all(&self) -> RepositoryResult<Vec<E>> {
        self.query(TableQuery::new()).await
    }

    /// Point lookup by id. `Ok(None)` when no row exists.
    pub async fn get(&self, id: &str) -> RepositoryResult<Option<E>> {
        require("id", id)?;
        let proxy = self.proxies.build_for_id::<E>(id)?;
        let result = self.retrieve(proxy.keys()).await?;
        proxy.entity_from_row_result(&result)
    }

    /// Point lookup bypassing id derivation.
    pub async fn get_by_keys(&self, partition_key: &str, row_key: &str) -> RepositoryResult<Option<E>> {
        require("partition key", partition_key)?;
        require("row key", row_key)?;
        let proxy = self.proxies.build_for_keys::<E>(partition_key, row_key)?;
        let result = self.retrieve(proxy.keys()).await?;
        proxy.entity_from_row_result(&result)
    }

    /// Raw outcome of a point lookup by id.
    pub async fn get_row_result(&self, id: &str) -> RepositoryResult<RowResult> {
        require("id", id)?;
        let proxy = self.proxies.build_for_id::<E>(id)?;
        self.retrieve(proxy.keys()).await
    }

    pub async fn get_row_result_by_keys(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> RepositoryResult<RowResult> {
        require("partition key", partition_key)?;
        require("row key", row_key)?;
        self.retrieve(RowKeyPair::new(partition_key, row_key)).await
    }

    /// Runs a paged scan to exhaustion. Rows that belong to other entity
    /// kinds are skipped.
    pub async fn query(&self, mut query: TableQuery) -> RepositoryResult<Vec<E>> {
        self.ensure_table().await?;
        if query.take.is_none() {
            query.take = self.config.query_page_size;
        }

        let proxy = self.proxies.build::<E>()?;
        let mut entities = Vec::new();
        let mut token = None;
        let mut pages = 0usize;
        loop {
            let segment = self.client.query_segment(&query, token).await?;
            pages += 1;
            for row in &segment.results {
                if let Some(entity) = proxy.resolve_entity(row)? {
                    entities.push(entity);
                }
            }
            token = segment.continuation_token;
            if token.is_none() {
                break;
            }
        }

        debug!(
            table = self.table_name(),
            pages,
            results = entities.len(),
            "query complete"
        );
        Ok(entities)
    }

    /// Query with a raw filter string such as `Name eq 'x' and Age gt 3`.
    pub async fn get_by_filter(&self, filter: &str) -> RepositoryResult<Vec<E>> {
        require("filter", filter)?;
        let filter = Filter::parse(filter)
            .map_err(|e| RepositoryError::InvalidArgument(e.to_string()))?;
        self.query(TableQuery::new().with_filter(filter)).await
    }

    /// Entities of this kind whose properties equal every given value. An
    /// empty map returns every entity of the kind.
    pub async fn get_by_properties(&self, properties: &RowProperties) -> RepositoryResult<Vec<E>> {
        let proxy = self.proxies.proxy::<E>()?;
        let conditions = proxy.partition_scope().into_iter().chain(
            properties
                .iter()
                .map(|(name, value)| Filter::eq(name.as_str(), value.clone())),
        );

        let mut query = TableQuery::new();
        query.filter = Filter::all(conditions);
        self.query(query).await
    }

    pub async fn update(&self, entity: &E) -> RepositoryResult<E> {
        self.ensure_table().await?;
        let mut proxy = self.entity_proxy(entity)?;
        self.resolve_etag(&mut proxy).await?;
        let result = self
            .client
            .execute(TableOperation::Replace(proxy.to_row()?))
            .await?;
        hydrate_written(proxy, &result)
    }

    /// Conditioned replace of every entity, batched. Each entity's tag is
    /// resolved the same way as in [`update`](Self::update).
    pub async fn update_range(&self, entities: &[E]) -> RepositoryResult<Vec<E>> {
        self.ensure_table().await?;
        let mut proxies = Vec::with_capacity(entities.len());
        let mut operations = Vec::with_capacity(entities.len());
        for entity in entities {
            let mut proxy = self.entity_proxy(entity)?;
            self.resolve_etag(&mut proxy).await?;
            operations.push(TableOperation::Replace(proxy.to_row()?));
            proxies.push(proxy);
        }
        self.write_all(proxies, operations).await
    }

    /// Unconditional upsert that keeps stored properties the entity does not write.
    pub async fn insert_or_merge(&self, entity: &E) -> RepositoryResult<E> {
        self.ensure_table().await?;
        let proxy = self.entity_proxy(entity)?;
        let result = self
            .client
            .execute(TableOperation::InsertOrMerge(proxy.to_row()?))
            .await?;
        hydrate_written(proxy, &result)
    }

    /// Unconditional upsert; last write wins.
    pub async fn insert_or_replace(&self, entity: &E) -> RepositoryResult<E> {
        self.ensure_table().await?;
        let proxy = self.entity_proxy(entity)?;
        let result = self
            .client
            .execute(TableOperation::InsertOrReplace(proxy.to_row()?))
            .await?;
        hydrate_written(proxy, &result)
    }

    pub async fn insert_or_replace_range(&self, entities: &[E]) -> RepositoryResult<Vec<E>> {
        self.ensure_table().await?;
        let proxies = entities
            .iter()
            .map(|entity| self.entity_proxy(entity))
            .collect::<RepositoryResult<Vec<_>>>()?;
        let operations = proxies
            .iter()
            .map(|proxy| proxy.to_row().map(TableOperation::InsertOrReplace))
            .collect::<RepositoryResult<Vec<_>>>()?;
        self.write_all(proxies, operations).await
    }

    pub async fn remove(&self, entity: &E) -> RepositoryResult<()> {
        self.ensure_table().await?;
        let proxy = self.entity_proxy(entity)?;
        self.delete(proxy).await
    }

    pub async fn remove_by_id(&self, id: &str) -> RepositoryResult<()> {
        require("id", id)?;
        self.ensure_table().await?;
        let proxy = self.proxies.build_for_id::<E>(id)?;
        self.delete(proxy).await
    }

    fn entity_proxy(&self, entity: &E) -> RepositoryResult<BoundProxy<E>> {
        require("id", entity.id())?;
        self.proxies.build_for_entity(entity)
    }

    async fn retrieve(&self, keys: RowKeyPair) -> RepositoryResult<RowResult> {
        self.ensure_table().await?;
        self.client.execute(TableOperation::Retrieve(keys)).await
    }

    async fn delete(&self, mut proxy: BoundProxy<E>) -> RepositoryResult<()> {
        let etag = self.resolve_etag(&mut proxy).await?;
        self.client
            .execute(TableOperation::Delete {
                keys: proxy.keys(),
                etag,
            })
            .await?;
        Ok(())
    }

    /// Settles the tag a conditioned write presents. When neither the caller
    /// nor the proxy strategy supplies one, the stored row's current tag is
    /// fetched; a missing row is `NotFound`.
    async fn resolve_etag(&self, proxy: &mut BoundProxy<E>) -> RepositoryResult<ETag> {
        if let Some(etag) = proxy.etag() {
            return Ok(etag);
        }

        let keys = proxy.keys();
        debug!(
            table = self.table_name(),
            partition_key = %keys.partition_key,
            row_key = %keys.row_key,
            "fetching current version tag"
        );
        let result = self
            .client
            .execute(TableOperation::Retrieve(keys.clone()))
            .await?;
        let etag = result
            .etag
            .or_else(|| result.row.and_then(|row| row.etag))
            .ok_or_else(|| RepositoryError::NotFound {
                table: self.table_name().to_string(),
                partition_key: keys.partition_key,
                row_key: keys.row_key,
            })?;
        proxy.set_etag(etag.clone());
        Ok(etag)
    }

    /// Submits `operations` in batches no larger than the configured ceiling,
    /// one after another, and hydrates the results against `proxies`.
    async fn write_all(
        &self,
        proxies: Vec<BoundProxy<E>>,
        operations: Vec<TableOperation>,
    ) -> RepositoryResult<Vec<E>> {
        let results = self.execute_limited_batches(operations).await?;
        if results.len() != proxies.len() {
            return Err(RepositoryError::Transport(format!(
                "store returned {} results for {} operations",
                results.len(),
                proxies.len()
            )));
        }
        proxies
            .into_iter()
            .zip(results.iter())
            .map(|(proxy, result)| hydrate_written(proxy, result))
            .collect()
    }

    async fn execute_limited_batches(
        &self,
        operations: Vec<TableOperation>,
    ) -> RepositoryResult<Vec<RowResult>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let total = operations.len();
        let chunks = TableBatch::from(operations).into_chunks(self.config.max_batch_operations);
        let chunk_count = chunks.len();
        debug!(
            table = self.table_name(),
            operations = total,
            chunks = chunk_count,
            "submitting batched writes"
        );

        let mut results = Vec::with_capacity(total);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let size = chunk.len();
            match self.client.execute_batch(chunk).await {
                Ok(chunk_results) => results.extend(chunk_results),
                Err(err) => {
                    error!(
                        table = self.table_name(),
                        chunk = index,
                        chunks = chunk_count,
                        operations = size,
                        error = %err,
                        "batch chunk failed"
                    );
                    return Err(err);
                }
            }
        }
        Ok(results)
    }
}

/// Entity as written: re-read from the echoed row, or the submitted entity
/// with the new tag when the store echoed none.
fn hydrate_written<E: TableEntity>(proxy: BoundProxy<E>, result: &RowResult) -> RepositoryResult<E> {
    if let Some(entity) = proxy.entity_from_row_result(result)? {
        return Ok(entity);
    }

    let mut entity = proxy.into_entity().ok_or_else(|| {
        RepositoryError::InvalidArgument("write was not bound to an entity".into())
    })?;
    if let Some(etag) = &result.etag {
        entity.set_etag(etag.clone());
    }
    if let Some(timestamp) = result.timestamp {
        entity.set_timestamp(timestamp);
    }
    Ok(entity)
}

fn require(what: &str, value: &str) -> RepositoryResult<()> {
    if value.is_empty() {
        return Err(RepositoryError::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(())
}

#[async_trait]
impl<E, S> EntityRepository<E> for TableRepository<E, S>
where
    E: TableEntity,
    S: TableStore + ?Sized + 'static,
{
    async fn add(&self, entity: &E) -> RepositoryResult<E> {
        TableRepository::add(self, entity).await
    }

    async fn add_range(&self, entities: &[E]) -> RepositoryResult<Vec<E>> {
        TableRepository::add_range(self, entities).await
    }

    async fn get_all(&self) -> RepositoryResult<Vec<E>> {
        TableRepository::get_all(self).await
    }

    async fn get(&self, id: &str) -> RepositoryResult<Option<E>> {
        TableRepository::get(self, id).await
    }

    async fn update(&self, entity: &E) -> RepositoryResult<E> {
        TableRepository::update(self, entity).await
    }

    async fn remove(&self, entity: &E) -> RepositoryResult<()> {
        TableRepository::remove(self, entity).await
    }

    async fn remove_by_id(&self, id: &str) -> RepositoryResult<()> {
        TableRepository::remove_by_id(self, id).await
    }
}
