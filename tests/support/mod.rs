#![allow(dead_code)]

pub mod entities;
pub mod recording_store;

use std::sync::Arc;

use tabled_rust::{ProxyFactory, SharedPartitionProxy, TableRepository, TableRepositoryConfig};

use entities::{Customer, Order};
use recording_store::RecordingStore;

pub const TABLE: &str = "shop";

/// Proxy factory wired for the test entities: customers and orders share one
/// table, each in its own partition.
pub fn proxies() -> ProxyFactory {
    let factory = ProxyFactory::default();
    factory
        .register::<Customer, _>(SharedPartitionProxy::new("customers"))
        .expect("register customer proxy");
    factory
        .register::<Order, _>(SharedPartitionProxy::new("orders"))
        .expect("register order proxy");
    factory
}

pub fn customers(
    store: &Arc<RecordingStore>,
    config: TableRepositoryConfig,
) -> TableRepository<Customer, RecordingStore> {
    TableRepository::new(store.clone(), TABLE, proxies(), config).expect("customer repository")
}

pub fn orders(store: &Arc<RecordingStore>) -> TableRepository<Order, RecordingStore> {
    TableRepository::new(store.clone(), TABLE, proxies(), TableRepositoryConfig::default())
        .expect("order repository")
}
