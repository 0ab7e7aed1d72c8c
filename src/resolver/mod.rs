//! Component resolution.
//!
//! [`ComponentRegistry`] is a type-keyed registry: a component is registered
//! once as an `Arc<T>` (where `T` may be a trait object) and resolved by the
//! same type later, optionally under a name. Failing to resolve is a wiring
//! mistake and surfaces as [`RepositoryError::Configuration`].

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{RepositoryError, RepositoryResult};

type Boxed = Box<dyn Any + Send + Sync>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct ComponentKey {
    type_id: TypeId,
    name: Option<Arc<str>>,
}

impl ComponentKey {
    fn of<T: ?Sized + 'static>(name: Option<&str>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: name.map(Arc::from),
        }
    }
}

/// Type-keyed registry of shared components.
#[derive(Default)]
pub struct ComponentRegistry {
    components: RwLock<HashMap<ComponentKey, Boxed>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `component` as the unnamed `T`, replacing any previous one.
    pub fn register<T>(&self, component: Arc<T>) -> RepositoryResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(ComponentKey::of::<T>(None), component)
    }

    pub fn register_named<T>(&self, name: &str, component: Arc<T>) -> RepositoryResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(ComponentKey::of::<T>(Some(name)), component)
    }

    pub fn resolve<T>(&self) -> RepositoryResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.lookup::<T>(None)
    }

    pub fn resolve_named<T>(&self, name: &str) -> RepositoryResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.lookup::<T>(Some(name))
    }

    pub async fn resolve_async<T>(&self) -> RepositoryResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<T>()
    }

    pub async fn resolve_named_async<T>(&self, name: &str) -> RepositoryResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_named::<T>(name)
    }

    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.components
            .read()
            .map(|components| components.contains_key(&ComponentKey::of::<T>(None)))
            .unwrap_or(false)
    }

    fn insert<T>(&self, key: ComponentKey, component: Arc<T>) -> RepositoryResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut components = self.components.write().map_err(|_| poisoned())?;
        components.insert(key, Box::new(component));
        Ok(())
    }

    fn lookup<T>(&self, name: Option<&str>) -> RepositoryResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let components = self.components.read().map_err(|_| poisoned())?;
        components
            .get(&ComponentKey::of::<T>(name))
            .and_then(|boxed| boxed.downcast_ref::<Arc<T>>())
            .cloned()
            .ok_or_else(|| {
                RepositoryError::Configuration(match name {
                    Some(name) => format!("no {} registered as `{}`", type_name::<T>(), name),
                    None => format!("no {} registered", type_name::<T>()),
                })
            })
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Configuration("component registry lock poisoned".into())
}

/// Hands out repositories registered in a [`ComponentRegistry`].
#[derive(Clone)]
pub struct RepositoryFactory {
    registry: Arc<ComponentRegistry>,
}

impl RepositoryFactory {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    /// Resolves the repository registered under `R`, typically
    /// `dyn EntityRepository<E>` or a concrete `TableRepository`.
    pub fn get_repository<R>(&self) -> RepositoryResult<Arc<R>>
    where
        R: ?Sized + Send + Sync + 'static,
    {
        self.registry.resolve::<R>()
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }
}
