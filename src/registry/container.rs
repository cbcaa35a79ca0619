//! The component container.
//!
//! # Responsibilities
//! - Register components by id with a scope and a factory
//! - Resolve instances by id (typed or untyped)
//! - Eagerly build all singletons on [`Registry::initialize`]
//! - Detect circular construction instead of deadlocking
//!
//! # Design Decisions
//! - Registration needs `&mut self`, resolution only `&self`; after
//!   initialization the registry is shared behind an `Arc`
//! - Singletons live in a `OnceCell`, so concurrent first use builds once
//! - The construction stack is thread-local; factories run synchronously

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use super::component::{Component, EndpointComponent, Instance, Scope};
use super::RegistryError;
use crate::binder::{Endpoint, EndpointShape};
use crate::serialization::{JsonSerializer, Serializer, SERIALIZER_ID};

thread_local! {
    static CONSTRUCTING: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Marks a component as under construction on this thread.
struct ConstructionGuard;

impl ConstructionGuard {
    fn enter(id: &str) -> Result<Self, RegistryError> {
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|c| c == id) {
                let mut chain = stack.clone();
                chain.push(id.to_string());
                return Err(RegistryError::CircularDependency(chain));
            }
            stack.push(id.to_string());
            Ok(ConstructionGuard)
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Id-addressed component container.
pub struct Registry {
    components: HashMap<String, Component>,
    order: Vec<String>,
    initialized: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry with the default JSON serializer installed.
    pub fn new() -> Self {
        let mut registry = Self {
            components: HashMap::new(),
            order: Vec::new(),
            initialized: false,
        };
        let serializer: Arc<dyn Serializer> = Arc::new(JsonSerializer);
        registry.insert(SERIALIZER_ID.to_string(), Component::from_instance(serializer));
        registry
    }

    /// Register a component built by `factory`.
    ///
    /// Returns `true` if an existing component with the same id was replaced.
    pub fn register<T, F>(
        &mut self,
        id: impl Into<String>,
        scope: Scope,
        factory: F,
    ) -> Result<bool, RegistryError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> Result<T, RegistryError> + Send + Sync + 'static,
    {
        self.try_insert(id.into(), Component::from_factory(scope, factory))
    }

    /// Register an already-built singleton.
    pub fn register_instance<T>(&mut self, id: impl Into<String>, value: T) -> Result<bool, RegistryError>
    where
        T: Send + Sync + 'static,
    {
        self.try_insert(id.into(), Component::from_instance(value))
    }

    /// Register a component that carries route metadata and handler methods.
    pub fn register_endpoint<E, F>(
        &mut self,
        id: impl Into<String>,
        scope: Scope,
        factory: F,
    ) -> Result<bool, RegistryError>
    where
        E: Endpoint,
        F: Fn(&Registry) -> Result<E, RegistryError> + Send + Sync + 'static,
    {
        let component = Component::from_factory(scope, factory).with_endpoint(EndpointShape::of::<E>());
        self.try_insert(id.into(), component)
    }

    /// Replace the serializer used for bodies without a binary/text codec.
    ///
    /// Stores `serializer` as the `Arc<dyn Serializer>` that [`Registry::serializer`]
    /// looks up under [`SERIALIZER_ID`].
    pub fn register_serializer<S>(&mut self, serializer: S) -> Result<bool, RegistryError>
    where
        S: Serializer + 'static,
    {
        let serializer: Arc<dyn Serializer> = Arc::new(serializer);
        self.register_instance(SERIALIZER_ID, serializer)
    }

    fn try_insert(&mut self, id: String, component: Component) -> Result<bool, RegistryError> {
        if self.initialized {
            return Err(RegistryError::AlreadyInitialized(id));
        }
        Ok(self.insert(id, component))
    }

    fn insert(&mut self, id: String, component: Component) -> bool {
        tracing::trace!(component = %id, scope = %component.scope, type_name = component.type_name, "Component registered");
        match self.components.insert(id.clone(), component) {
            Some(_) => {
                tracing::debug!(component = %id, "Component definition replaced");
                true
            }
            None => {
                self.order.push(id);
                false
            }
        }
    }

    /// Build every singleton, in registration order, and freeze registration.
    pub fn initialize(&mut self) -> Result<(), RegistryError> {
        if self.initialized {
            return Ok(());
        }
        for id in &self.order {
            let component = &self.components[id];
            if component.scope == Scope::Singleton {
                self.instance(id)?;
            }
        }
        self.initialized = true;
        tracing::info!(components = self.order.len(), "Registry initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn scope(&self, id: &str) -> Option<Scope> {
        self.components.get(id).map(|c| c.scope)
    }

    /// Resolve an instance by id.
    pub fn instance(&self, id: &str) -> Result<Instance, RegistryError> {
        let component = self
            .components
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        match component.scope {
            Scope::Singleton => {
                if let Some(existing) = component.instance.get() {
                    return Ok(Arc::clone(existing));
                }
                let _guard = ConstructionGuard::enter(id)?;
                component
                    .instance
                    .get_or_try_init(|| self.construct(id, component))
                    .map(Arc::clone)
            }
            Scope::Prototype => {
                let _guard = ConstructionGuard::enter(id)?;
                self.construct(id, component)
            }
        }
    }

    /// Resolve an instance by id and downcast it.
    pub fn get<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>, RegistryError> {
        let instance = self.instance(id)?;
        let actual = self.components[id].type_name;
        instance
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                id: id.to_string(),
                expected: std::any::type_name::<T>(),
                actual,
            })
    }

    /// The serializer currently registered under [`SERIALIZER_ID`].
    ///
    /// Fails with [`RegistryError::TypeMismatch`] if that component is not an
    /// `Arc<dyn Serializer>`, e.g. a concrete serializer passed to [`Registry::register`].
    pub fn serializer(&self) -> Result<Arc<dyn Serializer>, RegistryError> {
        let serializer = self.get::<Arc<dyn Serializer>>(SERIALIZER_ID)?;
        Ok(Arc::clone(&*serializer))
    }

    /// Endpoint components, in registration order.
    pub fn endpoints(&self) -> impl Iterator<Item = EndpointComponent<'_>> {
        self.order.iter().filter_map(|id| {
            let component = &self.components[id];
            component.endpoint.map(|shape| EndpointComponent {
                id: id.as_str(),
                scope: component.scope,
                shape,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn construct(&self, id: &str, component: &Component) -> Result<Instance, RegistryError> {
        let factory = component
            .factory
            .as_ref()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        tracing::trace!(component = %id, "Constructing component");
        factory(self).map_err(|err| match err {
            RegistryError::CircularDependency(_) => err,
            other => RegistryError::Factory {
                id: id.to_string(),
                source: Box::new(other),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Database {
        url: String,
    }

    struct Repository {
        db: Arc<Database>,
    }

    #[test]
    fn test_singleton_is_shared() {
        let mut registry = Registry::new();
        registry
            .register("db", Scope::Singleton, |_| {
                Ok(Database { url: "mem://".to_string() })
            })
            .unwrap();
        registry.initialize().unwrap();

        let a = registry.get::<Database>("db").unwrap();
        let b = registry.get::<Database>("db").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.url, "mem://");
    }

    #[test]
    fn test_prototype_is_fresh() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut registry = Registry::new();
        registry
            .register("counter", Scope::Prototype, move |_| {
                Ok(counter.fetch_add(1, Ordering::SeqCst))
            })
            .unwrap();
        registry.initialize().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 0);

        let first = registry.get::<usize>("counter").unwrap();
        let second = registry.get::<usize>("counter").unwrap();
        assert_eq!((*first, *second), (0, 1));
    }

    #[test]
    fn test_dependencies_resolve_through_registry() {
        let mut registry = Registry::new();
        registry
            .register("repo", Scope::Singleton, |r| {
                Ok(Repository { db: r.get::<Database>("db")? })
            })
            .unwrap();
        registry
            .register("db", Scope::Singleton, |_| {
                Ok(Database { url: "pg://".to_string() })
            })
            .unwrap();
        registry.initialize().unwrap();

        let repo = registry.get::<Repository>("repo").unwrap();
        let db = registry.get::<Database>("db").unwrap();
        assert!(Arc::ptr_eq(&repo.db, &db));
    }

    #[test]
    fn test_missing_and_mismatched() {
        let mut registry = Registry::new();
        registry.register_instance("name", "value".to_string()).unwrap();

        assert!(matches!(
            registry.get::<String>("missing"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.get::<u32>("name"),
            Err(RegistryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_failed_dependency_is_wrapped() {
        let mut registry = Registry::new();
        registry
            .register("repo", Scope::Singleton, |r| {
                Ok(Repository { db: r.get::<Database>("db")? })
            })
            .unwrap();

        let err = registry.initialize().unwrap_err();
        assert!(matches!(err, RegistryError::Factory { ref id, .. } if id == "repo"));
        assert!(!registry.is_initialized());
    }

    #[test]
    fn test_circular_dependency_detected() {
        let mut registry = Registry::new();
        registry
            .register("a", Scope::Singleton, |r| Ok(*r.get::<u8>("b")?))
            .unwrap();
        registry
            .register("b", Scope::Singleton, |r| Ok(*r.get::<u8>("a")?))
            .unwrap();

        match registry.initialize() {
            Err(RegistryError::CircularDependency(chain)) => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("expected circular dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_overwrite_and_freeze() {
        let mut registry = Registry::new();
        assert!(!registry.register_instance("x", 1u32).unwrap());
        assert!(registry.register_instance("x", 2u32).unwrap());
        registry.initialize().unwrap();
        assert_eq!(*registry.get::<u32>("x").unwrap(), 2);

        assert!(matches!(
            registry.register_instance("y", 3u32),
            Err(RegistryError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_default_serializer_installed() {
        let registry = Registry::new();
        let serializer = registry.serializer().unwrap();
        assert_eq!(serializer.serialize(&serde_json::json!([1, 2])).unwrap(), b"[1,2]");
    }
}
