//! Component definitions held by the registry.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::container::Registry;
use super::RegistryError;
use crate::binder::EndpointShape;

/// A live component instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type Factory = Arc<dyn Fn(&Registry) -> Result<Instance, RegistryError> + Send + Sync>;

/// Lifetime of a component's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One shared instance, built on first use or at initialization.
    #[default]
    Singleton,
    /// A fresh instance on every lookup.
    Prototype,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::Prototype => f.write_str("prototype"),
        }
    }
}

pub(crate) struct Component {
    pub(crate) scope: Scope,
    pub(crate) type_name: &'static str,
    /// `None` for pre-built instances.
    pub(crate) factory: Option<Factory>,
    pub(crate) instance: OnceCell<Instance>,
    pub(crate) endpoint: Option<EndpointShape>,
}

impl Component {
    pub(crate) fn from_factory<T, F>(scope: Scope, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> Result<T, RegistryError> + Send + Sync + 'static,
    {
        let factory: Factory =
            Arc::new(move |registry: &Registry| factory(registry).map(|v| Arc::new(v) as Instance));
        Self {
            scope,
            type_name: std::any::type_name::<T>(),
            factory: Some(factory),
            instance: OnceCell::new(),
            endpoint: None,
        }
    }

    pub(crate) fn from_instance<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            scope: Scope::Singleton,
            type_name: std::any::type_name::<T>(),
            factory: None,
            instance: OnceCell::with_value(Arc::new(value) as Instance),
            endpoint: None,
        }
    }

    pub(crate) fn with_endpoint(mut self, shape: EndpointShape) -> Self {
        self.endpoint = Some(shape);
        self
    }
}

/// A registered endpoint component, as seen by route compilation.
#[derive(Debug, Clone, Copy)]
pub struct EndpointComponent<'a> {
    pub id: &'a str,
    pub scope: Scope,
    pub shape: EndpointShape,
}
