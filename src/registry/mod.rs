//! Component registry subsystem.
//!
//! # Data Flow
//! ```text
//! Application setup:
//!     register / register_endpoint / register_instance
//!     → component.rs (scope + type-erased factory)
//!     → initialize() builds all singletons
//!
//! Route compilation:
//!     endpoints() → EndpointShape per endpoint component
//!     instance(id) → live singleton handed to the binder
//! ```
//!
//! # Design Decisions
//! - Components are addressed by string id, typed access is a checked downcast
//! - Factories receive the registry and pull their dependencies explicitly
//! - Registration is frozen once initialized

pub mod component;
pub mod container;

use thiserror::Error;

pub use component::{EndpointComponent, Instance, Scope};
pub use container::Registry;

/// Errors raised by component registration and lookup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("component `{0}` is not registered")]
    NotFound(String),

    #[error("component `{id}` is a `{actual}`, not a `{expected}`")]
    TypeMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("failed to construct component `{id}`: {source}")]
    Factory {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("circular dependency: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("registry is initialized; cannot register `{0}`")]
    AlreadyInitialized(String),

    #[error("registry is not initialized")]
    NotInitialized,

    /// Failure reported by an application factory.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl RegistryError {
    /// Wrap an application error raised inside a factory.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        RegistryError::Other(err.into())
    }
}
