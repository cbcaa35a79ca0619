//! Endpoint components.
//!
//! An endpoint is a registry component that also declares a route and a
//! named table of handler methods. The component instance chooses which
//! method serves its route through [`Endpoint::handler_func_name`].
//!
//! ```ignore
//! struct Items;
//!
//! impl Endpoint for Items {
//!     fn route() -> RouteSpec {
//!         RouteSpec::new().methods("GET").path("/item/{id}")
//!     }
//!
//!     fn handler_func_name(&self) -> &str {
//!         "show"
//!     }
//!
//!     fn methods(table: &mut MethodTable<Self>) {
//!         table.method("show", Self::show);
//!     }
//! }
//! ```

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::context::RequestContext;
use super::error::HandlerLookupError;
use super::handler::{Handler, HandlerFuture};
use super::signature::Signature;
use crate::registry::Instance;
use crate::routing::RouteSpec;

/// A component that serves a route.
pub trait Endpoint: Send + Sync + Sized + 'static {
    /// Route declaration shared by every instance of this type.
    fn route() -> RouteSpec;

    /// Name of the method in [`Endpoint::methods`] that handles requests.
    fn handler_func_name(&self) -> &str;

    /// Declare the callable handler methods by name.
    fn methods(table: &mut MethodTable<Self>);
}

type ErasedCall<T> = Arc<dyn Fn(Arc<T>, RequestContext) -> HandlerFuture + Send + Sync>;

struct MethodEntry<T> {
    signature: Signature,
    call: ErasedCall<T>,
}

/// Named handler methods of an endpoint type.
pub struct MethodTable<T> {
    methods: BTreeMap<String, MethodEntry<T>>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self {
            methods: BTreeMap::new(),
        }
    }
}

impl<T: Send + Sync + 'static> MethodTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a handler method. A later declaration with the same name wins.
    pub fn method<H, Args>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T, Args>,
    {
        let signature = handler.signature();
        let call: ErasedCall<T> = Arc::new(move |target: Arc<T>, cx: RequestContext| handler.call(target, cx));
        self.methods.insert(name.into(), MethodEntry { signature, call });
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.methods.get(name).map(|m| &m.signature)
    }

    /// Bind the named method to a component instance.
    pub fn bind(&self, name: &str, target: Arc<T>) -> Result<BoundHandler, HandlerLookupError> {
        let entry = self
            .methods
            .get(name)
            .ok_or_else(|| HandlerLookupError::UnknownMethod {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })?;
        let call = Arc::clone(&entry.call);
        Ok(BoundHandler {
            method: name.to_string(),
            signature: entry.signature.clone(),
            call: Arc::new(move |cx: RequestContext| call(Arc::clone(&target), cx)),
        })
    }
}

/// A handler method bound to its component instance.
#[derive(Clone)]
pub struct BoundHandler {
    method: String,
    signature: Signature,
    call: Arc<dyn Fn(RequestContext) -> HandlerFuture + Send + Sync>,
}

impl BoundHandler {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, cx: RequestContext) -> HandlerFuture {
        (self.call)(cx)
    }
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("method", &self.method)
            .field("signature", &self.signature.to_string())
            .finish()
    }
}

/// Type-erased endpoint capabilities, captured at registration.
#[derive(Clone, Copy)]
pub struct EndpointShape {
    type_name: &'static str,
    route: fn() -> RouteSpec,
    bind: fn(Instance) -> Result<BoundHandler, HandlerLookupError>,
}

impl EndpointShape {
    pub fn of<E: Endpoint>() -> Self {
        Self {
            type_name: type_name::<E>(),
            route: E::route,
            bind: bind_endpoint::<E>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn route(&self) -> RouteSpec {
        (self.route)()
    }

    /// Resolve the instance's chosen handler method.
    pub fn bind(&self, instance: Instance) -> Result<BoundHandler, HandlerLookupError> {
        (self.bind)(instance)
    }
}

impl fmt::Debug for EndpointShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointShape")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn bind_endpoint<E: Endpoint>(instance: Instance) -> Result<BoundHandler, HandlerLookupError> {
    let endpoint = instance
        .downcast::<E>()
        .map_err(|_| HandlerLookupError::WrongType {
            expected: type_name::<E>(),
        })?;
    let mut table = MethodTable::new();
    E::methods(&mut table);
    let name = endpoint.handler_func_name().to_string();
    table.bind(&name, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::context::PathVars;

    struct Items {
        handler: &'static str,
    }

    impl Items {
        async fn show(self: Arc<Self>, vars: PathVars) -> String {
            vars.get("id").unwrap_or_default().to_string()
        }

        async fn count(self: Arc<Self>) -> u16 {
            204
        }
    }

    impl Endpoint for Items {
        fn route() -> RouteSpec {
            RouteSpec::new().methods("GET").path("/item/{id}")
        }

        fn handler_func_name(&self) -> &str {
            self.handler
        }

        fn methods(table: &mut MethodTable<Self>) {
            table.method("show", Self::show).method("count", Self::count);
        }
    }

    #[test]
    fn test_shape_binds_chosen_method() {
        let shape = EndpointShape::of::<Items>();
        assert_eq!(shape.route().path.as_deref(), Some("/item/{id}"));

        let bound = shape.bind(Arc::new(Items { handler: "count" })).unwrap();
        assert_eq!(bound.method(), "count");
        assert_eq!(bound.signature().to_string(), "() -> (Status)");
    }

    #[test]
    fn test_unknown_method() {
        let shape = EndpointShape::of::<Items>();
        match shape.bind(Arc::new(Items { handler: "missing" })) {
            Err(HandlerLookupError::UnknownMethod { name, available }) => {
                assert_eq!(name, "missing");
                assert_eq!(available, "count, show");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrong_instance_type() {
        let shape = EndpointShape::of::<Items>();
        assert!(matches!(
            shape.bind(Arc::new(5u8)),
            Err(HandlerLookupError::WrongType { .. })
        ));
    }
}
