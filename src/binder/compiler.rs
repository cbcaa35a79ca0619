//! Route compilation.
//!
//! # Data Flow
//! ```text
//! Registry (initialized)
//!     → endpoints() in registration order, singletons only
//!     → RouteSpec → RouteBuilder (methods, path, queries, headers, matcher)
//!     → EndpointShape::bind → BoundHandler
//!     → Router<Arc<CompiledRoute>>
//! ```
//!
//! # Design Decisions
//! - Everything that can fail does so here, at startup, never per request
//! - The serializer is resolved once and shared by every route
//! - Prototype-scoped endpoints are skipped: a route needs one live instance

use std::sync::Arc;

use super::endpoint::BoundHandler;
use super::error::CompileError;
use super::signature::Signature;
use crate::observability::metrics;
use crate::registry::{EndpointComponent, Registry, RegistryError, Scope};
use crate::routing::{MatcherFn, RouteBuilder, RouteError, RouteSpec, Router};
use crate::serialization::Serializer;

/// A route ready to serve requests.
pub struct CompiledRoute {
    name: String,
    spec: RouteSpec,
    handler: BoundHandler,
    serializer: Arc<dyn Serializer>,
}

impl CompiledRoute {
    /// Registry id of the endpoint.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    pub fn handler(&self) -> &BoundHandler {
        &self.handler
    }

    pub fn signature(&self) -> &Signature {
        self.handler.signature()
    }

    pub fn serializer(&self) -> Arc<dyn Serializer> {
        Arc::clone(&self.serializer)
    }
}

impl std::fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("handler", &self.handler)
            .finish()
    }
}

/// Build the route table from every endpoint in the registry.
pub fn compile(registry: &Registry) -> Result<Router<Arc<CompiledRoute>>, CompileError> {
    tracing::trace!("Registering endpoints");
    let serializer = registry.serializer().map_err(CompileError::Serializer)?;
    let mut router = Router::new();

    for endpoint in registry.endpoints() {
        if endpoint.scope != Scope::Singleton {
            tracing::debug!(
                component = endpoint.id,
                scope = %endpoint.scope,
                "Skipping endpoint that is not a singleton"
            );
            continue;
        }
        if !registry.is_initialized() {
            return Err(CompileError::InstanceResolution {
                component: endpoint.id.to_string(),
                source: RegistryError::NotInitialized,
            });
        }

        let (builder, route) = compile_endpoint(registry, endpoint, Arc::clone(&serializer))?;
        router
            .add(builder, Arc::new(route))
            .map_err(|source| CompileError::Route {
                component: endpoint.id.to_string(),
                source,
            })?;
    }

    for route in router.routes() {
        tracing::debug!(
            route = route.name(),
            path = route.path_template().unwrap_or_default(),
            methods = ?route.methods(),
            query_templates = %route.query_templates().join(","),
            signature = %route.handler().signature(),
            "Endpoint registered"
        );
    }
    tracing::info!(routes = router.len(), "Routes compiled");
    metrics::set_routes(router.len());

    Ok(router)
}

fn compile_endpoint(
    registry: &Registry,
    endpoint: EndpointComponent<'_>,
    serializer: Arc<dyn Serializer>,
) -> Result<(RouteBuilder, CompiledRoute), CompileError> {
    let id = endpoint.id;
    let route_error = |source: RouteError| CompileError::Route {
        component: id.to_string(),
        source,
    };

    let instance = registry
        .instance(id)
        .map_err(|source| CompileError::InstanceResolution {
            component: id.to_string(),
            source,
        })?;
    let spec = endpoint.shape.route();

    let path = spec.path.as_deref().ok_or_else(|| CompileError::MissingPath {
        component: id.to_string(),
    })?;

    let mut builder = RouteBuilder::new(id).methods(spec.method_list());
    builder = builder.path(path).map_err(route_error)?;
    for (key, value) in spec.query_pairs().map_err(route_error)? {
        builder = builder.query(&key, &value).map_err(route_error)?;
    }
    for (name, value) in spec.header_pairs().map_err(route_error)? {
        builder = builder.header(&name, &value).map_err(route_error)?;
    }
    if let Some(matcher) = spec.matcher.as_deref() {
        let predicate = registry
            .get::<MatcherFn>(matcher)
            .map_err(|source| CompileError::MatcherResolution {
                component: id.to_string(),
                matcher: matcher.to_string(),
                source,
            })?;
        builder = builder.matcher_fn(matcher, MatcherFn::clone(&predicate));
    }

    let handler = endpoint
        .shape
        .bind(instance)
        .map_err(|source| CompileError::HandlerResolution {
            component: id.to_string(),
            source,
        })?;

    let signature = handler.signature();
    if signature.body_consumers() > 1 {
        tracing::warn!(
            route = id,
            signature = %signature,
            "Handler reads the body more than once; later parameters receive an empty body"
        );
    }
    if signature.unreachable_returns() > 0 {
        tracing::warn!(
            route = id,
            signature = %signature,
            "Handler returns values after a terminal result; they are never written"
        );
    }

    Ok((
        builder,
        CompiledRoute {
            name: id.to_string(),
            spec,
            handler,
            serializer,
        },
    ))
}
