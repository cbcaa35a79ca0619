//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile the registry's endpoints into a route table
//! - Create the Axum router: dispatch fallback plus middleware stack
//! - Wire up middleware (request ID, tracing, timeout, limits, user middleware)
//! - Bind plain TCP or TLS listeners and serve until shutdown
//!
//! # Middleware Order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId → Trace → Timeout
//!     → concurrency limit → body limit → user middleware (install order)
//!     → dispatch
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::dispatch::{dispatch, Dispatcher};
use super::middleware::limit_concurrency;
use crate::binder::{compile, CompileError};
use crate::config::ServerConfig;
use crate::registry::Registry;

/// Grace period for in-flight TLS connections after shutdown is signalled.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

type RouterLayer = Box<dyn Fn(Router) -> Router + Send + Sync>;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bind address `{0}`")]
    Address(String),

    #[error("TLS is not configured")]
    TlsNotConfigured,

    #[error("failed to load TLS certificate: {0}")]
    Tls(#[source] std::io::Error),
}

/// HTTP server for registered endpoints.
pub struct WebServer {
    config: ServerConfig,
    middleware: Vec<RouterLayer>,
}

impl WebServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            middleware: Vec::new(),
        }
    }

    /// Install middleware around every endpoint.
    ///
    /// Middleware installed first runs first. Values it inserts into request
    /// extensions are visible to handlers through [`Context::value`](crate::binder::Context::value).
    pub fn with_middleware<F, Fut, Out>(mut self, layer_fn: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoResponse + 'static,
    {
        self.middleware.push(Box::new(move |router: Router| {
            router.layer(middleware::from_fn(layer_fn.clone()))
        }));
        self
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Compile the registry's endpoints into an Axum router.
    pub fn create_router(&self, registry: &Registry) -> Result<Router, CompileError> {
        let routes = compile(registry)?;
        let dispatcher = Arc::new(Dispatcher::new(
            routes,
            Duration::from_secs(self.config.timeouts.request_secs),
            self.config.limits.response_buffer_chunks,
        ));
        Ok(self.build_router(dispatcher))
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self, dispatcher: Arc<Dispatcher>) -> Router {
        let mut router = Router::new().fallback(dispatch).with_state(dispatcher);
        for layer in self.middleware.iter().rev() {
            router = layer(router);
        }

        let permits = Arc::new(Semaphore::new(self.config.listener.max_connections));
        router
            .layer(RequestBodyLimitLayer::new(self.config.limits.max_body_bytes))
            .layer(middleware::from_fn_with_state(permits, limit_concurrency))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Compile routes and serve on the given listener until `shutdown` fires.
    pub async fn run(
        self,
        registry: Arc<Registry>,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServeError> {
        let app = self.create_router(&registry)?;
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Bind the configured address and serve plain HTTP.
    pub async fn listen_and_serve(
        self,
        registry: Arc<Registry>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServeError> {
        let listener = TcpListener::bind(&self.config.listener.bind_address).await?;
        self.run(registry, listener, shutdown).await
    }

    /// Bind the configured address and serve HTTPS with the configured certificate.
    pub async fn listen_and_serve_tls(
        self,
        registry: Arc<Registry>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServeError> {
        let tls = self.config.listener.tls.clone().ok_or(ServeError::TlsNotConfigured)?;
        let addr: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|_| ServeError::Address(self.config.listener.bind_address.clone()))?;
        let app = self.create_router(&registry)?;
        let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(ServeError::Tls)?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            shutdown_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
        });

        tracing::info!(
            address = %addr,
            cert = %tls.cert_path,
            "HTTPS server starting"
        );
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
