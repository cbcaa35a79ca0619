//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use endpoint_binder::config::ServerConfig;
use endpoint_binder::http::WebServer;
use endpoint_binder::lifecycle::Shutdown;
use endpoint_binder::registry::Registry;
use tokio::net::TcpListener;

/// A running server on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve `registry` with the default configuration.
#[allow(dead_code)]
pub async fn start_server(registry: Registry) -> TestServer {
    start_server_with(registry, ServerConfig::default(), |server| server).await
}

/// Serve `registry` after letting the caller adjust the server.
pub async fn start_server_with<F>(registry: Registry, config: ServerConfig, configure: F) -> TestServer
where
    F: FnOnce(WebServer) -> WebServer,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = configure(WebServer::new(config));
    let server_shutdown = shutdown.subscribe();
    let registry = Arc::new(registry);

    tokio::spawn(async move {
        if let Err(e) = server.run(registry, listener, server_shutdown).await {
            panic!("server failed: {e}");
        }
    });

    TestServer { addr, shutdown }
}

/// Client without connection pooling or proxies.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
