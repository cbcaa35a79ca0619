//! Endpoint Binder demo server.
//!
//! Registers a handful of endpoints and serves them until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;

use endpoint_binder::config::{load_config, validate_config, ServerConfig};
use endpoint_binder::lifecycle::{spawn_signal_handler, Shutdown};
use endpoint_binder::observability::{init_logging, init_metrics};
use endpoint_binder::registry::{Registry, RegistryError, Scope};
use endpoint_binder::{payload, Endpoint, MethodTable, PathVars, RouteSpec, Template, WebServer};

#[derive(Parser)]
#[command(name = "endpoint-binder")]
#[command(about = "Serve registered components as HTTP endpoints", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

struct Health;

impl Health {
    async fn status(self: Arc<Self>) -> serde_json::Value {
        json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })
    }
}

impl Endpoint for Health {
    fn route() -> RouteSpec {
        RouteSpec::new().methods("GET").path("/health")
    }

    fn handler_func_name(&self) -> &str {
        "status"
    }

    fn methods(table: &mut MethodTable<Self>) {
        table.method("status", Self::status);
    }
}

struct Items;

impl Items {
    async fn show(self: Arc<Self>, vars: PathVars) -> String {
        vars.get("id").unwrap_or_default().to_string()
    }
}

impl Endpoint for Items {
    fn route() -> RouteSpec {
        RouteSpec::new().methods("GET").path("/item/{id}")
    }

    fn handler_func_name(&self) -> &str {
        "show"
    }

    fn methods(table: &mut MethodTable<Self>) {
        table.method("show", Self::show);
    }
}

struct Echo;

impl Echo {
    async fn echo(self: Arc<Self>, body: String) -> String {
        body
    }
}

impl Endpoint for Echo {
    fn route() -> RouteSpec {
        RouteSpec::new().methods("POST").path("/echo")
    }

    fn handler_func_name(&self) -> &str {
        "echo"
    }

    fn methods(table: &mut MethodTable<Self>) {
        table.method("echo", Self::echo);
    }
}

#[derive(Serialize, Deserialize)]
struct Greeting {
    name: String,
}

payload!(Greeting, decode = none, encode = serializer);

struct Hello {
    page: Template,
}

impl Hello {
    async fn greet(self: Arc<Self>, vars: PathVars) -> (Template, Greeting) {
        let name = vars.get("name").unwrap_or("world").to_string();
        (self.page.clone(), Greeting { name })
    }
}

impl Endpoint for Hello {
    fn route() -> RouteSpec {
        RouteSpec::new().methods("GET").path("/hello/{name}")
    }

    fn handler_func_name(&self) -> &str {
        "greet"
    }

    fn methods(table: &mut MethodTable<Self>) {
        table.method("greet", Self::greet);
    }
}

fn demo_registry() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    registry.register_endpoint("health", Scope::Singleton, |_| Ok(Health))?;
    registry.register_endpoint("items", Scope::Singleton, |_| Ok(Items))?;
    registry.register_endpoint("echo", Scope::Singleton, |_| Ok(Echo))?;
    registry.register_endpoint("hello", Scope::Singleton, |_| {
        let page = Template::from_source("hello.html", "Hello, {{ name }}!\n")
            .map_err(RegistryError::other)?;
        Ok(Hello { page })
    })?;
    registry.initialize()?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(endpoint_binder::config::ConfigError::Validation)?;
    }

    init_logging(&config.observability)?;
    tracing::info!("endpoint-binder v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr)?;
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let registry = Arc::new(demo_registry()?);

    let shutdown = Shutdown::new();
    spawn_signal_handler(&shutdown);

    let tls = config.listener.tls.is_some();
    let server = WebServer::new(config);
    if tls {
        server.listen_and_serve_tls(registry, shutdown.subscribe()).await?;
    } else {
        server.listen_and_serve(registry, shutdown.subscribe()).await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
