//! Endpoint Binder
//!
//! Turns registered components into HTTP route handlers. A component
//! declares its route and names one of its methods as the entry point; the
//! binder compiles the route once at startup and, per request, binds each
//! handler parameter from the request and writes each return value into the
//! response.
//!
//! # Architecture Overview
//!
//! ```text
//!     ┌──────────────┐   endpoints()   ┌──────────────┐   Router<CompiledRoute>
//!     │   registry   │ ──────────────▶ │   compiler   │ ─────────────────────┐
//!     │ (components) │                 │   (binder)   │                      │
//!     └──────────────┘                 └──────────────┘                      ▼
//!                                                                    ┌──────────────┐
//!     Client Request ─────────────────────────────────────────────▶  │   dispatch   │
//!                                                                    │   (http)     │
//!                                                                    └──────┬───────┘
//!                                                                           │
//!                       resolver: Param::bind for each argument             │
//!                       handler:  component method                          ▼
//!                       writer:   Reply slots → ResponseWriter       ┌──────────────┐
//!     Client Response ◀───────────────────────────────────────────── │  worker task │
//!                                                                    └──────────────┘
//! ```

// Core subsystems
pub mod binder;
pub mod registry;
pub mod routing;
pub mod serialization;

// Serving
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use binder::{Context, Endpoint, MethodTable, PathVars, Query, Template};
pub use config::ServerConfig;
pub use http::{ResponseWriter, WebServer};
pub use lifecycle::Shutdown;
pub use registry::{Registry, Scope};
pub use routing::{MatcherFn, RouteSpec};
pub use serialization::{JsonSerializer, Serializer};
