//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → dispatch.rs (route match, spawn handler, await head)
//!     → response.rs (ResponseWriter: status, headers, streamed body)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod middleware;
pub mod response;
pub mod server;

pub use response::ResponseWriter;
pub use server::{ServeError, WebServer};
