//! Endpoint binding subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Registry endpoints
//!     → compiler.rs (route declaration → matchers, handler lookup)
//!     → Router<CompiledRoute>
//!
//! Per request:
//!     RequestContext (context.rs)
//!     → resolver.rs (bind each parameter, left to right)
//!     → handler.rs (invoke the component method)
//!     → writer.rs (status / headers / body / stream / template / encoded)
//!     → ResponseWriter
//! ```
//!
//! # Design Decisions
//! - Parameter and return kinds are traits resolved at compile time; only
//!   the handler call itself is type-erased
//! - Application types pick a codec explicitly with [`payload!`](crate::payload)
//! - Binding and writing failures surface as [`Fault`], never as panics

pub mod codec;
pub mod compiler;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod resolver;
pub mod signature;
pub mod template;
pub mod writer;

pub use codec::{CodecError, DecodeBinary, DecodeText, EncodeBinary, EncodeText};
pub use compiler::{compile, CompiledRoute};
pub use context::{Context, PathVars, Query, RequestContext};
pub use endpoint::{BoundHandler, Endpoint, EndpointShape, MethodTable};
pub use error::{BindError, CompileError, Fault, HandlerLookupError, WriteError};
pub use handler::Handler;
pub use resolver::{BodyReader, Param};
pub use signature::{Capability, ParamKind, ReplyKind, Signature};
pub use template::Template;
pub use writer::{write_replies, Reader, Replies, Reply, Slot};
