//! Binder error types.
//!
//! Two families:
//! - Startup: [`CompileError`], [`HandlerLookupError`], fatal to route compilation
//! - Per request: [`Fault`] wrapping [`BindError`] / [`WriteError`] / handler
//!   errors / panics, converted into a 500 or an aborted stream

use axum::http::StatusCode;
use thiserror::Error;

use super::codec::CodecError;
use super::signature::Capability;
use crate::registry::RegistryError;
use crate::routing::RouteError;
use crate::serialization::SerializerError;

/// Failure while converting the request into a handler argument.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error("request body exceeds the configured limit")]
    TooLarge,

    #[error("request body is not valid UTF-8")]
    InvalidText(#[from] std::string::FromUtf8Error),

    #[error("{capability} decode failed: {source}")]
    Decode {
        capability: Capability,
        #[source]
        source: CodecError,
    },

    #[error("failed to deserialize request body: {0}")]
    Serializer(#[from] SerializerError),
}

/// Failure while writing handler results to the response.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("client disconnected before the response completed")]
    Disconnected,

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("failed to copy response stream: {0}")]
    Stream(#[source] std::io::Error),

    #[error("template result is not followed by a data value")]
    MissingTemplateData,

    #[error("failed to render template: {0}")]
    Template(#[from] minijinja::Error),

    #[error("{capability} encode failed: {source}")]
    Encode {
        capability: Capability,
        #[source]
        source: CodecError,
    },

    #[error("failed to serialize response: {0}")]
    Serializer(#[from] SerializerError),
}

/// Anything that aborts a single request.
#[derive(Debug, Error)]
pub enum Fault {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("handler failed: {0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),

    #[error("handler panicked: {0}")]
    Panic(String),
}

impl Fault {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Bind(_) => "bind",
            Fault::Write(_) => "write",
            Fault::Handler(_) => "handler",
            Fault::Panic(_) => "panic",
        }
    }

    /// Status sent when the fault happens before the response is committed.
    pub fn status(&self) -> StatusCode {
        match self {
            Fault::Bind(BindError::TooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A handler method could not be bound to its component.
#[derive(Debug, Error)]
pub enum HandlerLookupError {
    #[error("handler method `{name}` is not declared (declared: {available})")]
    UnknownMethod { name: String, available: String },

    #[error("instance is not a `{expected}`")]
    WrongType { expected: &'static str },
}

/// Route compilation failure. Aborts startup.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("endpoint `{component}` declares no path")]
    MissingPath { component: String },

    #[error("failed to resolve endpoint `{component}`: {source}")]
    InstanceResolution {
        component: String,
        #[source]
        source: RegistryError,
    },

    #[error("endpoint `{component}` references matcher `{matcher}`: {source}")]
    MatcherResolution {
        component: String,
        matcher: String,
        #[source]
        source: RegistryError,
    },

    #[error("endpoint `{component}`: {source}")]
    HandlerResolution {
        component: String,
        #[source]
        source: HandlerLookupError,
    },

    #[error("endpoint `{component}` has an invalid route: {source}")]
    Route {
        component: String,
        #[source]
        source: RouteError,
    },

    #[error("failed to resolve serializer: {0}")]
    Serializer(#[source] RegistryError),
}
