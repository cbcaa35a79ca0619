//! Request dispatch into compiled routes.
//!
//! # Data Flow
//! ```text
//! Request
//!     → Router::match_request (no match → 404)
//!     → spawn worker: bind → handler → write replies → finish / abort
//!     → await committed head
//!     → Response { status, headers, streaming body }
//! ```
//!
//! # Design Decisions
//! - Handlers run in their own task so the response can stream while they
//!   are still writing, and so a panic is contained to one request
//! - Faults never propagate: before commit they become a plain 500 (413 for
//!   an oversized body), after commit the body stream is broken off once the
//!   bytes already written are flushed, and the fault is logged
//! - Dropping the response body (client gone, timeout) cancels the
//!   request's context token

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::response::{Head, ResponseWriter};
use crate::binder::context::REQUEST_ID_HEADER;
use crate::binder::{write_replies, CompiledRoute, Fault, RequestContext};
use crate::observability::metrics;
use crate::routing::Router;

/// Delay before a broken-off body reports its error, so the head and the
/// chunks already handed to the connection are flushed to the client.
const ABORT_FLUSH_GRACE: Duration = Duration::from_millis(50);

/// Shared state of the fallback handler.
pub struct Dispatcher {
    routes: Router<Arc<CompiledRoute>>,
    request_timeout: Duration,
    response_buffer: usize,
}

impl Dispatcher {
    pub fn new(routes: Router<Arc<CompiledRoute>>, request_timeout: Duration, response_buffer: usize) -> Self {
        Self {
            routes,
            request_timeout,
            response_buffer,
        }
    }

    pub fn routes(&self) -> &Router<Arc<CompiledRoute>> {
        &self.routes
    }
}

/// Route a request to its endpoint.
pub async fn dispatch(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let Some((route, matched)) = dispatcher.routes.match_request(&parts) else {
        tracing::debug!(method = %parts.method, path = %parts.uri.path(), "No route matched");
        metrics::record_route_miss(parts.method.as_str());
        return (StatusCode::NOT_FOUND, "404 page not found\n").into_response();
    };
    let route = Arc::clone(route.handler());

    let request_id = parts
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = parts.method.clone();

    tracing::debug!(
        request_id = %request_id,
        route = route.name(),
        method = %method,
        path = %parts.uri.path(),
        "Dispatching request"
    );

    let (writer, head_rx) = ResponseWriter::channel(dispatcher.response_buffer);
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    let deadline = tokio::time::Instant::now() + dispatcher.request_timeout;
    let cx = RequestContext::new(parts, body, matched.vars, writer.clone(), route.serializer())
        .with_cancellation(token, Some(deadline));

    tokio::spawn(run_handler(Arc::clone(&route), cx, writer, request_id.clone()));

    match head_rx.await {
        Ok(head) => {
            metrics::record_request(route.name(), method.as_str(), head.status.as_u16(), start);
            into_response(head, guard)
        }
        Err(_) => {
            tracing::error!(request_id = %request_id, route = route.name(), "Handler ended without a response");
            metrics::record_request(route.name(), method.as_str(), 500, start);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn run_handler(route: Arc<CompiledRoute>, cx: RequestContext, writer: ResponseWriter, request_id: String) {
    let outcome = AssertUnwindSafe(invoke(&route, cx, &writer)).catch_unwind().await;
    let fault = match outcome {
        Ok(Ok(())) => {
            writer.finish();
            return;
        }
        Ok(Err(fault)) => fault,
        Err(panic) => Fault::Panic(panic_message(panic.as_ref())),
    };

    tracing::error!(
        request_id = %request_id,
        route = route.name(),
        kind = fault.kind(),
        committed = writer.is_committed(),
        error = %fault,
        "Request failed"
    );
    metrics::record_fault(route.name(), fault.kind());
    writer.abort(fault.status()).await;
}

async fn invoke(route: &CompiledRoute, cx: RequestContext, writer: &ResponseWriter) -> Result<(), Fault> {
    let slots = route.handler().call(cx).await?;
    let serializer = route.serializer();
    write_replies(slots, writer, serializer.as_ref()).await?;
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Stream the body channel; the guard cancels the request when the body is dropped.
fn into_response(head: Head, guard: DropGuard) -> Response {
    let stream = futures_util::stream::unfold((head.body, guard), |(mut rx, guard)| async move {
        let chunk = rx.recv().await?;
        if chunk.is_err() {
            // The connection is torn down on the error; let what was written reach the socket first.
            tokio::time::sleep(ABORT_FLUSH_GRACE).await;
        }
        Some((chunk, (rx, guard)))
    });
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = head.status;
    *response.headers_mut() = head.headers;
    response
}
