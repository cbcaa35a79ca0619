//! Concurrency limit middleware.
//! Caps in-flight requests with a shared semaphore.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Semaphore;

/// Wait for a permit, then run the rest of the stack while holding it.
pub async fn limit_concurrency(
    State(permits): State<Arc<Semaphore>>,
    req: Request,
    next: Next,
) -> Response {
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Concurrency limiter closed");
            return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
        }
    };
    next.run(req).await
}
