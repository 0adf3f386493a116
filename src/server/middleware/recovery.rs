use std::panic::AssertUnwindSafe;

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;
use tracing::error;

use crate::utils::response;

/// Boundary recovery: a panicking handler becomes a generic 500 envelope
/// instead of taking the listener task down with it.
pub async fn recover_panics(req: Request<Body>, next: Next<Body>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%method, %path, panic = %detail, "panic recovered");
            response::internal_server_error("Internal server error", None)
        }
    }
}
