pub mod handler;
pub mod hub;
pub mod middleware;
pub mod publish;
pub mod session;

// Re-export public components
pub use hub::{Hub, HubHandle};
pub use publish::{broadcast_error, broadcast_success, broadcast_update};
pub use session::Session;

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;

use crate::config::AppConfig;
use middleware::auth::TokenValidator;
use middleware::rate_limit::AdmissionLimiter;

/// Shared state handed to every handler and layer. All collaborators are
/// constructed up front and injected; nothing is reached through globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub hub: HubHandle,
    pub limiter: AdmissionLimiter,
    pub validator: Arc<TokenValidator>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, hub: HubHandle) -> Self {
        let limiter = AdmissionLimiter::new(
            config.rate_limit_quota,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        let validator = Arc::new(TokenValidator::new(
            &config.jwt_secret,
            config.jwt_allow_bare_token,
        ));
        Self {
            config,
            hub,
            limiter,
            validator,
        }
    }
}

/// Builds the route tree. Every route sits behind the admission layer;
/// panic recovery wraps the whole stack.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/notify", post(handler::notify))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .route("/ws", get(handler::ws_handler))
        .route("/healthz", get(handler::healthz))
        .merge(protected)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::admission_layer,
        ))
        .layer(from_fn(middleware::recovery::recover_panics))
        .with_state(state)
}
