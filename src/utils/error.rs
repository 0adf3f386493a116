use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::server::middleware::auth::AuthError;
use crate::server::middleware::rate_limit::AdmissionError;
use crate::utils::response;

/// Top-level error type for the notification server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Credential-layer failure; surfaces as a 401/403 rejection.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Admission-layer failure.
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// Failure serializing or deserializing a payload.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid or incomplete server configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The connection could not be upgraded to a WebSocket.
    #[error("Upgrade failed: {0}")]
    Upgrade(String),
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::Serialization(err.to_string())
    }
}

/// Boundary translation: credential and throttle failures become
/// user-facing rejections, everything else a generic internal error.
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match &self {
            ServerError::Auth(AuthError::Forbidden) => response::forbidden(&self.to_string()),
            ServerError::Auth(_) => response::unauthorized(&self.to_string()),
            ServerError::Admission(AdmissionError::ThrottleExceeded) => {
                response::too_many_requests(&self.to_string(), None)
            }
            ServerError::Upgrade(_) => response::bad_request(&self.to_string(), None),
            _ => response::internal_server_error("Internal server error", None),
        }
    }
}
