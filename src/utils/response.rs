use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard envelope for every HTTP response the server produces.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// Builds a success envelope with the given status code.
pub fn success(status: StatusCode, message: &str, data: Option<Value>) -> Response {
    let body = ApiResponse {
        success: true,
        message: Some(message.to_string()),
        data,
        error: None,
    };
    (status, Json(body)).into_response()
}

/// Builds an error envelope with the given status code.
pub fn error(status: StatusCode, message: &str, error: Option<Value>) -> Response {
    let body = ApiResponse {
        success: false,
        message: Some(message.to_string()),
        data: None,
        error,
    };
    (status, Json(body)).into_response()
}

/// 200 OK.
pub fn ok(message: &str, data: Option<Value>) -> Response {
    success(StatusCode::OK, message, data)
}

/// 400 Bad Request.
pub fn bad_request(message: &str, err: Option<Value>) -> Response {
    error(StatusCode::BAD_REQUEST, message, err)
}

/// 401 Unauthorized.
pub fn unauthorized(message: &str) -> Response {
    error(StatusCode::UNAUTHORIZED, message, None)
}

/// 403 Forbidden.
pub fn forbidden(message: &str) -> Response {
    error(StatusCode::FORBIDDEN, message, None)
}

/// 429 Too Many Requests.
pub fn too_many_requests(message: &str, err: Option<Value>) -> Response {
    error(StatusCode::TOO_MANY_REQUESTS, message, err)
}

/// 500 Internal Server Error.
pub fn internal_server_error(message: &str, err: Option<Value>) -> Response {
    error(StatusCode::INTERNAL_SERVER_ERROR, message, err)
}
