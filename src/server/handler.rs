use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::server::middleware::auth::{self, Claims, Role};
use crate::server::publish;
use crate::server::session::Session;
use crate::server::AppState;
use crate::utils::error::ServerError;
use crate::utils::response;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    user_id: Option<String>,
}

/// Upgrade endpoint. Identity comes from the optional `user_id` query
/// parameter; the session owns the connection for its lifetime.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, ServerError> {
    let ws = ws.map_err(|e| ServerError::Upgrade(e.to_string()))?;
    let client_id = params.user_id.unwrap_or_else(|| "anonymous".to_string());
    debug!(client_id = %client_id, "websocket upgrade accepted");

    let session = Session::new(client_id, state.hub.clone(), &state.config);
    Ok(ws.on_upgrade(move |socket| session.run(socket)))
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Collaborator entry point: pushes a typed event to every live session.
pub async fn notify(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<NotifyRequest>,
) -> Result<Response, ServerError> {
    auth::authorize(&claims, &[Role::Owner])?;
    publish::broadcast_update(&state.hub, &body.event_type, body.data)?;
    Ok(response::ok("Notification broadcast", None))
}

/// Liveness probe reporting how many sessions the hub currently tracks.
pub async fn healthz(State(state): State<AppState>) -> Response {
    let sessions = state.hub.session_count().await;
    response::ok("ok", Some(json!({ "sessions": sessions })))
}
