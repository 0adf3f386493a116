use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::server::hub::HubHandle;
use crate::utils::error::ServerError;

/// Wire format for hub events: `{"type": ..., "data": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

/// Sends a typed event to every live session.
///
/// Serialization happens before anything reaches the hub, so a bad
/// payload fails here and never results in a partial delivery.
pub fn broadcast_update<T: Serialize>(
    hub: &HubHandle,
    event_type: &str,
    data: T,
) -> Result<(), ServerError> {
    let event = BroadcastEvent {
        event_type: event_type.to_string(),
        data: serde_json::to_value(data)?,
    };
    hub.broadcast(serde_json::to_string(&event)?);
    Ok(())
}

/// Broadcasts an "error" event carrying a message.
pub fn broadcast_error(hub: &HubHandle, message: &str) -> Result<(), ServerError> {
    broadcast_update(hub, "error", json!({ "message": message }))
}

/// Broadcasts a "success" event carrying a message and payload.
pub fn broadcast_success<T: Serialize>(
    hub: &HubHandle,
    message: &str,
    data: T,
) -> Result<(), ServerError> {
    let data = serde_json::to_value(data)?;
    broadcast_update(hub, "success", json!({ "message": message, "data": data }))
}
