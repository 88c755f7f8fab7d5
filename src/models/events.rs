use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::chat::ChatMessage;
use crate::models::room::{GeoPoint, Role};

/// Events a connected actor may send over its session socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinOrderRoom { order_id: String, role: Role },
    LeaveOrderRoom { order_id: String },
    RequestLocation { order_id: String },
    ShareLocation { order_id: String, location: GeoPoint },
    SendMessage { order_id: String, message: String },
    AcceptOrder { order_id: String },
    DeclineOrder { order_id: String },
}

/// Events the relay pushes to sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveLocation {
        order_id: String,
        role: Role,
        location: GeoPoint,
        captured_at: DateTime<Utc>,
    },
    ReceiveMessage {
        #[serde(flatten)]
        message: ChatMessage,
    },
    DispatchOffer {
        order_id: String,
        offered_at: DateTime<Utc>,
        window_secs: u64,
    },
    OfferRevoked {
        order_id: String,
        reason: String,
    },
    OrderAssigned {
        order_id: String,
        agent_id: String,
        agent_name: String,
    },
    OrderDispatchTimeout {
        order_id: String,
    },
    RouteUpdate {
        order_id: String,
        distance_km: f64,
        duration_min: f64,
        polyline: Vec<GeoPoint>,
        bearing: Option<f64>,
    },
    Error {
        message: String,
    },
}
