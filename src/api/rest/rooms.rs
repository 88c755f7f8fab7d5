use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::models::room::{LocationSample, Role};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/rooms/:id", get(get_room))
}

#[derive(Serialize)]
pub struct SubscriberView {
    pub actor_id: String,
    pub role: Role,
}

#[derive(Serialize)]
pub struct RoomView {
    pub order_id: String,
    pub subscribers: Vec<SubscriberView>,
    pub last_agent_location: Option<LocationSample>,
    pub last_customer_location: Option<LocationSample>,
    pub bearing: Option<f64>,
}

async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    let view = state
        .registry
        .with_room(&id, |room| RoomView {
            order_id: id.clone(),
            subscribers: room
                .subscribers
                .iter()
                .map(|(actor_id, role)| SubscriberView {
                    actor_id: actor_id.clone(),
                    role: *role,
                })
                .collect(),
            last_agent_location: room.last_agent_location,
            last_customer_location: room.last_customer_location,
            bearing: room.bearing_agent_to_customer(),
        })
        .ok_or_else(|| AppError::NotFound(format!("no live room for order {id}")))?;

    Ok(Json(view))
}
