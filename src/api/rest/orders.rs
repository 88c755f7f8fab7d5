use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::dispatch::broadcaster;
use crate::error::AppError;
use crate::models::dispatch::DispatchCycle;
use crate::models::order::{OrderRecord, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/orders/:id/dispatch",
            post(dispatch_order).get(get_dispatch).delete(retract_dispatch),
        )
        .route("/orders/:id/status", put(update_status))
        .route("/orders/:id", get(get_order))
}

#[derive(Deserialize)]
pub struct DispatchRequest {
    pub agent_ids: Vec<String>,
}

/// Seller marked the order ready; offer it to the given candidate pool. An
/// empty pool is allowed and simply times out.
async fn dispatch_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<DispatchRequest>,
) -> Result<Json<DispatchCycle>, AppError> {
    broadcaster::dispatch(&state, &id, payload.agent_ids).map(Json)
}

async fn get_dispatch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DispatchCycle>, AppError> {
    let cycle = state
        .dispatches
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("no dispatch for order {id}")))?;

    Ok(Json(cycle.value().clone()))
}

async fn retract_dispatch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DispatchCycle>, AppError> {
    broadcaster::retract(&state, &id).map(Json)
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Mirror of the backend's status mutation, so the reaper can tell when an
/// order has gone terminal.
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Json<OrderRecord> {
    let mut order = state
        .orders
        .entry(id.clone())
        .or_insert_with(|| OrderRecord::new(id, payload.status));

    order.status = payload.status;
    order.updated_at = Utc::now();

    Json(order.clone())
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderRecord>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    Ok(Json(order.value().clone()))
}
