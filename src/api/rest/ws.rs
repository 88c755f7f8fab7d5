use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use crate::dispatch::broadcaster;
use crate::error::AppError;
use crate::models::events::{ClientEvent, ServerEvent};
use crate::relay;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    pub actor_id: String,
    pub name: Option<String>,
}

/// One session per authenticated actor; every room subscription of that
/// actor is multiplexed over this socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, query: WsQuery) {
    let (mut sender, mut receiver) = socket.split();
    let actor_id = query.actor_id;
    let name = query.name.unwrap_or_else(|| actor_id.clone());

    let rx = state.registry.register_session(&actor_id, &name);
    state.metrics.connected_sessions.inc();
    info!(actor_id = %actor_id, "session connected");

    let mut outbound = UnboundedReceiverStream::new(rx);
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize outbound event");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_actor = actor_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_event(&recv_state, &recv_actor, event),
                Err(err) => recv_state.registry.send_to(
                    &recv_actor,
                    &ServerEvent::Error {
                        message: format!("unrecognized event: {err}"),
                    },
                ),
            }
        }
    });

    // whichever half dies first takes the other down with it; a half-open
    // socket must not keep feeding events for an unregistered session
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // transport loss is an implicit leave; the rooms themselves survive
    // until the idle TTL so a reconnect picks up where it left off
    let left = state.registry.remove_session(&actor_id);
    state.metrics.connected_sessions.dec();
    info!(actor_id = %actor_id, rooms_left = left.len(), "session disconnected");
}

fn handle_event(state: &Arc<AppState>, actor_id: &str, event: ClientEvent) {
    let result = match event {
        ClientEvent::JoinOrderRoom { order_id, role } => {
            state.registry.join(&order_id, actor_id, role)
        }
        ClientEvent::LeaveOrderRoom { order_id } => {
            state.registry.leave(&order_id, actor_id);
            Ok(())
        }
        ClientEvent::RequestLocation { order_id } => {
            relay::location::request_location(state, &order_id, actor_id);
            Ok(())
        }
        ClientEvent::ShareLocation { order_id, location } => {
            relay::location::share_location(state, &order_id, actor_id, location)
        }
        ClientEvent::SendMessage { order_id, message } => {
            relay::chat::send_message(state, &order_id, actor_id, &message).map(|_| ())
        }
        ClientEvent::AcceptOrder { order_id } => {
            match broadcaster::accept(state, &order_id, actor_id) {
                Ok(_) => Ok(()),
                // a losing or late accept must reach the agent so its UI
                // drops the offer
                Err(AppError::OfferUnavailable(reason)) => {
                    state.registry.send_to(
                        actor_id,
                        &ServerEvent::OfferRevoked { order_id, reason },
                    );
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
        ClientEvent::DeclineOrder { order_id } => broadcaster::decline(state, &order_id, actor_id),
    };

    if let Err(err) = result {
        state.registry.send_to(
            actor_id,
            &ServerEvent::Error {
                message: err.to_string(),
            },
        );
    }
}
