use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::chat::ChatMessage;
use crate::models::events::ServerEvent;
use crate::state::AppState;

/// Relay one chat line to the rest of the room. Whitespace-only input is a
/// silent no-op, mirroring a user pressing send on an empty box. The
/// timestamp is stamped here, at the relay boundary, so client clock skew
/// never enters the dedup key. The sender is excluded from the broadcast;
/// its own view comes from the local echo.
pub fn send_message(
    state: &AppState,
    order_id: &str,
    sender_id: &str,
    text: &str,
) -> Result<Option<ChatMessage>, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let sender_role = state
        .registry
        .role_of(order_id, sender_id)
        .ok_or_else(|| AppError::NotSubscribed {
            order_id: order_id.to_string(),
            actor_id: sender_id.to_string(),
        })?;

    let sender_name = state
        .registry
        .session_name(sender_id)
        .unwrap_or_else(|| sender_id.to_string());

    let message = ChatMessage {
        order_id: order_id.to_string(),
        sender_id: sender_id.to_string(),
        sender_name,
        sender_role,
        message: text.to_string(),
        timestamp: Utc::now(),
    };

    state.metrics.chat_messages_total.inc();
    state.registry.broadcast(
        order_id,
        &ServerEvent::ReceiveMessage {
            message: message.clone(),
        },
        Some(sender_id),
    );

    Ok(Some(message))
}

/// Defensive consumer-side dedup over `(sender_id, timestamp)`. The relay
/// already excludes the sender from its own broadcast, so this is a second
/// layer for embedders that keep an optimistic local echo.
#[derive(Default)]
pub struct MessageLog {
    seen: HashSet<(String, DateTime<Utc>)>,
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the message unless an identical `(sender_id, timestamp)` is
    /// already present. Returns whether the message was new.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.dedup_key()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{send_message, MessageLog};
    use crate::models::events::ServerEvent;
    use crate::models::room::Role;
    use crate::state::AppState;

    fn state() -> AppState {
        AppState::new(Duration::from_secs(10))
    }

    #[test]
    fn whitespace_only_message_is_a_noop() {
        let state = state();
        let _rx = state.registry.register_session("C1", "cust");
        state.registry.join("O1", "C1", Role::Customer).unwrap();

        let sent = send_message(&state, "O1", "C1", "   \n ").unwrap();
        assert!(sent.is_none());
    }

    #[test]
    fn sender_does_not_receive_its_own_broadcast() {
        let state = state();
        let mut rx_cust = state.registry.register_session("C1", "cust");
        let mut rx_agent = state.registry.register_session("A1", "agent");
        state.registry.join("O1", "C1", Role::Customer).unwrap();
        state.registry.join("O1", "A1", Role::DeliveryAgent).unwrap();

        let sent = send_message(&state, "O1", "C1", "at the gate").unwrap().unwrap();
        assert_eq!(sent.sender_role, Role::Customer);

        assert!(rx_cust.try_recv().is_err());
        match rx_agent.try_recv().unwrap() {
            ServerEvent::ReceiveMessage { message } => {
                assert_eq!(message.message, "at the gate");
                assert_eq!(message.sender_name, "cust");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn non_subscriber_cannot_send() {
        let state = state();
        let _rx = state.registry.register_session("X", "stranger");

        assert!(send_message(&state, "O1", "X", "hello").is_err());
    }

    #[test]
    fn duplicate_delivery_is_stored_once() {
        let state = state();
        let _rx_cust = state.registry.register_session("C1", "cust");
        let _rx_agent = state.registry.register_session("A1", "agent");
        state.registry.join("O1", "C1", Role::Customer).unwrap();
        state.registry.join("O1", "A1", Role::DeliveryAgent).unwrap();

        let message = send_message(&state, "O1", "C1", "two minutes away")
            .unwrap()
            .unwrap();

        let mut log = MessageLog::new();
        assert!(log.insert(message.clone()));
        assert!(!log.insert(message));
        assert_eq!(log.len(), 1);
    }
}
