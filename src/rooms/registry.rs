use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::AppError;
use crate::models::events::ServerEvent;
use crate::models::room::{GeoPoint, OrderRoom, Role};

/// One connected actor. A single long-lived session multiplexes every room
/// the actor is subscribed to; opening a second connection for the same
/// actor replaces the first.
pub struct Session {
    pub name: String,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Maps order ids to their live rooms and actor ids to their sessions. All
/// membership mutation goes through here; the relay and the broadcaster
/// only read membership.
pub struct RoomRegistry {
    rooms: DashMap<String, OrderRoom>,
    sessions: DashMap<String, Session>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    pub fn register_session(
        &self,
        actor_id: &str,
        name: &str,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.insert(
            actor_id.to_string(),
            Session {
                name: name.to_string(),
                tx,
            },
        );
        rx
    }

    /// Drops the session and performs an implicit leave of every room the
    /// actor was in. Returns the rooms left, for logging.
    pub fn remove_session(&self, actor_id: &str) -> Vec<String> {
        self.sessions.remove(actor_id);

        let mut left = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            let room = entry.value_mut();
            if room.subscribers.remove(actor_id).is_some() {
                if room.subscribers.is_empty() {
                    room.emptied_at = Some(Instant::now());
                }
                left.push(entry.key().clone());
            }
        }
        left
    }

    pub fn session_name(&self, actor_id: &str) -> Option<String> {
        self.sessions.get(actor_id).map(|s| s.name.clone())
    }

    pub fn is_connected(&self, actor_id: &str) -> bool {
        self.sessions.contains_key(actor_id)
    }

    /// Idempotent subscribe. Re-joining with the same role is a no-op; a
    /// second delivery agent is refused once the slot is held, preserving
    /// assignment exclusivity.
    pub fn join(&self, order_id: &str, actor_id: &str, role: Role) -> Result<(), AppError> {
        let mut room = self.rooms.entry(order_id.to_string()).or_default();

        if role == Role::DeliveryAgent {
            if let Some(holder) = room.delivery_agent() {
                if holder != actor_id {
                    return Err(AppError::Conflict(format!(
                        "order {order_id} already has an assigned delivery agent"
                    )));
                }
            }
        }

        room.subscribers.insert(actor_id.to_string(), role);
        room.emptied_at = None;
        Ok(())
    }

    /// Forcibly installs `agent_id` as the room's only delivery agent,
    /// evicting a holdover from an earlier dispatch cycle. Reserved for the
    /// dispatch broadcaster's accept path.
    pub fn assign_agent(&self, order_id: &str, agent_id: &str) {
        let mut room = self.rooms.entry(order_id.to_string()).or_default();
        room.subscribers
            .retain(|_, role| *role != Role::DeliveryAgent);
        room.subscribers
            .insert(agent_id.to_string(), Role::DeliveryAgent);
        room.emptied_at = None;
    }

    pub fn leave(&self, order_id: &str, actor_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(order_id) {
            room.subscribers.remove(actor_id);
            if room.subscribers.is_empty() {
                room.emptied_at = Some(Instant::now());
            }
        }
    }

    pub fn role_of(&self, order_id: &str, actor_id: &str) -> Option<Role> {
        self.rooms
            .get(order_id)?
            .subscribers
            .get(actor_id)
            .copied()
    }

    pub fn subscribers(&self, order_id: &str) -> Vec<(String, Role)> {
        self.rooms
            .get(order_id)
            .map(|room| {
                room.subscribers
                    .iter()
                    .map(|(id, role)| (id.clone(), *role))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fan an event out to every subscriber except the optional sender.
    /// An unknown or empty room is a no-op: orders get dispatched before
    /// anyone has joined the live room.
    pub fn broadcast(&self, order_id: &str, event: &ServerEvent, exclude: Option<&str>) {
        let targets: Vec<String> = match self.rooms.get(order_id) {
            Some(room) => room
                .subscribers
                .keys()
                .filter(|id| exclude != Some(id.as_str()))
                .cloned()
                .collect(),
            None => return,
        };

        for actor_id in targets {
            self.send_to(&actor_id, event);
        }
    }

    /// Direct delivery to one session. Disconnected actors are skipped; a
    /// missed push is superseded by the next one.
    pub fn send_to(&self, actor_id: &str, event: &ServerEvent) {
        if let Some(session) = self.sessions.get(actor_id) {
            if session.tx.send(event.clone()).is_err() {
                debug!(actor_id, "session channel closed, event dropped");
            }
        }
    }

    pub fn with_room<T>(&self, order_id: &str, f: impl FnOnce(&OrderRoom) -> T) -> Option<T> {
        self.rooms.get(order_id).map(|room| f(room.value()))
    }

    pub fn update_room<T>(
        &self,
        order_id: &str,
        f: impl FnOnce(&mut OrderRoom) -> T,
    ) -> Option<T> {
        self.rooms.get_mut(order_id).map(|mut room| f(room.value_mut()))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Rooms the route poller cares about: both ends known, somebody still
    /// listening.
    pub fn rooms_with_both_positions(&self) -> Vec<(String, GeoPoint, GeoPoint, Option<f64>)> {
        self.rooms
            .iter()
            .filter_map(|entry| {
                let room = entry.value();
                if room.subscribers.is_empty() {
                    return None;
                }
                let agent = room.last_agent_location?;
                let customer = room.last_customer_location?;
                Some((
                    entry.key().clone(),
                    agent.location,
                    customer.location,
                    room.bearing_agent_to_customer(),
                ))
            })
            .collect()
    }

    /// Drops rooms that have sat empty past the TTL, and empty rooms whose
    /// order reached a terminal status. Returns how many were removed.
    pub fn reap_idle(&self, ttl: Duration, is_terminal: impl Fn(&str) -> bool) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|order_id, room| {
            if !room.subscribers.is_empty() {
                return true;
            }
            if is_terminal(order_id) {
                return false;
            }
            match room.emptied_at {
                Some(at) => at.elapsed() < ttl,
                None => true,
            }
        });
        before - self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RoomRegistry;
    use crate::models::events::ServerEvent;
    use crate::models::room::Role;

    #[test]
    fn join_is_idempotent() {
        let registry = RoomRegistry::new();
        registry.join("O1", "C1", Role::Customer).unwrap();
        registry.join("O1", "C1", Role::Customer).unwrap();

        assert_eq!(registry.subscribers("O1").len(), 1);
    }

    #[test]
    fn second_delivery_agent_is_refused() {
        let registry = RoomRegistry::new();
        registry.join("O1", "A1", Role::DeliveryAgent).unwrap();

        assert!(registry.join("O1", "A2", Role::DeliveryAgent).is_err());
        // the holder itself may rejoin
        registry.join("O1", "A1", Role::DeliveryAgent).unwrap();
    }

    #[test]
    fn assign_agent_evicts_previous_holder() {
        let registry = RoomRegistry::new();
        registry.join("O1", "A1", Role::DeliveryAgent).unwrap();

        registry.assign_agent("O1", "A2");

        assert_eq!(registry.role_of("O1", "A2"), Some(Role::DeliveryAgent));
        assert_eq!(registry.role_of("O1", "A1"), None);
    }

    #[test]
    fn broadcast_to_unknown_room_is_noop() {
        let registry = RoomRegistry::new();
        registry.broadcast(
            "missing",
            &ServerEvent::OrderDispatchTimeout {
                order_id: "missing".to_string(),
            },
            None,
        );
    }

    #[test]
    fn broadcast_excludes_sender() {
        let registry = RoomRegistry::new();
        let mut rx_a = registry.register_session("A", "a");
        let mut rx_b = registry.register_session("B", "b");
        registry.join("O1", "A", Role::Customer).unwrap();
        registry.join("O1", "B", Role::Seller).unwrap();

        let event = ServerEvent::OrderDispatchTimeout {
            order_id: "O1".to_string(),
        };
        registry.broadcast("O1", &event, Some("A"));

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn remove_session_leaves_all_rooms() {
        let registry = RoomRegistry::new();
        let _rx = registry.register_session("C1", "cust");
        registry.join("O1", "C1", Role::Customer).unwrap();
        registry.join("O2", "C1", Role::Customer).unwrap();

        let mut left = registry.remove_session("C1");
        left.sort();
        assert_eq!(left, vec!["O1".to_string(), "O2".to_string()]);
        assert!(registry.subscribers("O1").is_empty());
    }

    #[test]
    fn empty_room_survives_until_ttl() {
        let registry = RoomRegistry::new();
        registry.join("O1", "C1", Role::Customer).unwrap();
        registry.leave("O1", "C1");

        // reconnect tolerance: not reaped before the TTL elapses
        assert_eq!(registry.reap_idle(Duration::from_secs(60), |_| false), 0);
        assert_eq!(registry.reap_idle(Duration::from_secs(0), |_| false), 1);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn empty_terminal_room_is_reaped_immediately() {
        let registry = RoomRegistry::new();
        registry.join("O1", "C1", Role::Customer).unwrap();
        registry.leave("O1", "C1");

        assert_eq!(registry.reap_idle(Duration::from_secs(3600), |_| true), 1);
    }
}
