use chrono::Utc;

use crate::error::AppError;
use crate::models::events::ServerEvent;
use crate::models::room::{GeoPoint, LocationSample, Role};
use crate::state::AppState;

/// Store a position sample for the sender's role and forward it to the rest
/// of the room right away. GPS polling on the client is the rate limiter;
/// the relay does not batch or throttle.
pub fn share_location(
    state: &AppState,
    order_id: &str,
    actor_id: &str,
    location: GeoPoint,
) -> Result<(), AppError> {
    if !location.is_valid() {
        return Err(AppError::BadRequest(format!(
            "coordinates out of range: lat {}, lng {}",
            location.lat, location.lng
        )));
    }

    let role = state
        .registry
        .role_of(order_id, actor_id)
        .ok_or_else(|| AppError::NotSubscribed {
            order_id: order_id.to_string(),
            actor_id: actor_id.to_string(),
        })?;

    let sample = LocationSample {
        location,
        captured_at: Utc::now(),
    };

    let stored = state
        .registry
        .update_room(order_id, |room| match role {
            Role::DeliveryAgent => {
                room.last_agent_location = Some(sample);
                true
            }
            Role::Customer => {
                room.last_customer_location = Some(sample);
                true
            }
            Role::Seller => false,
        })
        .unwrap_or(false);

    if !stored {
        return Err(AppError::BadRequest(
            "only the customer and the delivery agent share a live position".to_string(),
        ));
    }

    state.metrics.location_samples_total.inc();
    state.registry.broadcast(
        order_id,
        &ServerEvent::ReceiveLocation {
            order_id: order_id.to_string(),
            role,
            location,
            captured_at: sample.captured_at,
        },
        Some(actor_id),
    );

    Ok(())
}

/// Re-emit the room's last-known samples to one newly joined subscriber.
/// Nothing stored yet means nothing emitted; clients tolerate the initial
/// no-data state.
pub fn request_location(state: &AppState, order_id: &str, actor_id: &str) {
    let samples: Vec<(Role, LocationSample)> = state
        .registry
        .with_room(order_id, |room| {
            let mut out = Vec::with_capacity(2);
            if let Some(sample) = room.last_agent_location {
                out.push((Role::DeliveryAgent, sample));
            }
            if let Some(sample) = room.last_customer_location {
                out.push((Role::Customer, sample));
            }
            out
        })
        .unwrap_or_default();

    for (role, sample) in samples {
        state.registry.send_to(
            actor_id,
            &ServerEvent::ReceiveLocation {
                order_id: order_id.to_string(),
                role,
                location: sample.location,
                captured_at: sample.captured_at,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{request_location, share_location};
    use crate::models::events::ServerEvent;
    use crate::models::room::{GeoPoint, Role};
    use crate::state::AppState;

    fn state() -> AppState {
        AppState::new(Duration::from_secs(10))
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let state = state();
        let _rx = state.registry.register_session("C1", "cust");
        state.registry.join("O1", "C1", Role::Customer).unwrap();

        let result = share_location(&state, "O1", "C1", GeoPoint { lat: 91.0, lng: 0.0 });
        assert!(result.is_err());

        // no room state change on validation failure
        let stored = state
            .registry
            .with_room("O1", |room| room.last_customer_location.is_some())
            .unwrap();
        assert!(!stored);
    }

    #[test]
    fn forwards_sample_to_other_subscribers_only() {
        let state = state();
        let mut rx_agent = state.registry.register_session("A1", "agent");
        let mut rx_cust = state.registry.register_session("C1", "cust");
        state.registry.join("O1", "A1", Role::DeliveryAgent).unwrap();
        state.registry.join("O1", "C1", Role::Customer).unwrap();

        share_location(&state, "O1", "A1", GeoPoint { lat: 6.91, lng: 79.81 }).unwrap();

        assert!(rx_agent.try_recv().is_err(), "sender must not hear its own echo");
        match rx_cust.try_recv().unwrap() {
            ServerEvent::ReceiveLocation { role, location, .. } => {
                assert_eq!(role, Role::DeliveryAgent);
                assert!((location.lat - 6.91).abs() < 1e-12);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn request_location_replays_both_samples() {
        let state = state();
        let _rx_agent = state.registry.register_session("A1", "agent");
        let _rx_cust = state.registry.register_session("C1", "cust");
        state.registry.join("O2", "A1", Role::DeliveryAgent).unwrap();
        state.registry.join("O2", "C1", Role::Customer).unwrap();

        share_location(&state, "O2", "C1", GeoPoint { lat: 6.9, lng: 79.8 }).unwrap();
        share_location(&state, "O2", "A1", GeoPoint { lat: 6.91, lng: 79.81 }).unwrap();

        let mut rx_obs = state.registry.register_session("S1", "seller");
        state.registry.join("O2", "S1", Role::Seller).unwrap();
        request_location(&state, "O2", "S1");

        let mut seen = Vec::new();
        while let Ok(event) = rx_obs.try_recv() {
            if let ServerEvent::ReceiveLocation { role, .. } = event {
                seen.push(role);
            }
        }
        assert!(seen.contains(&Role::DeliveryAgent));
        assert!(seen.contains(&Role::Customer));
    }

    #[test]
    fn request_location_with_no_samples_emits_nothing() {
        let state = state();
        let mut rx = state.registry.register_session("C1", "cust");
        state.registry.join("O3", "C1", Role::Customer).unwrap();

        request_location(&state, "O3", "C1");
        assert!(rx.try_recv().is_err());
    }
}
