use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    DeliveryAgent,
    Seller,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Most recent position reported for one role in one room. No history is
/// kept; each sample replaces the previous one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationSample {
    pub location: GeoPoint,
    pub captured_at: DateTime<Utc>,
}

/// Live coordination context for exactly one order. Created lazily on the
/// first join and reaped once empty past the idle TTL (or immediately empty
/// with a terminal order).
#[derive(Debug, Default)]
pub struct OrderRoom {
    pub subscribers: HashMap<String, Role>,
    pub last_agent_location: Option<LocationSample>,
    pub last_customer_location: Option<LocationSample>,
    /// Set when the last subscriber leaves; cleared on rejoin so a quick
    /// reconnect does not lose the room.
    pub emptied_at: Option<Instant>,
}

impl OrderRoom {
    pub fn delivery_agent(&self) -> Option<&str> {
        self.subscribers
            .iter()
            .find(|(_, role)| **role == Role::DeliveryAgent)
            .map(|(actor_id, _)| actor_id.as_str())
    }

    /// Compass heading from the agent towards the customer, for map
    /// rotation. `None` while either position is unknown; callers must not
    /// conflate that with due north.
    pub fn bearing_agent_to_customer(&self) -> Option<f64> {
        let from = self.last_agent_location?;
        let to = self.last_customer_location?;
        Some(geo::initial_bearing_deg(&from.location, &to.location))
    }
}
