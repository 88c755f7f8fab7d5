use std::time::Duration;

use dashmap::DashMap;

use crate::models::dispatch::DispatchCycle;
use crate::models::order::OrderRecord;
use crate::observability::metrics::Metrics;
use crate::rooms::registry::RoomRegistry;

pub struct AppState {
    pub registry: RoomRegistry,
    pub orders: DashMap<String, OrderRecord>,
    /// Latest dispatch cycle per order. Exclusive entry access to this map
    /// is the serialization point for accept/decline/timeout races.
    pub dispatches: DashMap<String, DispatchCycle>,
    pub dispatch_window: Duration,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(dispatch_window: Duration) -> Self {
        Self {
            registry: RoomRegistry::new(),
            orders: DashMap::new(),
            dispatches: DashMap::new(),
            dispatch_window,
            metrics: Metrics::new(),
        }
    }

    pub fn open_dispatches(&self) -> usize {
        self.dispatches.iter().filter(|e| e.value().is_open()).count()
    }
}
