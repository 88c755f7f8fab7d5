use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateState {
    Offered,
    Accepted,
    Declined,
    Expired,
}

/// One agent's exposure to one dispatch cycle. Transitions exactly once;
/// a re-dispatch after timeout creates fresh candidates rather than
/// re-arming these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchCandidate {
    pub agent_id: String,
    pub offered_at: DateTime<Utc>,
    pub state: CandidateState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Pending,
    Broadcast,
    Accepted,
    TimedOut,
    Retracted,
}

/// One attempt to place an order with a delivery agent, bounded by the
/// acceptance window. At most one candidate ever reaches `Accepted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchCycle {
    pub id: Uuid,
    pub order_id: String,
    pub state: DispatchState,
    pub candidates: Vec<DispatchCandidate>,
    pub window_secs: u64,
    pub offered_at: DateTime<Utc>,
    /// Status the order held before dispatch; restored on timeout or
    /// retraction so the seller can retry.
    pub prior_status: OrderStatus,
    pub assigned_agent: Option<String>,
}

impl DispatchCycle {
    /// A fresh cycle rests in `Pending` until the broadcaster opens it;
    /// only an open cycle accepts candidate responses.
    pub fn new(
        order_id: impl Into<String>,
        candidates: Vec<DispatchCandidate>,
        window_secs: u64,
        prior_status: OrderStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order_id.into(),
            state: DispatchState::Pending,
            candidates,
            window_secs,
            offered_at: Utc::now(),
            prior_status,
            assigned_agent: None,
        }
    }

    pub fn open(&mut self) {
        if self.state == DispatchState::Pending {
            self.state = DispatchState::Broadcast;
        }
    }

    pub fn candidate_mut(&mut self, agent_id: &str) -> Option<&mut DispatchCandidate> {
        self.candidates.iter_mut().find(|c| c.agent_id == agent_id)
    }

    pub fn is_open(&self) -> bool {
        self.state == DispatchState::Broadcast
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchCycle, DispatchState};
    use crate::models::order::OrderStatus;

    #[test]
    fn cycle_is_pending_until_opened() {
        let mut cycle = DispatchCycle::new("O1", Vec::new(), 30, OrderStatus::OrderPlaced);
        assert_eq!(cycle.state, DispatchState::Pending);
        assert!(!cycle.is_open());

        cycle.open();
        assert!(cycle.is_open());

        // opening is a one-way door
        cycle.state = DispatchState::Accepted;
        cycle.open();
        assert_eq!(cycle.state, DispatchState::Accepted);
    }
}
