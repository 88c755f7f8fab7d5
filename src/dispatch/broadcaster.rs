use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::dispatch::{CandidateState, DispatchCandidate, DispatchCycle, DispatchState};
use crate::models::events::ServerEvent;
use crate::models::order::{OrderRecord, OrderStatus};
use crate::state::AppState;

/// Offer an order to a pool of delivery agents and arm the acceptance
/// window. The cycle enters `Broadcast` even if no candidate is connected;
/// an empty pool is indistinguishable from nobody accepting and simply
/// times out.
pub fn dispatch(
    state: &Arc<AppState>,
    order_id: &str,
    agent_ids: Vec<String>,
) -> Result<DispatchCycle, AppError> {
    let now = Utc::now();
    let window = state.dispatch_window;

    let mut candidates: Vec<DispatchCandidate> = Vec::with_capacity(agent_ids.len());
    for agent_id in agent_ids {
        if candidates.iter().any(|c| c.agent_id == agent_id) {
            continue;
        }
        candidates.push(DispatchCandidate {
            agent_id,
            offered_at: now,
            state: CandidateState::Offered,
        });
    }

    let cycle = {
        let entry = state.dispatches.entry(order_id.to_string());
        if let Entry::Occupied(existing) = &entry {
            if existing.get().is_open() {
                return Err(AppError::Conflict(format!(
                    "dispatch for order {order_id} is already in progress"
                )));
            }
        }

        let prior_status = {
            let mut order = state
                .orders
                .entry(order_id.to_string())
                .or_insert_with(|| OrderRecord::new(order_id, OrderStatus::OrderPlaced));
            if order.status.is_terminal() {
                return Err(AppError::Conflict(format!(
                    "order {order_id} is already {:?}",
                    order.status
                )));
            }
            let prior = order.status;
            order.status = OrderStatus::OutForDelivery;
            order.updated_at = now;
            prior
        };

        let mut cycle =
            DispatchCycle::new(order_id, candidates, window.as_secs(), prior_status);
        cycle.offered_at = now;
        cycle.open();
        entry.insert(cycle.clone());
        cycle
    };

    for candidate in &cycle.candidates {
        state.registry.send_to(
            &candidate.agent_id,
            &ServerEvent::DispatchOffer {
                order_id: order_id.to_string(),
                offered_at: cycle.offered_at,
                window_secs: cycle.window_secs,
            },
        );
        state.metrics.dispatch_offers_total.inc();
    }

    info!(
        order_id,
        cycle_id = %cycle.id,
        candidates = cycle.candidates.len(),
        window_secs = cycle.window_secs,
        "order dispatched to delivery agents"
    );

    let timer_state = state.clone();
    let timer_order = order_id.to_string();
    let cycle_id = cycle.id;
    tokio::spawn(async move {
        tokio::time::sleep(window).await;
        resolve_timeout(&timer_state, &timer_order, cycle_id);
    });

    Ok(cycle)
}

/// First accept wins. The exclusive map entry is the sequencing point: a
/// second accept arriving "simultaneously" blocks on it and then finds the
/// cycle already resolved.
pub fn accept(state: &AppState, order_id: &str, agent_id: &str) -> Result<DispatchCycle, AppError> {
    let (cycle, losers) = {
        let mut entry = state.dispatches.get_mut(order_id).ok_or_else(|| {
            state.metrics.accept_rejections_total.inc();
            AppError::OfferUnavailable(format!("no dispatch in progress for order {order_id}"))
        })?;
        let cycle = entry.value_mut();

        if !cycle.is_open() {
            state.metrics.accept_rejections_total.inc();
            return Err(AppError::OfferUnavailable(format!(
                "order {order_id} was already resolved"
            )));
        }

        match cycle.candidate_mut(agent_id) {
            Some(candidate) if candidate.state == CandidateState::Offered => {
                candidate.state = CandidateState::Accepted;
            }
            _ => {
                state.metrics.accept_rejections_total.inc();
                return Err(AppError::OfferUnavailable(format!(
                    "agent {agent_id} holds no open offer for order {order_id}"
                )));
            }
        }
        cycle.state = DispatchState::Accepted;
        cycle.assigned_agent = Some(agent_id.to_string());

        let mut losers = Vec::new();
        for candidate in cycle.candidates.iter_mut() {
            if candidate.agent_id != agent_id && candidate.state == CandidateState::Offered {
                candidate.state = CandidateState::Expired;
                losers.push(candidate.agent_id.clone());
            }
        }

        (cycle.clone(), losers)
    };

    // the winner becomes the room's exclusive delivery agent
    state.registry.assign_agent(order_id, agent_id);

    let agent_name = state
        .registry
        .session_name(agent_id)
        .unwrap_or_else(|| agent_id.to_string());

    for loser in &losers {
        state.registry.send_to(
            loser,
            &ServerEvent::OfferRevoked {
                order_id: order_id.to_string(),
                reason: "another agent accepted the order".to_string(),
            },
        );
    }

    state.registry.broadcast(
        order_id,
        &ServerEvent::OrderAssigned {
            order_id: order_id.to_string(),
            agent_id: agent_id.to_string(),
            agent_name,
        },
        Some(agent_id),
    );

    state
        .metrics
        .dispatch_cycles_total
        .with_label_values(&["accepted"])
        .inc();
    info!(order_id, agent_id, cycle_id = %cycle.id, "order accepted by delivery agent");

    Ok(cycle)
}

/// Remove one candidate from consideration. The window and the remaining
/// candidates are unaffected.
pub fn decline(state: &AppState, order_id: &str, agent_id: &str) -> Result<(), AppError> {
    let mut entry = state.dispatches.get_mut(order_id).ok_or_else(|| {
        AppError::OfferUnavailable(format!("no dispatch in progress for order {order_id}"))
    })?;
    let cycle = entry.value_mut();

    if !cycle.is_open() {
        return Err(AppError::OfferUnavailable(format!(
            "order {order_id} was already resolved"
        )));
    }

    match cycle.candidate_mut(agent_id) {
        Some(candidate) if candidate.state == CandidateState::Offered => {
            candidate.state = CandidateState::Declined;
            debug!(order_id, agent_id, "offer declined");
            Ok(())
        }
        _ => Err(AppError::OfferUnavailable(format!(
            "agent {agent_id} holds no open offer for order {order_id}"
        ))),
    }
}

/// Cancel an unresolved dispatch. Outstanding offers expire immediately,
/// regardless of how much window remains.
pub fn retract(state: &AppState, order_id: &str) -> Result<DispatchCycle, AppError> {
    let (cycle, revoked, prior_status) = {
        let mut entry = state
            .dispatches
            .get_mut(order_id)
            .ok_or_else(|| AppError::NotFound(format!("no dispatch for order {order_id}")))?;
        let cycle = entry.value_mut();

        if !cycle.is_open() {
            return Err(AppError::Conflict(format!(
                "dispatch for order {order_id} was already resolved"
            )));
        }

        cycle.state = DispatchState::Retracted;
        let revoked = expire_offered(cycle);
        (cycle.clone(), revoked, cycle.prior_status)
    };

    revert_order_status(state, order_id, prior_status);

    for agent_id in &revoked {
        state.registry.send_to(
            agent_id,
            &ServerEvent::OfferRevoked {
                order_id: order_id.to_string(),
                reason: "the dispatch was retracted".to_string(),
            },
        );
    }

    state
        .metrics
        .dispatch_cycles_total
        .with_label_values(&["retracted"])
        .inc();
    info!(order_id, cycle_id = %cycle.id, "dispatch retracted");

    Ok(cycle)
}

/// Window expiry. Armed per cycle; carries the cycle id so a timer from a
/// superseded cycle is inert. A late accept racing this transition loses on
/// the same map entry and surfaces as `OfferUnavailable`.
pub fn resolve_timeout(state: &AppState, order_id: &str, cycle_id: Uuid) {
    let (expired, prior_status) = {
        let Some(mut entry) = state.dispatches.get_mut(order_id) else {
            return;
        };
        let cycle = entry.value_mut();
        if cycle.id != cycle_id || !cycle.is_open() {
            return;
        }

        cycle.state = DispatchState::TimedOut;
        (expire_offered(cycle), cycle.prior_status)
    };

    revert_order_status(state, order_id, prior_status);

    let timeout_event = ServerEvent::OrderDispatchTimeout {
        order_id: order_id.to_string(),
    };
    for agent_id in &expired {
        state.registry.send_to(agent_id, &timeout_event);
    }
    // the seller's room view shows "no rider found"
    state.registry.broadcast(order_id, &timeout_event, None);

    state
        .metrics
        .dispatch_cycles_total
        .with_label_values(&["timed_out"])
        .inc();
    warn!(order_id, %cycle_id, "no delivery agent accepted within the window");
}

fn expire_offered(cycle: &mut DispatchCycle) -> Vec<String> {
    let mut expired = Vec::new();
    for candidate in cycle.candidates.iter_mut() {
        if candidate.state == CandidateState::Offered {
            candidate.state = CandidateState::Expired;
            expired.push(candidate.agent_id.clone());
        }
    }
    expired
}

fn revert_order_status(state: &AppState, order_id: &str, prior_status: OrderStatus) {
    if let Some(mut order) = state.orders.get_mut(order_id) {
        // a cancellation or delivery recorded mid-window is final; the
        // window's outcome must not resurrect the order
        if order.status.is_terminal() {
            return;
        }
        order.status = prior_status;
        order.updated_at = Utc::now();
    }
}
