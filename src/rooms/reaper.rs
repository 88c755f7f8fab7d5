use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::state::AppState;

/// Periodically collects rooms left empty past the idle TTL. Emptied rooms
/// are kept around until then so a reconnecting client finds its last-known
/// locations intact.
pub async fn run_room_reaper(state: Arc<AppState>, ttl: Duration, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;

        let reaped = state.registry.reap_idle(ttl, |order_id| {
            state
                .orders
                .get(order_id)
                .map(|order| order.status.is_terminal())
                .unwrap_or(false)
        });

        if reaped > 0 {
            debug!(reaped, "idle order rooms reaped");
        }

        state
            .metrics
            .active_rooms
            .set(state.registry.room_count() as i64);
    }
}
