use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::room::Role;

/// One relayed chat line. Immutable once stamped; the `(sender_id,
/// timestamp)` pair is the identity receivers dedup on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub order_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: Role,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn dedup_key(&self) -> (String, DateTime<Utc>) {
        (self.sender_id.clone(), self.timestamp)
    }
}
