use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storefront order lifecycle as the seller dashboard shows it. Only the
/// dispatch flow mutates this here; the durable order store lives in the
/// REST backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Order Placed")]
    OrderPlaced,
    Processing,
    Packing,
    #[serde(rename = "Out for delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Terminal orders are no longer eligible for live coordination.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn new(id: impl Into<String>, status: OrderStatus) -> Self {
        Self {
            id: id.into(),
            status,
            updated_at: Utc::now(),
        }
    }
}
