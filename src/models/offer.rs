use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A driver's priced bid on a choose-offer order.
///
/// `accepted` is tri-state: `None` while the customer has not decided,
/// `Some(true)` for the single winning offer, `Some(false)` once rejected
/// or closed. At most one offer per order ever carries `Some(true)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub order_id: Uuid,
    pub driver_id: Uuid,
    pub price: Decimal,
    pub accepted: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn is_pending(&self) -> bool {
        self.accepted.is_none()
    }
}
