use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{CancelActor, OrderStatus};

/// State transitions published to the notifier. Delivery is fire-and-forget:
/// a transition is never rolled back because nobody was listening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    OrderAssigned {
        order_id: Uuid,
        driver_id: Uuid,
    },
    OfferReceived {
        order_id: Uuid,
        offer_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderCancelled {
        order_id: Uuid,
        actor: CancelActor,
    },
}

impl EngineEvent {
    /// Stable name used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::OrderAssigned { .. } => "order_assigned",
            EngineEvent::OfferReceived { .. } => "offer_received",
            EngineEvent::OrderStatusChanged { .. } => "order_status_changed",
            EngineEvent::OrderCancelled { .. } => "order_cancelled",
        }
    }
}
