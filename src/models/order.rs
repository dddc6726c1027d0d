use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A pickup or dropoff point. The address is what drivers navigate by;
/// coordinates are optional and opaque to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub point: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    ParcelDelivery,
    FoodDelivery,
    GroceryDelivery,
    FurnitureMoving,
    Towing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubService {
    Motorbike,
    Sedan,
    Van,
    PickupTruck,
    FlatbedTruck,
}

/// What kind of work an order needs, or what a driver is specialized in.
/// Compared structurally; there is no free-text matching anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelector {
    pub category: ServiceCategory,
    pub sub_service: Option<SubService>,
}

impl ServiceSelector {
    /// True if a driver with this specialization can serve `required`.
    /// An order that names no sub-service accepts any driver in the
    /// category; an order that names one needs an exact match.
    pub fn covers(&self, required: &ServiceSelector) -> bool {
        if self.category != required.category {
            return false;
        }
        match required.sub_service {
            None => true,
            Some(sub) => self.sub_service == Some(sub),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingOption {
    /// First eligible driver to claim wins the order.
    AutoAccept,
    /// Drivers bid; the customer picks one offer.
    ChooseOffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Wallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelActor {
    Customer,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, visible to eligible drivers, unassigned.
    New,
    /// Has at least one offer but no acceptance yet (choose-offer only).
    Pending,
    /// A driver is assigned and committed.
    InProgress,
    /// Driver has retrieved the goods; optional intermediate signal.
    PickedUp,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Still open for offer submission.
    pub fn accepts_offers(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Pending)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (New, Pending) => true,
            (New, InProgress) | (Pending, InProgress) => true,
            (InProgress, PickedUp) => true,
            // picked_up is optional; not all service types signal it
            (InProgress, Delivered) | (PickedUp, Delivered) => true,
            (current, Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable number used for support lookups, unique per order.
    pub request_number: String,
    pub customer_id: Uuid,
    pub service: ServiceSelector,
    pub pickup: Location,
    pub dropoff: Location,
    /// Absent means ASAP.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub total_amount: Decimal,
    pub driver_share: Decimal,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub pricing: PricingOption,
    pub status: OrderStatus,
    pub driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
