use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::ServiceSelector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    /// Registered, awaiting admin review.
    Pending,
    Online,
    Offline,
    /// Admin declined the registration; excluded from all gating.
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: DriverStatus,
    /// Specialization, set by the admin at approval time.
    pub service: Option<ServiceSelector>,
    /// Denormalized ledger balance; refreshed on every online-gate check.
    pub wallet_balance: Decimal,
    /// Exempts the driver from the balance gate and the category match.
    pub special: bool,
    pub vehicle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
