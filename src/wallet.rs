use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Spendable balance per driver. Payment capture lives elsewhere; the
/// engine only reads balances for the online gate, and admins credit
/// top-ups. A driver with no ledger entry has a zero balance.
pub struct WalletLedger {
    balances: DashMap<Uuid, Decimal>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
        }
    }

    pub fn balance(&self, driver_id: Uuid) -> Decimal {
        self.balances
            .get(&driver_id)
            .map(|entry| *entry.value())
            .unwrap_or(Decimal::ZERO)
    }

    /// Adds `amount` to the driver's balance and returns the new balance.
    pub fn credit(&self, driver_id: Uuid, amount: Decimal) -> Decimal {
        let mut entry = self.balances.entry(driver_id).or_insert(Decimal::ZERO);
        *entry += amount;
        *entry
    }
}

impl Default for WalletLedger {
    fn default() -> Self {
        Self::new()
    }
}
