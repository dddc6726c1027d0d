use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, IneligibleReason};
use crate::models::driver::{Driver, DriverStatus};
use crate::models::order::{Order, ServiceSelector};
use crate::state::AppState;

/// Eligibility predicate shared by both assignment modes: the driver must
/// be online, and either specialized for the order's category or flagged
/// special. Evaluated against a snapshot read; the status precondition on
/// the order itself is re-validated at commit.
pub fn check_claim_eligibility(driver: &Driver, order: &Order) -> Result<(), IneligibleReason> {
    match driver.status {
        DriverStatus::Pending => return Err(IneligibleReason::AwaitingApproval),
        DriverStatus::Rejected => return Err(IneligibleReason::Rejected),
        DriverStatus::Offline => return Err(IneligibleReason::Offline),
        DriverStatus::Online => {}
    }

    if driver.special {
        return Ok(());
    }

    let covers = driver
        .service
        .as_ref()
        .is_some_and(|service| service.covers(&order.service));

    if covers {
        Ok(())
    } else {
        Err(IneligibleReason::CategoryMismatch)
    }
}

/// Brings an approved driver online. The balance gate reads the ledger
/// fresh while holding the driver's entry guard, so a withdrawal that
/// landed a moment earlier is seen. Special drivers bypass the gate.
pub fn set_driver_online(state: &AppState, driver_id: Uuid) -> Result<Driver, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    match driver.status {
        DriverStatus::Pending => return Err(IneligibleReason::AwaitingApproval.into()),
        DriverStatus::Rejected => return Err(IneligibleReason::Rejected.into()),
        DriverStatus::Online => return Ok(driver.clone()),
        DriverStatus::Offline => {}
    }

    let balance = state.wallet.balance(driver_id);
    driver.wallet_balance = balance;

    if !driver.special && balance < state.min_wallet_balance {
        return Err(IneligibleReason::InsufficientBalance {
            balance,
            required: state.min_wallet_balance,
        }
        .into());
    }

    driver.status = DriverStatus::Online;
    state.metrics.drivers_online.inc();
    info!(driver_id = %driver_id, "driver online");

    Ok(driver.clone())
}

/// Ungated: an approved driver can always step away. Drivers still in
/// review keep their status.
pub fn set_driver_offline(state: &AppState, driver_id: Uuid) -> Result<Driver, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    if driver.status == DriverStatus::Online {
        driver.status = DriverStatus::Offline;
        state.metrics.drivers_online.dec();
        info!(driver_id = %driver_id, "driver offline");
    }

    Ok(driver.clone())
}

/// Admin authority action; not subject to the balance gate. Approval lands
/// the driver in `offline`; going online stays the driver's own move.
pub fn approve_driver(
    state: &AppState,
    driver_id: Uuid,
    service: Option<ServiceSelector>,
    special: Option<bool>,
) -> Result<Driver, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    if driver.status != DriverStatus::Pending {
        return Err(AppError::Conflict(format!(
            "driver {driver_id} has already been reviewed"
        )));
    }

    driver.status = DriverStatus::Offline;
    if service.is_some() {
        driver.service = service;
    }
    if let Some(special) = special {
        driver.special = special;
    }

    info!(driver_id = %driver_id, "driver approved");
    Ok(driver.clone())
}

pub fn reject_driver(state: &AppState, driver_id: Uuid) -> Result<Driver, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&driver_id)
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    if driver.status != DriverStatus::Pending {
        return Err(AppError::Conflict(format!(
            "driver {driver_id} has already been reviewed"
        )));
    }

    driver.status = DriverStatus::Rejected;
    info!(driver_id = %driver_id, "driver rejected");
    Ok(driver.clone())
}
