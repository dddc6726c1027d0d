use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::eligibility;
use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::order::ServiceSelector;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/approve", post(approve_driver))
        .route("/drivers/:id/reject", post(reject_driver))
        .route("/drivers/:id/online", post(driver_online))
        .route("/drivers/:id/offline", post(driver_offline))
        .route("/drivers/:id/wallet/credit", post(credit_wallet))
}

#[derive(Deserialize)]
pub struct RegisterDriverRequest {
    pub user_id: Uuid,
    pub vehicle_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ApproveDriverRequest {
    pub service: Option<ServiceSelector>,
    pub special: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreditWalletRequest {
    pub amount: Decimal,
}

#[derive(Serialize)]
pub struct WalletBalanceResponse {
    pub driver_id: Uuid,
    pub balance: Decimal,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = Driver {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        status: DriverStatus::Pending,
        service: None,
        wallet_balance: Decimal::ZERO,
        special: false,
        vehicle_id: payload.vehicle_id,
        created_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    let drivers = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let driver = state
        .drivers
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    Ok(Json(driver.value().clone()))
}

async fn approve_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver = eligibility::approve_driver(&state, id, payload.service, payload.special)?;
    Ok(Json(driver))
}

async fn reject_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let driver = eligibility::reject_driver(&state, id)?;
    Ok(Json(driver))
}

async fn driver_online(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let driver = eligibility::set_driver_online(&state, id)?;
    Ok(Json(driver))
}

async fn driver_offline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let driver = eligibility::set_driver_offline(&state, id)?;
    Ok(Json(driver))
}

async fn credit_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreditWalletRequest>,
) -> Result<Json<WalletBalanceResponse>, AppError> {
    if payload.amount <= Decimal::ZERO {
        return Err(AppError::Validation("credit amount must be positive".to_string()));
    }
    if !state.drivers.contains_key(&id) {
        return Err(AppError::NotFound(format!("driver {id} not found")));
    }

    let balance = state.wallet.credit(id, payload.amount);
    if let Some(mut driver) = state.drivers.get_mut(&id) {
        driver.wallet_balance = balance;
    }

    Ok(Json(WalletBalanceResponse {
        driver_id: id,
        balance,
    }))
}
