use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

/// Why a driver was turned away from an action. Carried verbatim to the
/// client so the UI can point at the corrective step (top up the wallet,
/// wait for approval, go online).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IneligibleReason {
    #[error("driver is awaiting approval")]
    AwaitingApproval,

    #[error("driver registration was rejected")]
    Rejected,

    #[error("driver is offline")]
    Offline,

    #[error("driver does not serve this category")]
    CategoryMismatch,

    #[error("wallet balance {balance} is below the required minimum {required}")]
    InsufficientBalance { balance: Decimal, required: Decimal },
}

impl IneligibleReason {
    pub fn code(&self) -> &'static str {
        match self {
            IneligibleReason::AwaitingApproval => "awaiting_approval",
            IneligibleReason::Rejected => "rejected",
            IneligibleReason::Offline => "offline",
            IneligibleReason::CategoryMismatch => "category_mismatch",
            IneligibleReason::InsufficientBalance { .. } => "insufficient_balance",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A status or offer-state precondition no longer held at commit time.
    /// Distinct from NotFound so clients re-fetch instead of giving up.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("driver ineligible: {0}")]
    Ineligible(#[from] IneligibleReason),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::Ineligible(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": reason.to_string(), "reason": reason.code() }),
            ),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}
