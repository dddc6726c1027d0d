use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::post;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::assignment;
use crate::error::AppError;
use crate::models::offer::Offer;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/offers/:id/accept", post(accept_offer))
        .route("/offers/:id/reject", post(reject_offer))
}

#[derive(Deserialize)]
pub struct ResolveOfferRequest {
    pub customer_id: Uuid,
}

async fn accept_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveOfferRequest>,
) -> Result<Json<Order>, AppError> {
    let order = assignment::accept_offer(&state, id, payload.customer_id).await?;
    Ok(Json(order))
}

async fn reject_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveOfferRequest>,
) -> Result<Json<Offer>, AppError> {
    let offer = assignment::reject_offer(&state, id, payload.customer_id).await?;
    Ok(Json(offer))
}
