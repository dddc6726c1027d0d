use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{assignment, lifecycle};
use crate::error::AppError;
use crate::models::offer::Offer;
use crate::models::order::{
    CancelActor, Location, Order, OrderStatus, PaymentMethod, PricingOption, ServiceCategory,
    ServiceSelector,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/claim", post(claim_order))
        .route("/orders/:id/offers", post(submit_offer).get(list_offers))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/advance", post(advance_order))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub service: ServiceSelector,
    pub pickup: Location,
    pub dropoff: Location,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub total_amount: Decimal,
    pub driver_share: Decimal,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub pricing: PricingOption,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub category: Option<ServiceCategory>,
}

#[derive(Deserialize)]
pub struct ClaimRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct SubmitOfferRequest {
    pub driver_id: Uuid,
    pub price: Decimal,
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub customer_id: Uuid,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub actor: CancelActor,
    pub customer_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct AdvanceRequest {
    pub driver_id: Uuid,
    pub to: OrderStatus,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.pickup.address.trim().is_empty() {
        return Err(AppError::Validation("pickup address cannot be empty".to_string()));
    }
    if payload.dropoff.address.trim().is_empty() {
        return Err(AppError::Validation("dropoff address cannot be empty".to_string()));
    }
    if payload.total_amount <= Decimal::ZERO {
        return Err(AppError::Validation("total amount must be positive".to_string()));
    }
    if payload.driver_share < Decimal::ZERO || payload.driver_share > payload.total_amount {
        return Err(AppError::Validation(
            "driver share must be between zero and the total amount".to_string(),
        ));
    }
    if let Some(scheduled_for) = payload.scheduled_for {
        if scheduled_for <= Utc::now() {
            return Err(AppError::Validation(
                "scheduled_for must be in the future".to_string(),
            ));
        }
    }

    let order = Order {
        id: Uuid::new_v4(),
        request_number: state.next_request_number(),
        customer_id: payload.customer_id,
        service: payload.service,
        pickup: payload.pickup,
        dropoff: payload.dropoff,
        scheduled_for: payload.scheduled_for,
        total_amount: payload.total_amount,
        driver_share: payload.driver_share,
        payment_method: payload.payment_method,
        notes: payload.notes,
        pricing: payload.pricing,
        status: OrderStatus::New,
        driver_id: None,
        created_at: Utc::now(),
    };

    state.orders.insert(order.id, order.clone());
    state
        .metrics
        .orders_created_total
        .with_label_values(&[pricing_label(order.pricing)])
        .inc();
    state.metrics.orders_open.inc();

    Ok(Json(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Json<Vec<Order>> {
    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| {
            query.status.is_none_or(|status| entry.status == status)
                && query
                    .category
                    .is_none_or(|category| entry.service.category == category)
        })
        .map(|entry| entry.value().clone())
        .collect();

    orders.sort_by_key(|order| order.created_at);
    Json(orders)
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    Ok(Json(order.value().clone()))
}

async fn claim_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<Order>, AppError> {
    let order = assignment::claim_order(&state, id, payload.driver_id).await?;
    Ok(Json(order))
}

async fn submit_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitOfferRequest>,
) -> Result<Json<Offer>, AppError> {
    let offer = assignment::submit_offer(&state, id, payload.driver_id, payload.price).await?;
    Ok(Json(offer))
}

async fn list_offers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Offer>>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    if order.customer_id != query.customer_id {
        return Err(AppError::Forbidden(
            "only the order's customer may view its offers".to_string(),
        ));
    }
    drop(order);

    let mut offers: Vec<Offer> = state
        .offers
        .iter()
        .filter(|entry| entry.order_id == id)
        .map(|entry| entry.value().clone())
        .collect();

    offers.sort_by_key(|offer| offer.created_at);
    Ok(Json(offers))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Order>, AppError> {
    let order = assignment::cancel_order(&state, id, payload.actor, payload.customer_id).await?;
    Ok(Json(order))
}

async fn advance_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdvanceRequest>,
) -> Result<Json<Order>, AppError> {
    let order = lifecycle::advance_order(&state, id, payload.driver_id, payload.to).await?;
    Ok(Json(order))
}

fn pricing_label(pricing: PricingOption) -> &'static str {
    match pricing {
        PricingOption::AutoAccept => "auto_accept",
        PricingOption::ChooseOffer => "choose_offer",
    }
}
