use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::engine::eligibility::check_claim_eligibility;
use crate::engine::notify::publish;
use crate::error::AppError;
use crate::models::event::EngineEvent;
use crate::models::offer::Offer;
use crate::models::order::{CancelActor, Order, OrderStatus, PricingOption};
use crate::state::AppState;

/// Direct claim on an auto-accept order. The `status == new` precondition
/// and the `driver_id`/`in_progress` effect commit together under the
/// order's entry guard; of any set of concurrent claims exactly one sees
/// `new` and wins, the rest get a Conflict and change nothing.
pub async fn claim_order(
    state: &AppState,
    order_id: Uuid,
    driver_id: Uuid,
) -> Result<Order, AppError> {
    let driver = state
        .drivers
        .get(&driver_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    let snapshot = state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if snapshot.pricing != PricingOption::AutoAccept {
        return Err(AppError::Validation(
            "order is not direct-claim; submit an offer instead".to_string(),
        ));
    }
    check_claim_eligibility(&driver, &snapshot)?;

    let claimed = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status != OrderStatus::New {
            state
                .metrics
                .assignments_total
                .with_label_values(&["auto_accept", "conflict"])
                .inc();
            return Err(AppError::Conflict(format!(
                "order {} is no longer available",
                order.request_number
            )));
        }

        order.driver_id = Some(driver_id);
        order.status = OrderStatus::InProgress;
        order.clone()
    };

    state
        .metrics
        .assignments_total
        .with_label_values(&["auto_accept", "success"])
        .inc();
    observe_time_to_assignment(state, &claimed, "auto_accept");
    info!(order_id = %order_id, driver_id = %driver_id, "order claimed");

    publish(state, EngineEvent::OrderAssigned { order_id, driver_id }).await;
    Ok(claimed)
}

/// Offer submission under choose-offer mode. The first offer advances the
/// order from `new` to `pending` inside the same guard that validates the
/// submission; later offers see `pending` and leave it there.
pub async fn submit_offer(
    state: &AppState,
    order_id: Uuid,
    driver_id: Uuid,
    price: Decimal,
) -> Result<Offer, AppError> {
    if price <= Decimal::ZERO {
        return Err(AppError::Validation("offer price must be positive".to_string()));
    }

    let driver = state
        .drivers
        .get(&driver_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

    let snapshot = state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if snapshot.pricing != PricingOption::ChooseOffer {
        return Err(AppError::Validation(
            "order does not take offers; claim it directly".to_string(),
        ));
    }
    check_claim_eligibility(&driver, &snapshot)?;

    let (offer, first_offer) = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if !order.status.accepts_offers() {
            return Err(AppError::Conflict(format!(
                "order {} is no longer taking offers",
                order.request_number
            )));
        }

        let first_offer = order.status == OrderStatus::New;
        if first_offer {
            order.status = OrderStatus::Pending;
        }

        let offer = Offer {
            id: Uuid::new_v4(),
            order_id,
            driver_id,
            price,
            accepted: None,
            created_at: Utc::now(),
        };
        // offer rows are only written under the owning order's guard
        state.offers.insert(offer.id, offer.clone());
        (offer, first_offer)
    };

    state.metrics.offers_submitted_total.inc();
    info!(order_id = %order_id, driver_id = %driver_id, offer_id = %offer.id, "offer submitted");

    publish(
        state,
        EngineEvent::OfferReceived {
            order_id,
            offer_id: offer.id,
        },
    )
    .await;
    if first_offer {
        publish(
            state,
            EngineEvent::OrderStatusChanged {
                order_id,
                from: OrderStatus::New,
                to: OrderStatus::Pending,
            },
        )
        .await;
    }

    Ok(offer)
}

/// Resolves the offer book for one order: the targeted offer wins, every
/// other pending offer is closed, the order commits to the offer's driver.
/// Runs entirely under the order's entry guard, so a concurrent acceptance
/// of a sibling offer either happens entirely before or entirely after.
pub async fn accept_offer(
    state: &AppState,
    offer_id: Uuid,
    customer_id: Uuid,
) -> Result<Order, AppError> {
    let offer = state
        .offers
        .get(&offer_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;
    let order_id = offer.order_id;

    // ownership first, before any lifecycle inspection
    {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        if order.customer_id != customer_id {
            return Err(AppError::Forbidden(
                "only the order's customer may resolve offers".to_string(),
            ));
        }
    }

    let accepted = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if !order.status.accepts_offers() {
            state
                .metrics
                .assignments_total
                .with_label_values(&["choose_offer", "conflict"])
                .inc();
            return Err(AppError::Conflict(format!(
                "order {} already has a committed driver or was cancelled",
                order.request_number
            )));
        }

        // the target may have been rejected while this request was in flight
        let still_pending = state
            .offers
            .get(&offer_id)
            .map(|entry| entry.is_pending())
            .unwrap_or(false);
        if !still_pending {
            return Err(AppError::Conflict(
                "offer has already been resolved".to_string(),
            ));
        }

        order.driver_id = Some(offer.driver_id);
        order.status = OrderStatus::InProgress;

        for mut entry in state.offers.iter_mut() {
            if entry.order_id != order_id {
                continue;
            }
            if entry.id == offer_id {
                entry.accepted = Some(true);
            } else if entry.is_pending() {
                entry.accepted = Some(false);
            }
        }

        order.clone()
    };

    state
        .metrics
        .assignments_total
        .with_label_values(&["choose_offer", "success"])
        .inc();
    observe_time_to_assignment(state, &accepted, "choose_offer");
    info!(order_id = %order_id, offer_id = %offer_id, driver_id = %offer.driver_id, "offer accepted");

    publish(
        state,
        EngineEvent::OrderAssigned {
            order_id,
            driver_id: offer.driver_id,
        },
    )
    .await;
    Ok(accepted)
}

/// Closes a single offer without touching the order. Offers freeze once
/// the order leaves the open states, so the order guard is held across
/// the flip.
pub async fn reject_offer(
    state: &AppState,
    offer_id: Uuid,
    customer_id: Uuid,
) -> Result<Offer, AppError> {
    let offer = state
        .offers
        .get(&offer_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;
    let order_id = offer.order_id;

    let rejected = {
        let order = state
            .orders
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.customer_id != customer_id {
            return Err(AppError::Forbidden(
                "only the order's customer may resolve offers".to_string(),
            ));
        }

        if !order.status.accepts_offers() {
            return Err(AppError::Conflict(format!(
                "offers on order {} are already settled",
                order.request_number
            )));
        }

        let mut entry = state
            .offers
            .get_mut(&offer_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;
        if !entry.is_pending() {
            return Err(AppError::Conflict(
                "offer has already been resolved".to_string(),
            ));
        }

        entry.accepted = Some(false);
        entry.clone()
    };

    info!(order_id = %order_id, offer_id = %offer_id, "offer rejected");
    Ok(rejected)
}

/// Explicit actor-driven cancellation. Customers may cancel only before a
/// driver commits; admins from any non-terminal state. Pending offers are
/// closed, never deleted.
pub async fn cancel_order(
    state: &AppState,
    order_id: Uuid,
    actor: CancelActor,
    customer_id: Option<Uuid>,
) -> Result<Order, AppError> {
    let cancelled = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if actor == CancelActor::Customer {
            let caller = customer_id.ok_or_else(|| {
                AppError::Validation("customer_id is required for customer cancellation".to_string())
            })?;
            if order.customer_id != caller {
                return Err(AppError::Forbidden(
                    "only the order's customer may cancel it".to_string(),
                ));
            }
        }

        if order.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "order {} is already closed",
                order.request_number
            )));
        }

        if actor == CancelActor::Customer && !order.status.accepts_offers() {
            return Err(AppError::Conflict(
                "a driver has already committed; cancellation needs an admin".to_string(),
            ));
        }

        order.status = OrderStatus::Cancelled;
        order.driver_id = None;

        for mut entry in state.offers.iter_mut() {
            if entry.order_id == order_id && entry.is_pending() {
                entry.accepted = Some(false);
            }
        }

        order.clone()
    };

    state.metrics.orders_open.dec();
    info!(order_id = %order_id, actor = ?actor, "order cancelled");

    publish(state, EngineEvent::OrderCancelled { order_id, actor }).await;
    Ok(cancelled)
}

fn observe_time_to_assignment(state: &AppState, order: &Order, mode: &str) {
    let elapsed = (Utc::now() - order.created_at)
        .num_milliseconds()
        .max(0) as f64
        / 1000.0;
    state
        .metrics
        .time_to_assignment_seconds
        .with_label_values(&[mode])
        .observe(elapsed);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use futures::future::join_all;
    use rust_decimal::Decimal;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::IneligibleReason;
    use crate::models::driver::{Driver, DriverStatus};
    use crate::models::order::{
        Location, PaymentMethod, ServiceCategory, ServiceSelector, SubService,
    };

    fn test_state() -> (Arc<AppState>, mpsc::Receiver<EngineEvent>) {
        let (state, rx) = AppState::new(256, 256, Decimal::new(50, 0));
        (Arc::new(state), rx)
    }

    fn parcel_selector() -> ServiceSelector {
        ServiceSelector {
            category: ServiceCategory::ParcelDelivery,
            sub_service: None,
        }
    }

    fn insert_online_driver(state: &AppState, service: Option<ServiceSelector>, special: bool) -> Uuid {
        let driver = Driver {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: DriverStatus::Online,
            service,
            wallet_balance: Decimal::new(100, 0),
            special,
            vehicle_id: None,
            created_at: Utc::now(),
        };
        let id = driver.id;
        state.drivers.insert(id, driver);
        id
    }

    fn insert_order(state: &AppState, pricing: PricingOption) -> (Uuid, Uuid) {
        let customer_id = Uuid::new_v4();
        let order = Order {
            id: Uuid::new_v4(),
            request_number: state.next_request_number(),
            customer_id,
            service: parcel_selector(),
            pickup: Location {
                address: "1 Dock Rd".to_string(),
                point: None,
            },
            dropoff: Location {
                address: "9 Pier Ave".to_string(),
                point: None,
            },
            scheduled_for: None,
            total_amount: Decimal::new(120, 0),
            driver_share: Decimal::new(90, 0),
            payment_method: PaymentMethod::Cash,
            notes: None,
            pricing,
            status: OrderStatus::New,
            driver_id: None,
            created_at: Utc::now(),
        };
        let id = order.id;
        state.orders.insert(id, order);
        (id, customer_id)
    }

    fn order_snapshot(state: &AppState, order_id: Uuid) -> Order {
        state.orders.get(&order_id).unwrap().clone()
    }

    #[tokio::test]
    async fn claim_assigns_driver_and_advances_status() {
        let (state, mut rx) = test_state();
        let driver_id = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, _) = insert_order(&state, PricingOption::AutoAccept);

        let claimed = claim_order(&state, order_id, driver_id).await.unwrap();
        assert_eq!(claimed.status, OrderStatus::InProgress);
        assert_eq!(claimed.driver_id, Some(driver_id));

        assert_eq!(
            rx.recv().await,
            Some(EngineEvent::OrderAssigned {
                order_id,
                driver_id
            })
        );
    }

    #[tokio::test]
    async fn second_claim_conflicts_and_changes_nothing() {
        let (state, _rx) = test_state();
        let winner = insert_online_driver(&state, Some(parcel_selector()), false);
        let loser = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, _) = insert_order(&state, PricingOption::AutoAccept);

        claim_order(&state, order_id, winner).await.unwrap();
        let err = claim_order(&state, order_id, loser).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let order = order_snapshot(&state, order_id);
        assert_eq!(order.driver_id, Some(winner));
        assert_eq!(order.status, OrderStatus::InProgress);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_produce_exactly_one_winner() {
        let (state, _rx) = test_state();
        let (order_id, _) = insert_order(&state, PricingOption::AutoAccept);

        let drivers: Vec<Uuid> = (0..8)
            .map(|_| insert_online_driver(&state, Some(parcel_selector()), false))
            .collect();

        let results = join_all(drivers.iter().map(|&driver_id| {
            let state = state.clone();
            tokio::spawn(async move { claim_order(&state, order_id, driver_id).await })
        }))
        .await;

        let mut winners = Vec::new();
        let mut conflicts = 0;
        for result in results {
            match result.unwrap() {
                Ok(order) => winners.push(order.driver_id.unwrap()),
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(conflicts, drivers.len() - 1);
        assert_eq!(order_snapshot(&state, order_id).driver_id, Some(winners[0]));
    }

    #[tokio::test]
    async fn claim_rejects_offer_mode_orders() {
        let (state, _rx) = test_state();
        let driver_id = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, _) = insert_order(&state, PricingOption::ChooseOffer);

        let err = claim_order(&state, order_id, driver_id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn claim_gates_on_eligibility() {
        let (state, _rx) = test_state();
        let (order_id, _) = insert_order(&state, PricingOption::AutoAccept);

        let towing = ServiceSelector {
            category: ServiceCategory::Towing,
            sub_service: Some(SubService::FlatbedTruck),
        };
        let mismatched = insert_online_driver(&state, Some(towing), false);
        let err = claim_order(&state, order_id, mismatched).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Ineligible(IneligibleReason::CategoryMismatch)
        ));

        // special overrides the category match
        let special = insert_online_driver(&state, Some(towing), true);
        assert!(claim_order(&state, order_id, special).await.is_ok());
    }

    #[tokio::test]
    async fn first_offer_moves_order_to_pending() {
        let (state, _rx) = test_state();
        let d1 = insert_online_driver(&state, Some(parcel_selector()), false);
        let d2 = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, _) = insert_order(&state, PricingOption::ChooseOffer);

        submit_offer(&state, order_id, d1, Decimal::new(100, 0))
            .await
            .unwrap();
        assert_eq!(order_snapshot(&state, order_id).status, OrderStatus::Pending);

        // idempotent: a second offer does not re-trigger the transition
        submit_offer(&state, order_id, d2, Decimal::new(90, 0))
            .await
            .unwrap();
        assert_eq!(order_snapshot(&state, order_id).status, OrderStatus::Pending);

        let offers: Vec<Offer> = state
            .offers
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .map(|entry| entry.value().clone())
            .collect();
        assert_eq!(offers.len(), 2);
        assert!(offers.iter().all(Offer::is_pending));
    }

    #[tokio::test]
    async fn offers_rejected_on_auto_accept_orders() {
        let (state, _rx) = test_state();
        let driver_id = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, _) = insert_order(&state, PricingOption::AutoAccept);

        let err = submit_offer(&state, order_id, driver_id, Decimal::new(80, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn acceptance_resolves_the_whole_offer_book() {
        let (state, _rx) = test_state();
        let d1 = insert_online_driver(&state, Some(parcel_selector()), false);
        let d2 = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, customer_id) = insert_order(&state, PricingOption::ChooseOffer);

        let first = submit_offer(&state, order_id, d1, Decimal::new(100, 0))
            .await
            .unwrap();
        let second = submit_offer(&state, order_id, d2, Decimal::new(90, 0))
            .await
            .unwrap();

        let order = accept_offer(&state, second.id, customer_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.driver_id, Some(d2));

        assert_eq!(state.offers.get(&second.id).unwrap().accepted, Some(true));
        assert_eq!(state.offers.get(&first.id).unwrap().accepted, Some(false));

        // the losing offer can no longer be accepted
        let err = accept_offer(&state, first.id, customer_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acceptances_accept_at_most_one_offer() {
        let (state, _rx) = test_state();
        let (order_id, customer_id) = insert_order(&state, PricingOption::ChooseOffer);

        let mut offer_ids = Vec::new();
        for _ in 0..6 {
            let driver = insert_online_driver(&state, Some(parcel_selector()), false);
            let offer = submit_offer(&state, order_id, driver, Decimal::new(75, 0))
                .await
                .unwrap();
            offer_ids.push(offer.id);
        }

        let results = join_all(offer_ids.iter().map(|&offer_id| {
            let state = state.clone();
            tokio::spawn(async move { accept_offer(&state, offer_id, customer_id).await })
        }))
        .await;

        let successes = results
            .into_iter()
            .filter(|result| matches!(result, Ok(Ok(_))))
            .count();
        assert_eq!(successes, 1);

        let accepted_count = state
            .offers
            .iter()
            .filter(|entry| entry.order_id == order_id && entry.accepted == Some(true))
            .count();
        assert_eq!(accepted_count, 1);
        assert!(
            state
                .offers
                .iter()
                .filter(|entry| entry.order_id == order_id)
                .all(|entry| entry.accepted.is_some())
        );
    }

    #[tokio::test]
    async fn only_the_owner_resolves_offers() {
        let (state, _rx) = test_state();
        let driver = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, _customer_id) = insert_order(&state, PricingOption::ChooseOffer);

        let offer = submit_offer(&state, order_id, driver, Decimal::new(60, 0))
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        let err = accept_offer(&state, offer.id, stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = reject_offer(&state, offer.id, stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // nothing moved
        assert_eq!(order_snapshot(&state, order_id).status, OrderStatus::Pending);
        assert!(state.offers.get(&offer.id).unwrap().is_pending());
    }

    #[tokio::test]
    async fn rejection_touches_only_the_target_offer() {
        let (state, _rx) = test_state();
        let d1 = insert_online_driver(&state, Some(parcel_selector()), false);
        let d2 = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, customer_id) = insert_order(&state, PricingOption::ChooseOffer);

        let first = submit_offer(&state, order_id, d1, Decimal::new(100, 0))
            .await
            .unwrap();
        let second = submit_offer(&state, order_id, d2, Decimal::new(95, 0))
            .await
            .unwrap();

        let rejected = reject_offer(&state, first.id, customer_id).await.unwrap();
        assert_eq!(rejected.accepted, Some(false));
        assert!(state.offers.get(&second.id).unwrap().is_pending());
        assert_eq!(order_snapshot(&state, order_id).status, OrderStatus::Pending);

        // a rejected offer cannot be accepted afterwards
        let err = accept_offer(&state, first.id, customer_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn cancellation_closes_pending_offers() {
        let (state, _rx) = test_state();
        let d1 = insert_online_driver(&state, Some(parcel_selector()), false);
        let d2 = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, customer_id) = insert_order(&state, PricingOption::ChooseOffer);

        let first = submit_offer(&state, order_id, d1, Decimal::new(100, 0))
            .await
            .unwrap();
        let second = submit_offer(&state, order_id, d2, Decimal::new(90, 0))
            .await
            .unwrap();

        let cancelled = cancel_order(&state, order_id, CancelActor::Customer, Some(customer_id))
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(state.offers.get(&first.id).unwrap().accepted, Some(false));
        assert_eq!(state.offers.get(&second.id).unwrap().accepted, Some(false));

        // terminal: no further cancellation, no late offers
        let err = cancel_order(&state, order_id, CancelActor::Admin, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = submit_offer(&state, order_id, d1, Decimal::new(85, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn customer_cannot_cancel_once_committed() {
        let (state, _rx) = test_state();
        let driver = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, customer_id) = insert_order(&state, PricingOption::AutoAccept);

        claim_order(&state, order_id, driver).await.unwrap();

        let err = cancel_order(&state, order_id, CancelActor::Customer, Some(customer_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // admin override is allowed and restores the unassigned invariant
        let cancelled = cancel_order(&state, order_id, CancelActor::Admin, None)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.driver_id, None);
    }

    #[tokio::test]
    async fn assignment_invariant_holds_through_the_lifecycle() {
        let (state, _rx) = test_state();
        let driver = insert_online_driver(&state, Some(parcel_selector()), false);
        let (order_id, _) = insert_order(&state, PricingOption::AutoAccept);

        let before = order_snapshot(&state, order_id);
        assert!(before.driver_id.is_none());

        claim_order(&state, order_id, driver).await.unwrap();
        let after = order_snapshot(&state, order_id);
        assert!(after.driver_id.is_some());
        assert_eq!(after.status, OrderStatus::InProgress);
    }
}
