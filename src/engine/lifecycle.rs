use tracing::info;
use uuid::Uuid;

use crate::engine::notify::publish;
use crate::error::AppError;
use crate::models::event::EngineEvent;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

/// Delivery progress reported by the assigned driver:
/// `in_progress → picked_up → delivered`, where `picked_up` may be skipped.
/// Legality is checked against the stored status inside the entry guard, so
/// a stale report (or one against a terminal order) conflicts cleanly.
pub async fn advance_order(
    state: &AppState,
    order_id: Uuid,
    driver_id: Uuid,
    to: OrderStatus,
) -> Result<Order, AppError> {
    if !matches!(to, OrderStatus::PickedUp | OrderStatus::Delivered) {
        return Err(AppError::Validation(
            "drivers may only advance an order to picked_up or delivered".to_string(),
        ));
    }

    let (advanced, from) = {
        let mut order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.driver_id != Some(driver_id) {
            return Err(AppError::Forbidden(
                "only the assigned driver may advance this order".to_string(),
            ));
        }

        if !order.status.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "order {} cannot move from {:?} to {:?}",
                order.request_number, order.status, to
            )));
        }

        let from = order.status;
        order.status = to;
        (order.clone(), from)
    };

    if to == OrderStatus::Delivered {
        state.metrics.orders_open.dec();
    }
    info!(order_id = %order_id, from = ?from, to = ?to, "order advanced");

    publish(
        state,
        EngineEvent::OrderStatusChanged { order_id, from, to },
    )
    .await;
    Ok(advanced)
}
