use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::event::EngineEvent;
use crate::state::AppState;

/// Queues an event for the notifier relay. Fire-and-forget: a dropped or
/// undeliverable event never affects the state transition that produced it.
pub async fn publish(state: &AppState, event: EngineEvent) {
    match state.event_tx.send(event).await {
        Ok(()) => state.metrics.events_in_queue.inc(),
        Err(err) => warn!(error = %err, "event dropped: notifier queue closed"),
    }
}

/// Background relay between the engine and its observers: drains the event
/// queue, logs each transition, and fans out to the broadcast channel that
/// backs the `/ws` stream.
pub async fn run_notifier(state: Arc<AppState>, mut event_rx: mpsc::Receiver<EngineEvent>) {
    info!("notifier relay started");

    while let Some(event) = event_rx.recv().await {
        state.metrics.events_in_queue.dec();
        state
            .metrics
            .events_published_total
            .with_label_values(&[event.kind()])
            .inc();

        match &event {
            EngineEvent::OrderAssigned { order_id, driver_id } => {
                info!(order_id = %order_id, driver_id = %driver_id, "order assigned");
            }
            EngineEvent::OfferReceived { order_id, offer_id } => {
                info!(order_id = %order_id, offer_id = %offer_id, "offer received");
            }
            EngineEvent::OrderStatusChanged { order_id, from, to } => {
                info!(order_id = %order_id, from = ?from, to = ?to, "order status changed");
            }
            EngineEvent::OrderCancelled { order_id, actor } => {
                info!(order_id = %order_id, actor = ?actor, "order cancelled");
            }
        }

        // subscribers come and go; nobody listening is not an error
        let _ = state.event_stream_tx.send(event);
    }

    warn!("notifier relay stopped: event channel closed");
}
