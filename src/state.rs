use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::event::EngineEvent;
use crate::models::offer::Offer;
use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::wallet::WalletLedger;

/// Shared stores and channels. The order map entry is the per-order
/// serialization point: every engine mutation validates its precondition
/// and applies its effect while holding that entry's guard, and offer rows
/// are only written under the owning order's guard.
pub struct AppState {
    pub orders: DashMap<Uuid, Order>,
    pub offers: DashMap<Uuid, Offer>,
    pub drivers: DashMap<Uuid, Driver>,
    pub wallet: WalletLedger,
    pub min_wallet_balance: Decimal,
    pub event_tx: mpsc::Sender<EngineEvent>,
    pub event_stream_tx: broadcast::Sender<EngineEvent>,
    pub metrics: Metrics,
    request_counter: AtomicU64,
}

impl AppState {
    pub fn new(
        event_queue_size: usize,
        event_buffer_size: usize,
        min_wallet_balance: Decimal,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (event_tx, event_rx) = mpsc::channel(event_queue_size);
        let (event_stream_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        (
            Self {
                orders: DashMap::new(),
                offers: DashMap::new(),
                drivers: DashMap::new(),
                wallet: WalletLedger::new(),
                min_wallet_balance,
                event_tx,
                event_stream_tx,
                metrics: Metrics::new(),
                request_counter: AtomicU64::new(100_000),
            },
            event_rx,
        )
    }

    /// Issues the next human-readable request number, unique per process.
    pub fn next_request_number(&self) -> String {
        let n = self.request_counter.fetch_add(1, Ordering::Relaxed);
        format!("R-{n}")
    }
}
