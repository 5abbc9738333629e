//! In-process typed event bus.
//!
//! Two topics: `MoneroEvent` carries inbound triggers (daemon state changes,
//! block/tx notifications) consumed by the reconciliation listener;
//! `InvoiceEvent` carries outbound ledger updates consumed by the host
//! platform. Backed by `tokio::sync::broadcast`; subscribers that lag are
//! allowed to miss events because every consumer converges idempotently on
//! the next trigger.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::types::MoneroSummary;

/// Inbound triggers for the reconciliation listener.
#[derive(Debug, Clone)]
pub enum MoneroEvent {
    /// The `usable` state of a currency flipped.
    DaemonStateChange {
        crypto_code: String,
        summary: Arc<MoneroSummary>,
    },
    /// The daemon notified us of a new block.
    BlockNotify { crypto_code: String, hash: String },
    /// The daemon notified us of a transaction touching the wallet.
    TxNotify { crypto_code: String, hash: String },
}

impl MoneroEvent {
    pub fn crypto_code(&self) -> &str {
        match self {
            MoneroEvent::DaemonStateChange { crypto_code, .. }
            | MoneroEvent::BlockNotify { crypto_code, .. }
            | MoneroEvent::TxNotify { crypto_code, .. } => crypto_code,
        }
    }
}

/// Outbound ledger updates published by the reconciliation listener.
#[derive(Debug, Clone)]
pub enum InvoiceEvent {
    /// A payment record was created for an invoice.
    ReceivedPayment {
        invoice_id: String,
        payment_id: String,
        crypto_code: String,
        amount: Decimal,
    },
    /// One or more payment records of this invoice changed; the invoice
    /// owner should re-evaluate totals. Coalesced to one per invoice per
    /// reconciliation pass.
    InvoiceNeedUpdate { invoice_id: String },
    /// A new block was fully processed for this currency.
    NewBlock { crypto_code: String },
}

/// Cheap-to-clone handle to both topics.
#[derive(Debug, Clone)]
pub struct EventBus {
    monero: broadcast::Sender<MoneroEvent>,
    invoice: broadcast::Sender<InvoiceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (monero, _) = broadcast::channel(capacity);
        let (invoice, _) = broadcast::channel(capacity);
        Self { monero, invoice }
    }

    /// Publish an inbound trigger. Returns the number of subscribers that
    /// received it; zero subscribers is not an error.
    pub fn publish_monero(&self, event: MoneroEvent) -> usize {
        self.monero.send(event).unwrap_or(0)
    }

    pub fn publish_invoice(&self, event: InvoiceEvent) -> usize {
        self.invoice.send(event).unwrap_or(0)
    }

    pub fn subscribe_monero(&self) -> broadcast::Receiver<MoneroEvent> {
        self.monero.subscribe()
    }

    pub fn subscribe_invoice(&self) -> broadcast::Receiver<InvoiceEvent> {
        self.invoice.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
