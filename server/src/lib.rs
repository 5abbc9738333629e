//! Payment-gateway service layer for Monero-like coins.
//!
//! The host platform owns invoices and payment persistence; this crate owns
//! reconciliation. It watches daemon/wallet availability, listens for block
//! and transaction notifications, matches wallet transfers against pending
//! invoices and publishes idempotent payment updates over the event bus.
//!
//! Hosts mount [`handlers::configure`] into their actix `App` for the
//! daemon-callback webhook and status endpoint, implement the traits in
//! [`invoices`], and start everything through [`bootstrap::Gateway`].

pub mod bootstrap;
pub mod handlers;
pub mod invoices;
pub mod payments;
pub mod services;

pub use bootstrap::Gateway;
pub use monero_gateway_common::{
    EventBus, InvoiceEvent, MoneroConfig, MoneroConfigItem, MoneroError, MoneroEvent,
    MoneroSummary,
};
pub use monero_gateway_wallet::MoneroRpcProvider;
