//! Shared building blocks for the Monero payment gateway: the error
//! taxonomy, the piconero money codec, per-currency configuration and
//! availability summaries, and the in-process event bus.

pub mod error;
pub mod events;
pub mod money;
pub mod types;

pub use error::MoneroError;
pub use events::{EventBus, InvoiceEvent, MoneroEvent};
pub use types::{MoneroConfig, MoneroConfigItem, MoneroSummary};
