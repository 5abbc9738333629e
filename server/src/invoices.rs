//! Contracts toward the host platform.
//!
//! Invoices, payment persistence and settings live outside this crate; the
//! reconciliation engine consumes them through these traits. Implementations
//! must provide upsert semantics for payments and serialize conflicting
//! writes to the same invoice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::payments::{PaymentRecord, SpeedPolicy};

/// The receiving side of one invoice for one chain payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPrompt {
    /// Subaddress the payer was shown.
    pub destination: String,
    pub account_index: i64,
    pub address_index: i64,
    /// Whether the payment method has been activated on the invoice UI.
    pub activated: bool,
    /// Merchant override of the speed-policy confirmation default.
    pub settled_confirmation_threshold: Option<i64>,
}

/// Projection over a monitored invoice: everything reconciliation needs,
/// nothing it does not own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceEntity {
    pub id: String,
    pub speed_policy: SpeedPolicy,
    /// Prompt for this currency, if the payment method exists on the invoice.
    pub prompt: Option<PaymentPrompt>,
    /// Amount still due on the invoice, in coin units.
    pub amount_due: Decimal,
    /// Payments already reconciled for this currency.
    pub payments: Vec<PaymentRecord>,
}

impl InvoiceEntity {
    pub fn activated_prompt(&self) -> Option<&PaymentPrompt> {
        self.prompt.as_ref().filter(|p| p.activated)
    }
}

/// Read access to the host's invoice store.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// All invoices monitored for this currency: activated prompt for the
    /// payment method and not yet fully paid.
    async fn get_monitored_invoices(&self, crypto_code: &str)
        -> anyhow::Result<Vec<InvoiceEntity>>;

    /// Resolve the invoice owning a destination address, if any.
    async fn get_invoice_from_address(
        &self,
        crypto_code: &str,
        address: &str,
    ) -> anyhow::Result<Option<InvoiceEntity>>;
}

/// Payment persistence owned by the host.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Insert a new payment record. Returns `None` when the store rejected
    /// it (e.g. the id already exists - a concurrent pass won the race).
    async fn add_payment(&self, payment: PaymentRecord) -> anyhow::Result<Option<PaymentRecord>>;

    /// Batch-update existing payment records by id.
    async fn update_payments(&self, payments: Vec<PaymentRecord>) -> anyhow::Result<()>;
}

/// Activates a payment method on an invoice, allocating a fresh receiving
/// address for any remaining balance.
#[async_trait]
pub trait InvoiceActivator: Send + Sync {
    async fn activate_invoice_payment_method(
        &self,
        invoice_id: &str,
        crypto_code: &str,
    ) -> anyhow::Result<()>;
}

/// Persisted state of the gateway-managed view-only wallet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletState {
    pub active_wallet_name: Option<String>,
    pub active_wallet_password: Option<String>,
    pub last_activated_at: Option<DateTime<Utc>>,
    pub last_activated_by_store_id: Option<String>,
    #[serde(default)]
    pub is_connected: bool,
}

impl WalletState {
    pub fn is_initialized(&self) -> bool {
        self.active_wallet_name
            .as_deref()
            .is_some_and(|name| !name.is_empty())
    }
}

/// Settings persistence owned by the host.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_wallet_state(&self) -> anyhow::Result<Option<WalletState>>;
    async fn update_wallet_state(&self, state: &WalletState) -> anyhow::Result<()>;
}
