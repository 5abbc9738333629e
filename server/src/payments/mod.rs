//! Payment records and the data that settles them.

pub mod confirmation;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice speed policy: how much confirmation risk the merchant accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedPolicy {
    HighSpeed,
    MediumSpeed,
    LowMediumSpeed,
    LowSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Observed but below its required confirmation count.
    Processing,
    /// Final; counts toward invoice completion. Never downgraded.
    Settled,
}

/// Chain-side details of one observed transfer, stored alongside the
/// payment record and re-fed into the confirmation policy on every
/// observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneroPaymentData {
    pub subaccount_index: i64,
    pub subaddress_index: i64,
    pub transaction_id: String,
    pub confirmation_count: i64,
    pub block_height: i64,
    /// Chain-enforced unlock floor; dominates any merchant threshold.
    pub lock_time: i64,
    /// Per-invoice override of the speed-policy confirmation default.
    pub invoice_settled_confirmation_threshold: Option<i64>,
}

/// One payment as reconciled by the gateway. The id is deterministic over
/// `(txid, account, subaddress)` so re-observing a transfer upserts instead
/// of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// `{txid}#{account_index}#{subaddress_index}`
    pub id: String,
    pub invoice_id: String,
    pub crypto_code: String,
    /// Address the transfer paid; matches the invoice prompt destination.
    pub destination: String,
    /// Decimal coin amount (converted from atomic units, exact).
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub created: DateTime<Utc>,
    pub details: MoneroPaymentData,
}

/// Deterministic payment id for a transfer observation.
pub fn payment_id(txid: &str, account_index: i64, subaddress_index: i64) -> String {
    format!("{txid}#{account_index}#{subaddress_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_id_is_deterministic() {
        assert_eq!(payment_id("c0ffee", 0, 7), "c0ffee#0#7");
        assert_eq!(
            payment_id("c0ffee", 0, 7),
            payment_id("c0ffee", 0, 7),
        );
        assert_ne!(payment_id("c0ffee", 0, 7), payment_id("c0ffee", 1, 7));
    }
}
