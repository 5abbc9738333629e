//! Confirmation-threshold policy.
//!
//! Pure and stateless: re-evaluated on every observation of a transfer.
//! The chain's lock time always dominates; the merchant's explicit
//! per-invoice override comes next; speed-policy defaults last.

use super::{MoneroPaymentData, SpeedPolicy};

/// How many confirmations this payment needs before it is settled.
pub fn confirmations_required(details: &MoneroPaymentData, speed_policy: SpeedPolicy) -> i64 {
    if details.confirmation_count < details.lock_time {
        return details.lock_time - details.confirmation_count;
    }
    if let Some(threshold) = details.invoice_settled_confirmation_threshold {
        return threshold;
    }
    match speed_policy {
        SpeedPolicy::HighSpeed => 0,
        SpeedPolicy::MediumSpeed => 1,
        SpeedPolicy::LowMediumSpeed => 2,
        SpeedPolicy::LowSpeed => 6,
    }
}

pub fn is_settled(details: &MoneroPaymentData, speed_policy: SpeedPolicy) -> bool {
    confirmations_required(details, speed_policy) <= details.confirmation_count
}
