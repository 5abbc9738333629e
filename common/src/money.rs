//! Piconero conversion.
//!
//! Amounts cross the RPC boundary as atomic units (1 XMR = 10^9 piconero for
//! the coins this gateway targets) and cross the invoice boundary as
//! decimals. Both directions must be exact for any amount that fits in an
//! `i64`; `from_decimal(to_decimal(x)) == x` always holds.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::MoneroError;

/// Number of decimal places in the atomic unit.
pub const ATOMIC_UNIT_SCALE: u32 = 9;

/// Convert atomic units to a decimal coin amount. Exact for all inputs.
pub fn to_decimal(piconero: i64) -> Decimal {
    Decimal::new(piconero, ATOMIC_UNIT_SCALE)
}

/// Convert a decimal coin amount to atomic units, rounding to the nearest
/// atomic unit (banker's rounding, matching `round(amount * 10^9)`).
pub fn from_decimal(amount: Decimal) -> Result<i64, MoneroError> {
    let scaled = amount
        .checked_mul(Decimal::from(10i64.pow(ATOMIC_UNIT_SCALE)))
        .ok_or_else(|| MoneroError::InvalidAmount(format!("{amount} overflows atomic units")))?;
    scaled
        .round()
        .to_i64()
        .ok_or_else(|| MoneroError::InvalidAmount(format!("{amount} does not fit in an i64")))
}
