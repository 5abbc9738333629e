//! Error taxonomy for daemon/wallet RPC interaction.
//!
//! The split that matters operationally is `Unavailable` (transport failure,
//! drives the availability tracker, retried on the next poll cycle) versus
//! `Rejected` (the RPC returned a structured error object; surfaced to the
//! caller, never retried automatically).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoneroError {
    /// Connection refused, timeout, DNS failure - the endpoint could not be
    /// reached at all.
    #[error("RPC endpoint unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered with a JSON-RPC error object.
    #[error("RPC rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// The endpoint answered 200 but the body could not be decoded into the
    /// expected response model.
    #[error("malformed RPC response: {0}")]
    Malformed(String),

    /// No daemon/wallet client is configured for the requested crypto code.
    #[error("no RPC client configured for {0}")]
    NotConfigured(String),

    #[error("invalid wallet name: {0}")]
    InvalidWalletName(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl MoneroError {
    /// True for transport-level failures that should flip availability
    /// rather than be reported to a user.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, MoneroError::Unavailable(_))
    }

    /// True when the RPC itself refused the command.
    pub fn is_rejected(&self) -> bool {
        matches!(self, MoneroError::Rejected { .. })
    }
}
