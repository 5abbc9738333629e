//! Typed daemon/wallet RPC request and response bodies.
//!
//! Field names follow the wire format of monerod / monero-wallet-rpc.
//! Indices and amounts are carried as `i64`; the values in play fit
//! comfortably and signed arithmetic keeps confirmation math simple.

use serde::{Deserialize, Serialize};

// ---- daemon ----

/// `get_info` (daemon): sync state and heights.
#[derive(Debug, Clone, Deserialize)]
pub struct GetInfoResponse {
    pub height: i64,
    #[serde(default)]
    pub target_height: Option<i64>,
    #[serde(default)]
    pub busy_syncing: bool,
}

/// `get_fee_estimate` (daemon).
#[derive(Debug, Clone, Deserialize)]
pub struct GetFeeEstimateResponse {
    /// Fee per byte in atomic units.
    pub fee: i64,
    #[serde(default)]
    pub quantization_mask: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetFeeEstimateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_blocks: Option<i64>,
}

// ---- wallet ----

/// `get_height` (wallet): how far the wallet has scanned.
#[derive(Debug, Clone, Deserialize)]
pub struct GetHeightResponse {
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetAccountsResponse {
    #[serde(default)]
    pub subaddress_accounts: Vec<SubaddressAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubaddressAccount {
    pub account_index: i64,
    #[serde(default)]
    pub base_address: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetTransfersRequest {
    pub account_index: i64,
    /// Only incoming transfers interest the gateway.
    #[serde(rename = "in")]
    pub incoming: bool,
    pub subaddr_indices: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetTransfersResponse {
    #[serde(rename = "in", default)]
    pub incoming: Option<Vec<TransferItem>>,
}

/// One incoming transfer as reported by the wallet. Read-only; fetched
/// fresh on every reconciliation pass, never persisted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferItem {
    pub address: String,
    pub txid: String,
    /// Atomic units.
    pub amount: i64,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub unlock_time: i64,
    pub subaddr_index: SubaddrIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubaddrIndex {
    pub major: i64,
    pub minor: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetTransferByTxidRequest {
    pub txid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_index: Option<i64>,
}

/// `get_transfer_by_txid`: the summary transfer plus its per-destination
/// breakdown.
#[derive(Debug, Clone, Deserialize)]
pub struct GetTransferByTxidResponse {
    pub transfer: TransferItem,
    #[serde(default)]
    pub transfers: Vec<TransferItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAddressRequest {
    pub account_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAddressResponse {
    pub address: String,
    pub address_index: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountResponse {
    pub account_index: i64,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenWalletRequest {
    pub filename: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateFromKeysRequest {
    pub filename: String,
    pub address: String,
    pub viewkey: String,
    pub password: String,
    pub restore_height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateFromKeysResponse {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetBalanceRequest {
    pub account_index: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetBalanceResponse {
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub unlocked_balance: i64,
}
