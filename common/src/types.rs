//! Per-currency endpoint configuration and the availability summary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One configured coin: where its daemon and wallet RPC live and, when the
/// gateway manages view-only wallet files, where those files are kept.
/// Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoneroConfigItem {
    /// Daemon JSON-RPC base URI, e.g. `http://127.0.0.1:18081`.
    pub daemon_rpc_uri: String,
    /// Wallet JSON-RPC base URI, e.g. `http://127.0.0.1:18083`.
    pub wallet_rpc_uri: String,
    /// HTTP basic auth for the daemon RPC, if any.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Directory holding wallet files created via `generate_from_keys`.
    pub wallet_directory: Option<String>,
}

/// All configured currencies, keyed by upper-cased crypto code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoneroConfig {
    pub items: HashMap<String, MoneroConfigItem>,
}

impl MoneroConfig {
    /// Single-currency config for XMR from environment variables:
    /// `MONERO_DAEMON_URI`, `MONERO_WALLET_URI`, `MONERO_DAEMON_USER`,
    /// `MONERO_DAEMON_PASSWORD`, `MONERO_WALLET_DIR`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let daemon = std::env::var("MONERO_DAEMON_URI")
            .unwrap_or_else(|_| "http://127.0.0.1:18081".to_string());
        let wallet = std::env::var("MONERO_WALLET_URI")
            .unwrap_or_else(|_| "http://127.0.0.1:18083".to_string());
        config.add(
            "XMR",
            MoneroConfigItem {
                daemon_rpc_uri: daemon,
                wallet_rpc_uri: wallet,
                username: std::env::var("MONERO_DAEMON_USER").ok(),
                password: std::env::var("MONERO_DAEMON_PASSWORD").ok(),
                wallet_directory: std::env::var("MONERO_WALLET_DIR").ok(),
            },
        );
        config
    }

    /// Register a currency. The code is canonicalized to upper case.
    pub fn add(&mut self, crypto_code: &str, item: MoneroConfigItem) {
        self.items.insert(crypto_code.to_uppercase(), item);
    }

    pub fn get(&self, crypto_code: &str) -> Option<&MoneroConfigItem> {
        self.items.get(&crypto_code.to_uppercase())
    }

    pub fn crypto_codes(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }
}

/// Snapshot of daemon + wallet health for one currency. Replaced wholesale
/// on every poll; readers hold an `Arc` to the snapshot and never observe a
/// partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneroSummary {
    pub synced: bool,
    pub current_height: i64,
    pub target_height: i64,
    pub wallet_height: i64,
    pub daemon_available: bool,
    pub wallet_available: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MoneroSummary {
    /// The composite state everything else keys off: the daemon is synced
    /// and the wallet RPC responds.
    pub fn usable(&self) -> bool {
        self.synced && self.wallet_available
    }
}
