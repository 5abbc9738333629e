//! Per-currency RPC provider.
//!
//! Owns one daemon client and one wallet client per configured crypto code
//! (built once at startup, never mutated), tracks an availability summary
//! per currency, and exposes the wallet-lifecycle and transfer-query RPCs
//! the rest of the gateway needs.
//!
//! Summaries are replaced atomically: the map holds `Arc<MoneroSummary>`
//! values and a poll installs a whole new snapshot, so concurrent readers
//! never see a partially-updated summary. A state-change event is published
//! only when the `usable` flag flips (or on the very first poll for a
//! currency), so a flapping daemon does not flood the bus.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use monero_gateway_common::{EventBus, MoneroConfig, MoneroError, MoneroEvent, MoneroSummary};

use crate::models::{
    CreateAccountRequest, CreateAccountResponse, CreateAddressRequest, CreateAddressResponse,
    GenerateFromKeysRequest, GenerateFromKeysResponse, GetAccountsResponse, GetBalanceRequest,
    GetBalanceResponse, GetHeightResponse, GetInfoResponse, GetTransferByTxidRequest,
    GetTransferByTxidResponse, GetTransfersRequest, GetTransfersResponse, OpenWalletRequest,
    SubaddressAccount, TransferItem,
};
use crate::rpc::{EmptyParams, JsonRpcClient};

/// How long to wait for monero-wallet-rpc to flush a freshly generated
/// `.keys` file to disk.
const KEYS_FILE_ATTEMPTS: u32 = 30;
const KEYS_FILE_DELAY: Duration = Duration::from_millis(100);

pub struct MoneroRpcProvider {
    config: MoneroConfig,
    daemon_clients: HashMap<String, JsonRpcClient>,
    wallet_clients: HashMap<String, JsonRpcClient>,
    summaries: RwLock<HashMap<String, Arc<MoneroSummary>>>,
    bus: EventBus,
}

impl MoneroRpcProvider {
    pub fn new(config: MoneroConfig, bus: EventBus) -> Result<Self, MoneroError> {
        let mut daemon_clients = HashMap::new();
        let mut wallet_clients = HashMap::new();
        for (code, item) in &config.items {
            daemon_clients.insert(
                code.clone(),
                JsonRpcClient::new(
                    &item.daemon_rpc_uri,
                    item.username.clone(),
                    item.password.clone(),
                )?,
            );
            // wallet RPC is an internal endpoint, no auth
            wallet_clients.insert(
                code.clone(),
                JsonRpcClient::new(&item.wallet_rpc_uri, None, None)?,
            );
        }
        Ok(Self {
            config,
            daemon_clients,
            wallet_clients,
            summaries: RwLock::new(HashMap::new()),
            bus,
        })
    }

    pub fn is_configured(&self, crypto_code: &str) -> bool {
        let code = crypto_code.to_uppercase();
        self.daemon_clients.contains_key(&code) && self.wallet_clients.contains_key(&code)
    }

    /// Current summary snapshot for a currency, if it has been polled yet.
    pub fn summary(&self, crypto_code: &str) -> Option<Arc<MoneroSummary>> {
        self.summaries
            .read()
            .expect("summary lock poisoned")
            .get(&crypto_code.to_uppercase())
            .cloned()
    }

    pub fn is_available(&self, crypto_code: &str) -> bool {
        self.summary(crypto_code).is_some_and(|s| s.usable())
    }

    pub(crate) fn daemon_client(&self, crypto_code: &str) -> Result<&JsonRpcClient, MoneroError> {
        self.daemon_clients
            .get(&crypto_code.to_uppercase())
            .ok_or_else(|| MoneroError::NotConfigured(crypto_code.to_string()))
    }

    fn wallet(&self, crypto_code: &str) -> Result<&JsonRpcClient, MoneroError> {
        self.wallet_clients
            .get(&crypto_code.to_uppercase())
            .ok_or_else(|| MoneroError::NotConfigured(crypto_code.to_string()))
    }

    // ---- availability tracking ----

    /// Poll daemon `get_info` and wallet `get_height`, derive the new
    /// summary and install it. The two polls are independent; a failure in
    /// one never blocks the other.
    pub async fn update_summary(
        &self,
        crypto_code: &str,
    ) -> Result<Arc<MoneroSummary>, MoneroError> {
        let daemon = self.daemon_client(crypto_code)?;
        let wallet = self.wallet(crypto_code)?;

        let info = daemon
            .call::<EmptyParams, GetInfoResponse>("get_info", &EmptyParams::default())
            .await;
        let height = wallet
            .call::<EmptyParams, GetHeightResponse>("get_height", &EmptyParams::default())
            .await;

        let summary = merge_polls(info, height);
        Ok(self.install_summary(crypto_code, summary))
    }

    /// Install a new summary snapshot; publish a state-change event when
    /// `usable` flipped (the first snapshot for a currency always counts as
    /// a flip).
    fn install_summary(&self, crypto_code: &str, summary: MoneroSummary) -> Arc<MoneroSummary> {
        let code = crypto_code.to_uppercase();
        let summary = Arc::new(summary);

        let changed = {
            let mut summaries = self.summaries.write().expect("summary lock poisoned");
            let changed = match summaries.get(&code) {
                Some(previous) => previous.usable() != summary.usable(),
                None => true,
            };
            summaries.insert(code.clone(), Arc::clone(&summary));
            changed
        };

        if changed {
            debug!(crypto_code = %code, usable = summary.usable(), "availability state changed");
            self.bus.publish_monero(MoneroEvent::DaemonStateChange {
                crypto_code: code,
                summary: Arc::clone(&summary),
            });
        }
        summary
    }

    // ---- wallet lifecycle ----

    pub async fn open_wallet(
        &self,
        crypto_code: &str,
        filename: &str,
        password: &str,
    ) -> Result<(), MoneroError> {
        self.wallet(crypto_code)?
            .call::<OpenWalletRequest, serde_json::Value>(
                "open_wallet",
                &OpenWalletRequest {
                    filename: filename.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        // the wallet just changed; refresh availability immediately
        self.update_summary(crypto_code).await?;
        Ok(())
    }

    /// Close the active wallet and mark the wallet side unavailable until
    /// the next poll observes otherwise.
    pub async fn close_wallet(&self, crypto_code: &str) -> Result<(), MoneroError> {
        self.wallet(crypto_code)?
            .call::<EmptyParams, serde_json::Value>("close_wallet", &EmptyParams::default())
            .await?;

        if let Some(current) = self.summary(crypto_code) {
            let mut summary = (*current).clone();
            summary.wallet_available = false;
            summary.updated_at = Some(Utc::now());
            self.install_summary(crypto_code, summary);
        }
        Ok(())
    }

    /// Create a view-only wallet from an address + private view key via
    /// `generate_from_keys`. Structured RPC errors are surfaced to the
    /// caller verbatim and never retried: the command is not idempotent.
    pub async fn create_wallet_from_keys(
        &self,
        crypto_code: &str,
        wallet_name: &str,
        primary_address: &str,
        private_view_key: &str,
        password: &str,
        restore_height: i64,
    ) -> Result<(), MoneroError> {
        if !is_valid_wallet_name(wallet_name) {
            return Err(MoneroError::InvalidWalletName(
                "only alphanumerics, dashes and underscores are allowed (max 64 chars)"
                    .to_string(),
            ));
        }

        let response: GenerateFromKeysResponse = self
            .wallet(crypto_code)?
            .call(
                "generate_from_keys",
                &GenerateFromKeysRequest {
                    filename: wallet_name.to_string(),
                    address: primary_address.to_string(),
                    viewkey: private_view_key.to_string(),
                    password: password.to_string(),
                    restore_height,
                },
            )
            .await?;

        if let Some(info) = &response.info {
            info!(wallet = wallet_name, info, "generate_from_keys completed");
        }

        // wallet-rpc writes the keys file asynchronously; wait for it so a
        // follow-up open_wallet does not race the flush
        if let Some(dir) = self
            .config
            .get(crypto_code)
            .and_then(|item| item.wallet_directory.as_deref())
        {
            let keys_file = Path::new(dir).join(format!("{wallet_name}.keys"));
            for _ in 0..KEYS_FILE_ATTEMPTS {
                if keys_file.exists() {
                    return Ok(());
                }
                tokio::time::sleep(KEYS_FILE_DELAY).await;
            }
            debug!(wallet = wallet_name, "keys file not observed after generate_from_keys");
        }
        Ok(())
    }

    /// Remove the wallet and keys files for a previously generated wallet.
    pub fn delete_wallet(&self, crypto_code: &str, wallet_name: &str) -> Result<(), MoneroError> {
        if !is_valid_wallet_name(wallet_name) {
            return Err(MoneroError::InvalidWalletName(wallet_name.to_string()));
        }
        let dir = self
            .config
            .get(crypto_code)
            .and_then(|item| item.wallet_directory.as_deref())
            .ok_or_else(|| MoneroError::NotConfigured(crypto_code.to_string()))?;

        let wallet_file = Path::new(dir).join(wallet_name);
        let keys_file = Path::new(dir).join(format!("{wallet_name}.keys"));
        for file in [wallet_file, keys_file] {
            if file.exists() {
                if let Err(e) = std::fs::remove_file(&file) {
                    error!(file = %file.display(), error = %e, "failed to delete wallet file");
                }
            }
        }
        Ok(())
    }

    // ---- wallet queries ----

    pub async fn get_accounts(
        &self,
        crypto_code: &str,
    ) -> Result<Vec<SubaddressAccount>, MoneroError> {
        let response: GetAccountsResponse = self
            .wallet(crypto_code)?
            .call("get_accounts", &EmptyParams::default())
            .await?;
        Ok(response.subaddress_accounts)
    }

    pub async fn create_account(
        &self,
        crypto_code: &str,
        label: Option<String>,
    ) -> Result<CreateAccountResponse, MoneroError> {
        self.wallet(crypto_code)?
            .call("create_account", &CreateAccountRequest { label })
            .await
    }

    /// Allocate a fresh receiving subaddress under an account.
    pub async fn create_address(
        &self,
        crypto_code: &str,
        account_index: i64,
        label: Option<String>,
    ) -> Result<CreateAddressResponse, MoneroError> {
        self.wallet(crypto_code)?
            .call(
                "create_address",
                &CreateAddressRequest {
                    account_index,
                    label,
                },
            )
            .await
    }

    pub async fn get_balance(
        &self,
        crypto_code: &str,
        account_index: i64,
    ) -> Result<GetBalanceResponse, MoneroError> {
        self.wallet(crypto_code)?
            .call("get_balance", &GetBalanceRequest { account_index })
            .await
    }

    /// Incoming transfers for one account, restricted to the given
    /// subaddress indices. One call covers every invoice on that account.
    pub async fn get_transfers(
        &self,
        crypto_code: &str,
        account_index: i64,
        subaddr_indices: Vec<i64>,
    ) -> Result<Vec<TransferItem>, MoneroError> {
        let response: GetTransfersResponse = self
            .wallet(crypto_code)?
            .call(
                "get_transfers",
                &GetTransfersRequest {
                    account_index,
                    incoming: true,
                    subaddr_indices,
                },
            )
            .await?;
        Ok(response.incoming.unwrap_or_default())
    }

    /// Look up one transaction in one account. The wallet rejects the call
    /// when the tx does not belong to the queried account; that is "not
    /// found here", not an error.
    pub async fn get_transfer_by_txid(
        &self,
        crypto_code: &str,
        txid: &str,
        account_index: Option<i64>,
    ) -> Result<Option<GetTransferByTxidResponse>, MoneroError> {
        let result: Result<GetTransferByTxidResponse, MoneroError> = self
            .wallet(crypto_code)?
            .call(
                "get_transfer_by_txid",
                &GetTransferByTxidRequest {
                    txid: txid.to_string(),
                    account_index,
                },
            )
            .await;
        match result {
            Ok(response) => Ok(Some(response)),
            Err(MoneroError::Rejected { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Fold the two independent poll results into a fresh summary.
fn merge_polls(
    info: Result<GetInfoResponse, MoneroError>,
    height: Result<GetHeightResponse, MoneroError>,
) -> MoneroSummary {
    let mut summary = MoneroSummary {
        updated_at: Some(Utc::now()),
        ..MoneroSummary::default()
    };

    match info {
        Ok(info) => {
            summary.daemon_available = true;
            summary.synced = !info.busy_syncing;
            summary.current_height = info.height;
            summary.target_height = match info.target_height {
                // a caught-up daemon reports target 0
                Some(0) | None => info.height,
                Some(target) => target,
            };
        }
        Err(e) => {
            debug!(error = %e, "daemon get_info failed");
            summary.daemon_available = false;
        }
    }

    match height {
        Ok(height) => {
            summary.wallet_available = true;
            summary.wallet_height = height.height;
        }
        Err(e) => {
            debug!(error = %e, "wallet get_height failed");
            summary.wallet_available = false;
        }
    }

    summary
}

fn is_valid_wallet_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
