//! Availability polling loops, one per configured currency.
//!
//! Fast cadence while a currency is unusable (daemons recover predictably,
//! so plain fixed retry beats exponential backoff here), slow cadence while
//! everything is healthy. Loops exit cooperatively within one interval of
//! the shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use monero_gateway_wallet::MoneroRpcProvider;

/// Steady-state poll interval while the currency is usable.
const POLL_AVAILABLE: Duration = Duration::from_secs(60);
/// Retry interval while the daemon or wallet is down.
const POLL_UNAVAILABLE: Duration = Duration::from_secs(10);

pub struct SummaryUpdater {
    provider: Arc<MoneroRpcProvider>,
    crypto_codes: Vec<String>,
}

impl SummaryUpdater {
    pub fn new(provider: Arc<MoneroRpcProvider>, crypto_codes: Vec<String>) -> Self {
        Self {
            provider,
            crypto_codes,
        }
    }

    /// Spawn one polling loop per currency. The returned handles complete
    /// after the shutdown signal fires.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.crypto_codes
            .iter()
            .map(|code| {
                let provider = Arc::clone(&self.provider);
                let crypto_code = code.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(poll_loop(provider, crypto_code, shutdown))
            })
            .collect()
    }
}

async fn poll_loop(
    provider: Arc<MoneroRpcProvider>,
    crypto_code: String,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(crypto_code, "starting summary updater");
    loop {
        if let Err(e) = provider.update_summary(&crypto_code).await {
            // only a misconfigured code lands here; RPC failures are folded
            // into the summary itself
            error!(crypto_code, error = %e, "summary update failed");
        }

        let interval = if provider.is_available(&crypto_code) {
            POLL_AVAILABLE
        } else {
            POLL_UNAVAILABLE
        };
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!(crypto_code, "summary updater stopped");
}
