//! Gateway assembly.
//!
//! The host supplies the invoice-side collaborators; the gateway owns the
//! RPC provider, the polling loops and the reconciliation listener, plus
//! the shutdown signal that stops all of them.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use monero_gateway_common::{EventBus, MoneroConfig};
use monero_gateway_wallet::MoneroRpcProvider;

use crate::invoices::{InvoiceActivator, InvoiceRepository, PaymentService};
use crate::services::{MoneroListener, SummaryUpdater};

/// Invoice-side collaborators implemented by the host platform.
#[derive(Clone)]
pub struct GatewayServices {
    pub invoices: Arc<dyn InvoiceRepository>,
    pub payments: Arc<dyn PaymentService>,
    pub activator: Arc<dyn InvoiceActivator>,
}

pub struct Gateway {
    bus: EventBus,
    provider: Arc<MoneroRpcProvider>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Gateway {
    /// Build the provider and spawn the summary-updater loops and the
    /// reconciliation listener.
    pub fn start(config: MoneroConfig, services: GatewayServices) -> anyhow::Result<Self> {
        let bus = EventBus::default();
        let crypto_codes: Vec<String> = config.crypto_codes().cloned().collect();
        let provider = Arc::new(
            MoneroRpcProvider::new(config, bus.clone())
                .context("failed to build RPC clients")?,
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks =
            SummaryUpdater::new(Arc::clone(&provider), crypto_codes).spawn(shutdown_rx.clone());

        let listener = Arc::new(MoneroListener::new(
            Arc::clone(&provider) as Arc<dyn crate::services::WalletQuery>,
            services.invoices,
            services.payments,
            services.activator,
            bus.clone(),
        ));
        tasks.push(tokio::spawn(listener.run(shutdown_rx)));

        info!("monero gateway started");
        Ok(Self {
            bus,
            provider,
            shutdown,
            tasks,
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn provider(&self) -> Arc<MoneroRpcProvider> {
        Arc::clone(&self.provider)
    }

    /// Signal all loops to stop and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("monero gateway stopped");
    }
}

/// Initialize `tracing` with `RUST_LOG`-style filtering. Intended for hosts
/// that do not install their own subscriber.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
