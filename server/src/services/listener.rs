//! Payment reconciliation listener.
//!
//! Sole consumer of the inbound event topic. Every trigger - an
//! availability flip, a new block, a tx notification - converges on the
//! same create/update step, which is idempotent by deterministic payment id:
//! overlapping passes at worst re-apply the same update.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use monero_gateway_common::{money, EventBus, InvoiceEvent, MoneroError, MoneroEvent};
use monero_gateway_wallet::models::{GetTransferByTxidResponse, SubaddressAccount, TransferItem};
use monero_gateway_wallet::MoneroRpcProvider;

use crate::invoices::{InvoiceActivator, InvoiceEntity, InvoiceRepository, PaymentService};
use crate::payments::confirmation::is_settled;
use crate::payments::{payment_id, MoneroPaymentData, PaymentRecord, PaymentStatus};

/// The slice of the wallet RPC surface the listener needs. Implemented by
/// [`MoneroRpcProvider`]; tests substitute an in-memory wallet.
#[async_trait]
pub trait WalletQuery: Send + Sync {
    fn is_available(&self, crypto_code: &str) -> bool;

    async fn get_transfers(
        &self,
        crypto_code: &str,
        account_index: i64,
        subaddr_indices: Vec<i64>,
    ) -> Result<Vec<TransferItem>, MoneroError>;

    async fn get_transfer_by_txid(
        &self,
        crypto_code: &str,
        txid: &str,
        account_index: Option<i64>,
    ) -> Result<Option<GetTransferByTxidResponse>, MoneroError>;

    async fn get_accounts(&self, crypto_code: &str)
        -> Result<Vec<SubaddressAccount>, MoneroError>;
}

#[async_trait]
impl WalletQuery for MoneroRpcProvider {
    fn is_available(&self, crypto_code: &str) -> bool {
        MoneroRpcProvider::is_available(self, crypto_code)
    }

    async fn get_transfers(
        &self,
        crypto_code: &str,
        account_index: i64,
        subaddr_indices: Vec<i64>,
    ) -> Result<Vec<TransferItem>, MoneroError> {
        MoneroRpcProvider::get_transfers(self, crypto_code, account_index, subaddr_indices).await
    }

    async fn get_transfer_by_txid(
        &self,
        crypto_code: &str,
        txid: &str,
        account_index: Option<i64>,
    ) -> Result<Option<GetTransferByTxidResponse>, MoneroError> {
        MoneroRpcProvider::get_transfer_by_txid(self, crypto_code, txid, account_index).await
    }

    async fn get_accounts(
        &self,
        crypto_code: &str,
    ) -> Result<Vec<SubaddressAccount>, MoneroError> {
        MoneroRpcProvider::get_accounts(self, crypto_code).await
    }
}

/// One matched transfer, normalized across the bulk and single-tx paths.
struct TransferObservation {
    destination: String,
    /// Atomic units; summed over destinations for the single-tx path.
    amount: i64,
    account_index: i64,
    subaddress_index: i64,
    txid: String,
    confirmations: i64,
    block_height: i64,
    unlock_time: i64,
}

pub struct MoneroListener {
    wallet: Arc<dyn WalletQuery>,
    invoices: Arc<dyn InvoiceRepository>,
    payments: Arc<dyn PaymentService>,
    activator: Arc<dyn InvoiceActivator>,
    bus: EventBus,
}

impl MoneroListener {
    pub fn new(
        wallet: Arc<dyn WalletQuery>,
        invoices: Arc<dyn InvoiceRepository>,
        payments: Arc<dyn PaymentService>,
        activator: Arc<dyn InvoiceActivator>,
        bus: EventBus,
    ) -> Self {
        Self {
            wallet,
            invoices,
            payments,
            activator,
            bus,
        }
    }

    /// Consume the inbound event topic until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.bus.subscribe_monero();
        info!("payment listener started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv() => match event {
                    Ok(event) => self.process_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // safe to skip: the next trigger re-reconciles everything
                        warn!(missed, "listener lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        info!("payment listener stopped");
    }

    /// Handle one trigger. Failures are contained per trigger: a failed
    /// pass is logged and the listener keeps consuming.
    pub async fn process_event(&self, event: MoneroEvent) {
        let crypto_code = event.crypto_code().to_string();
        let result = match &event {
            MoneroEvent::DaemonStateChange { summary, .. } => {
                if summary.usable() {
                    info!(crypto_code, "daemon and wallet just became available");
                    self.update_pending_payments(&crypto_code).await
                } else {
                    info!(crypto_code, "daemon or wallet just became unavailable");
                    Ok(())
                }
            }
            MoneroEvent::BlockNotify { .. } => {
                if !self.wallet.is_available(&crypto_code) {
                    Ok(())
                } else {
                    let result = self.update_pending_payments(&crypto_code).await;
                    if result.is_ok() {
                        self.bus.publish_invoice(InvoiceEvent::NewBlock {
                            crypto_code: crypto_code.clone(),
                        });
                    }
                    result
                }
            }
            MoneroEvent::TxNotify { hash, .. } => {
                if !self.wallet.is_available(&crypto_code) {
                    Ok(())
                } else {
                    self.on_transaction_updated(&crypto_code, hash).await
                }
            }
        };
        if let Err(e) = result {
            error!(crypto_code, error = %e, "reconciliation pass failed");
        }
    }

    /// Bulk path: reconcile every monitored invoice against the wallet's
    /// transfer history, one `get_transfers` call per account.
    pub async fn update_pending_payments(&self, crypto_code: &str) -> anyhow::Result<()> {
        let invoices: Vec<InvoiceEntity> = self
            .invoices
            .get_monitored_invoices(crypto_code)
            .await?
            .into_iter()
            .filter(|invoice| invoice.activated_prompt().is_some())
            .collect();
        if invoices.is_empty() {
            return Ok(());
        }

        // group subaddress requirements per account: the prompt's own index
        // plus the indices of every already-observed payment
        let mut account_query: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for invoice in &invoices {
            let Some(prompt) = invoice.activated_prompt() else {
                continue;
            };
            let indices = account_query.entry(prompt.account_index).or_default();
            indices.push(prompt.address_index);
            indices.extend(
                invoice
                    .payments
                    .iter()
                    .map(|payment| payment.details.subaddress_index),
            );
        }
        for indices in account_query.values_mut() {
            indices.sort_unstable();
            indices.dedup();
        }

        // fan out one query per account, await them together
        let queries = account_query.into_iter().map(|(account, subaddrs)| async move {
            let result = self
                .wallet
                .get_transfers(crypto_code, account, subaddrs)
                .await;
            (account, result)
        });
        let results = join_all(queries).await;

        let mut updates: Vec<PaymentRecord> = Vec::new();
        for (account, result) in results {
            let transfers = match result {
                Ok(transfers) => transfers,
                Err(e) => {
                    warn!(crypto_code, account, error = %e, "get_transfers failed");
                    continue;
                }
            };
            // zero transfers is not negative evidence; simply nothing to do
            for transfer in transfers {
                let Some(invoice) = match_transfer(&invoices, &transfer) else {
                    debug!(txid = %transfer.txid, "transfer matches no monitored invoice");
                    continue;
                };
                let observation = TransferObservation {
                    destination: transfer.address.clone(),
                    amount: transfer.amount,
                    account_index: transfer.subaddr_index.major,
                    subaddress_index: transfer.subaddr_index.minor,
                    txid: transfer.txid.clone(),
                    confirmations: transfer.confirmations,
                    block_height: transfer.height,
                    unlock_time: transfer.unlock_time,
                };
                self.handle_payment_data(crypto_code, observation, invoice, &mut updates)
                    .await?;
            }
        }

        self.flush_updates(updates).await
    }

    /// Single-transaction path: resolve one txid and reconcile only the
    /// invoices its destinations touch.
    pub async fn on_transaction_updated(
        &self,
        crypto_code: &str,
        tx_hash: &str,
    ) -> anyhow::Result<()> {
        let Some(found) = self.find_transfer(crypto_code, tx_hash).await? else {
            debug!(crypto_code, tx_hash, "tx not known to any wallet account");
            return Ok(());
        };

        // group the tx's destinations per address and credit each invoice
        // with the summed amount
        let mut by_address: BTreeMap<&str, Vec<&TransferItem>> = BTreeMap::new();
        for destination in &found.transfers {
            by_address
                .entry(destination.address.as_str())
                .or_default()
                .push(destination);
        }

        let mut updates: Vec<PaymentRecord> = Vec::new();
        for (address, destinations) in by_address {
            let Some(invoice) = self
                .invoices
                .get_invoice_from_address(crypto_code, address)
                .await?
            else {
                continue;
            };
            let index = destinations[0].subaddr_index;
            let observation = TransferObservation {
                destination: address.to_string(),
                amount: destinations.iter().map(|d| d.amount).sum(),
                account_index: index.major,
                subaddress_index: index.minor,
                txid: found.transfer.txid.clone(),
                confirmations: found.transfer.confirmations,
                block_height: found.transfer.height,
                unlock_time: found.transfer.unlock_time,
            };
            self.handle_payment_data(crypto_code, observation, &invoice, &mut updates)
                .await?;
        }

        self.flush_updates(updates).await
    }

    /// Try `get_transfer_by_txid` against each known account, first hit
    /// wins. A wallet with no accounts yet gets one unscoped attempt.
    async fn find_transfer(
        &self,
        crypto_code: &str,
        tx_hash: &str,
    ) -> anyhow::Result<Option<GetTransferByTxidResponse>> {
        let accounts = self.wallet.get_accounts(crypto_code).await?;
        let mut indices: Vec<Option<i64>> = accounts
            .iter()
            .map(|account| Some(account.account_index))
            .collect();
        if indices.is_empty() {
            indices.push(None);
        }
        for account_index in indices {
            if let Some(found) = self
                .wallet
                .get_transfer_by_txid(crypto_code, tx_hash, account_index)
                .await?
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Shared create/update step, idempotent by payment id.
    async fn handle_payment_data(
        &self,
        crypto_code: &str,
        observation: TransferObservation,
        invoice: &InvoiceEntity,
        updates: &mut Vec<PaymentRecord>,
    ) -> anyhow::Result<()> {
        let details = MoneroPaymentData {
            subaccount_index: observation.account_index,
            subaddress_index: observation.subaddress_index,
            transaction_id: observation.txid.clone(),
            confirmation_count: observation.confirmations,
            block_height: observation.block_height,
            lock_time: observation.unlock_time,
            invoice_settled_confirmation_threshold: invoice
                .prompt
                .as_ref()
                .and_then(|prompt| prompt.settled_confirmation_threshold),
        };
        let computed = if is_settled(&details, invoice.speed_policy) {
            PaymentStatus::Settled
        } else {
            PaymentStatus::Processing
        };
        let id = payment_id(
            &observation.txid,
            observation.account_index,
            observation.subaddress_index,
        );

        if let Some(existing) = invoice.payments.iter().find(|payment| payment.id == id) {
            // settled is sticky: re-evaluation never downgrades
            let status = if existing.status == PaymentStatus::Settled {
                PaymentStatus::Settled
            } else {
                computed
            };
            let mut record = existing.clone();
            record.status = status;
            record.details = details;
            updates.push(record);
            return Ok(());
        }

        let record = PaymentRecord {
            id,
            invoice_id: invoice.id.clone(),
            crypto_code: crypto_code.to_uppercase(),
            destination: observation.destination,
            amount: money::to_decimal(observation.amount),
            status: computed,
            created: Utc::now(),
            details,
        };
        if let Some(payment) = self.payments.add_payment(record).await? {
            self.received_payment(invoice, &payment).await?;
        }
        Ok(())
    }

    /// Post-create hook: activate the payment method if the payer beat the
    /// invoice UI to it, then announce the payment.
    async fn received_payment(
        &self,
        invoice: &InvoiceEntity,
        payment: &PaymentRecord,
    ) -> anyhow::Result<()> {
        info!(
            invoice_id = %invoice.id,
            payment_id = %payment.id,
            amount = %payment.amount,
            crypto_code = %payment.crypto_code,
            "invoice received payment"
        );

        if let Some(prompt) = &invoice.prompt {
            if !prompt.activated && invoice.amount_due > Decimal::ZERO {
                self.activator
                    .activate_invoice_payment_method(&invoice.id, &payment.crypto_code)
                    .await?;
            }
        }

        self.bus.publish_invoice(InvoiceEvent::ReceivedPayment {
            invoice_id: invoice.id.clone(),
            payment_id: payment.id.clone(),
            crypto_code: payment.crypto_code.clone(),
            amount: payment.amount,
        });
        Ok(())
    }

    /// Persist batched updates and publish one re-evaluation event per
    /// distinct invoice touched.
    async fn flush_updates(&self, updates: Vec<PaymentRecord>) -> anyhow::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let touched: BTreeSet<String> = updates
            .iter()
            .map(|record| record.invoice_id.clone())
            .collect();
        self.payments.update_payments(updates).await?;
        for invoice_id in touched {
            self.bus
                .publish_invoice(InvoiceEvent::InvoiceNeedUpdate { invoice_id });
        }
        Ok(())
    }
}

/// Match one transfer to its invoice: an existing payment with the same
/// destination and txid wins (update path), else a prompt whose destination
/// equals the transfer address (create path).
fn match_transfer<'a>(
    invoices: &'a [InvoiceEntity],
    transfer: &TransferItem,
) -> Option<&'a InvoiceEntity> {
    invoices
        .iter()
        .find(|invoice| {
            invoice.payments.iter().any(|payment| {
                payment.destination == transfer.address
                    && payment.details.transaction_id == transfer.txid
            })
        })
        .or_else(|| {
            invoices.iter().find(|invoice| {
                invoice
                    .activated_prompt()
                    .is_some_and(|prompt| prompt.destination == transfer.address)
            })
        })
}
