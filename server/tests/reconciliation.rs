//! Offline end-to-end reconciliation scenarios.
//!
//! The listener runs against an in-memory wallet and invoice store; no
//! network, fully deterministic.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use monero_gateway_common::{EventBus, InvoiceEvent, MoneroError, MoneroEvent, MoneroSummary};
use monero_gateway_server::invoices::{
    InvoiceActivator, InvoiceEntity, InvoiceRepository, PaymentPrompt, PaymentService,
};
use monero_gateway_server::payments::{
    MoneroPaymentData, PaymentRecord, PaymentStatus, SpeedPolicy,
};
use monero_gateway_server::services::{MoneroListener, WalletQuery};
use monero_gateway_wallet::models::{
    GetTransferByTxidResponse, SubaddrIndex, SubaddressAccount, TransferItem,
};

// ---- mock wallet ----

#[derive(Default)]
struct MockWallet {
    available: AtomicBool,
    /// account index -> transfers returned by get_transfers
    transfers: Mutex<HashMap<i64, Vec<TransferItem>>>,
    /// (account index, txid) -> response for get_transfer_by_txid
    tx_lookup: Mutex<HashMap<(i64, String), GetTransferByTxidResponse>>,
    accounts: Mutex<Vec<SubaddressAccount>>,
    /// recorded get_transfers calls, for asserting batching behavior
    transfer_calls: Mutex<Vec<(i64, Vec<i64>)>>,
}

impl MockWallet {
    fn available() -> Self {
        let wallet = Self::default();
        wallet.available.store(true, Ordering::SeqCst);
        wallet
    }

    fn with_account(self, account_index: i64) -> Self {
        self.accounts.lock().unwrap().push(SubaddressAccount {
            account_index,
            base_address: format!("account{account_index}"),
            label: None,
        });
        self
    }

    fn add_transfer(&self, account: i64, transfer: TransferItem) {
        self.transfers
            .lock()
            .unwrap()
            .entry(account)
            .or_default()
            .push(transfer);
    }

    fn add_tx(&self, account: i64, txid: &str, response: GetTransferByTxidResponse) {
        self.tx_lookup
            .lock()
            .unwrap()
            .insert((account, txid.to_string()), response);
    }
}

#[async_trait]
impl WalletQuery for MockWallet {
    fn is_available(&self, _crypto_code: &str) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get_transfers(
        &self,
        _crypto_code: &str,
        account_index: i64,
        subaddr_indices: Vec<i64>,
    ) -> Result<Vec<TransferItem>, MoneroError> {
        self.transfer_calls
            .lock()
            .unwrap()
            .push((account_index, subaddr_indices));
        Ok(self
            .transfers
            .lock()
            .unwrap()
            .get(&account_index)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_transfer_by_txid(
        &self,
        _crypto_code: &str,
        txid: &str,
        account_index: Option<i64>,
    ) -> Result<Option<GetTransferByTxidResponse>, MoneroError> {
        let account = account_index.unwrap_or(0);
        Ok(self
            .tx_lookup
            .lock()
            .unwrap()
            .get(&(account, txid.to_string()))
            .cloned())
    }

    async fn get_accounts(
        &self,
        _crypto_code: &str,
    ) -> Result<Vec<SubaddressAccount>, MoneroError> {
        Ok(self.accounts.lock().unwrap().clone())
    }
}

// ---- mock invoice store ----

#[derive(Default)]
struct MemoryStore {
    invoices: Mutex<HashMap<String, InvoiceEntity>>,
    /// ids the store has ever accepted, for duplicate rejection
    known_ids: Mutex<HashSet<String>>,
    added: Mutex<Vec<PaymentRecord>>,
    updated: Mutex<Vec<PaymentRecord>>,
    activations: Mutex<Vec<String>>,
}

impl MemoryStore {
    fn insert_invoice(&self, invoice: InvoiceEntity) {
        for payment in &invoice.payments {
            self.known_ids.lock().unwrap().insert(payment.id.clone());
        }
        self.invoices
            .lock()
            .unwrap()
            .insert(invoice.id.clone(), invoice);
    }

    fn invoice(&self, id: &str) -> InvoiceEntity {
        self.invoices.lock().unwrap().get(id).unwrap().clone()
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn get_monitored_invoices(
        &self,
        _crypto_code: &str,
    ) -> anyhow::Result<Vec<InvoiceEntity>> {
        Ok(self.invoices.lock().unwrap().values().cloned().collect())
    }

    async fn get_invoice_from_address(
        &self,
        _crypto_code: &str,
        address: &str,
    ) -> anyhow::Result<Option<InvoiceEntity>> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .values()
            .find(|invoice| {
                invoice
                    .prompt
                    .as_ref()
                    .is_some_and(|prompt| prompt.destination == address)
            })
            .cloned())
    }
}

#[async_trait]
impl PaymentService for MemoryStore {
    async fn add_payment(
        &self,
        payment: PaymentRecord,
    ) -> anyhow::Result<Option<PaymentRecord>> {
        if !self.known_ids.lock().unwrap().insert(payment.id.clone()) {
            // another pass already created this record
            return Ok(None);
        }
        if let Some(invoice) = self.invoices.lock().unwrap().get_mut(&payment.invoice_id) {
            invoice.payments.push(payment.clone());
        }
        self.added.lock().unwrap().push(payment.clone());
        Ok(Some(payment))
    }

    async fn update_payments(&self, payments: Vec<PaymentRecord>) -> anyhow::Result<()> {
        let mut invoices = self.invoices.lock().unwrap();
        for record in payments {
            if let Some(invoice) = invoices.get_mut(&record.invoice_id) {
                if let Some(existing) = invoice
                    .payments
                    .iter_mut()
                    .find(|payment| payment.id == record.id)
                {
                    *existing = record.clone();
                }
            }
            self.updated.lock().unwrap().push(record);
        }
        Ok(())
    }
}

#[async_trait]
impl InvoiceActivator for MemoryStore {
    async fn activate_invoice_payment_method(
        &self,
        invoice_id: &str,
        _crypto_code: &str,
    ) -> anyhow::Result<()> {
        if let Some(invoice) = self.invoices.lock().unwrap().get_mut(invoice_id) {
            if let Some(prompt) = invoice.prompt.as_mut() {
                prompt.activated = true;
            }
        }
        self.activations.lock().unwrap().push(invoice_id.to_string());
        Ok(())
    }
}

// ---- fixtures ----

fn transfer(address: &str, txid: &str, amount: i64, confirmations: i64, minor: i64) -> TransferItem {
    TransferItem {
        address: address.to_string(),
        txid: txid.to_string(),
        amount,
        confirmations,
        height: if confirmations > 0 { 3_171_000 } else { 0 },
        unlock_time: 0,
        subaddr_index: SubaddrIndex { major: 0, minor },
    }
}

fn invoice(
    id: &str,
    destination: &str,
    address_index: i64,
    speed_policy: SpeedPolicy,
) -> InvoiceEntity {
    InvoiceEntity {
        id: id.to_string(),
        speed_policy,
        prompt: Some(PaymentPrompt {
            destination: destination.to_string(),
            account_index: 0,
            address_index,
            activated: true,
            settled_confirmation_threshold: None,
        }),
        amount_due: Decimal::from(10),
        payments: Vec::new(),
    }
}

fn listener(
    wallet: Arc<MockWallet>,
    store: Arc<MemoryStore>,
    bus: EventBus,
) -> MoneroListener {
    MoneroListener::new(wallet, store.clone(), store.clone(), store, bus)
}

fn drain_invoice_events(rx: &mut tokio::sync::broadcast::Receiver<InvoiceEvent>) -> Vec<InvoiceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---- scenarios ----

#[tokio::test]
async fn high_speed_payment_settles_unconfirmed() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));
    wallet.add_transfer(0, transfer("addrA", "tx1", 4_200_000_000, 0, 3));

    let bus = EventBus::new(64);
    let mut rx = bus.subscribe_invoice();
    let listener = listener(wallet.clone(), store.clone(), bus);

    listener.update_pending_payments("XMR").await.unwrap();

    let added = store.added.lock().unwrap().clone();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].id, "tx1#0#3");
    assert_eq!(added[0].status, PaymentStatus::Settled);
    assert_eq!(added[0].amount, Decimal::from_str("4.2").unwrap());
    assert_eq!(added[0].invoice_id, "inv1");

    let events = drain_invoice_events(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        InvoiceEvent::ReceivedPayment {
            invoice_id, amount, ..
        } => {
            assert_eq!(invoice_id, "inv1");
            assert_eq!(*amount, Decimal::from_str("4.2").unwrap());
        }
        other => panic!("unexpected event {other:?}"),
    }

    // the prompt's subaddress was queried on its account, in one call
    let calls = wallet.transfer_calls.lock().unwrap().clone();
    assert_eq!(calls, vec![(0, vec![3])]);
}

#[tokio::test]
async fn medium_speed_payment_stays_processing_unconfirmed() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::MediumSpeed));
    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 0, 3));

    let listener = listener(wallet, store.clone(), EventBus::new(64));
    listener.update_pending_payments("XMR").await.unwrap();

    let added = store.added.lock().unwrap().clone();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].status, PaymentStatus::Processing);
}

#[tokio::test]
async fn reobserved_transfer_updates_instead_of_duplicating() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::MediumSpeed));
    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 0, 3));

    let bus = EventBus::new(64);
    let listener = listener(wallet.clone(), store.clone(), bus.clone());
    listener.update_pending_payments("XMR").await.unwrap();

    // the same transfer shows up again, now confirmed
    wallet.transfers.lock().unwrap().clear();
    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 1, 3));

    let mut rx = bus.subscribe_invoice();
    listener.update_pending_payments("XMR").await.unwrap();

    let payments = store.invoice("inv1").payments;
    assert_eq!(payments.len(), 1, "exactly one record after re-observation");
    assert_eq!(payments[0].details.confirmation_count, 1);
    assert_eq!(payments[0].status, PaymentStatus::Settled);

    // one coalesced re-evaluation event for the invoice, no new payment
    let events = drain_invoice_events(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        InvoiceEvent::InvoiceNeedUpdate { invoice_id } if invoice_id == "inv1"
    ));
}

#[tokio::test]
async fn settled_record_is_never_downgraded() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());

    // invoice carries an explicit 5-confirmation override, but the stored
    // record already settled under an earlier policy evaluation
    let mut inv = invoice("inv1", "addrA", 3, SpeedPolicy::MediumSpeed);
    inv.prompt.as_mut().unwrap().settled_confirmation_threshold = Some(5);
    inv.payments.push(PaymentRecord {
        id: "tx1#0#3".into(),
        invoice_id: "inv1".into(),
        crypto_code: "XMR".into(),
        destination: "addrA".into(),
        amount: Decimal::ONE,
        status: PaymentStatus::Settled,
        created: Utc::now(),
        details: MoneroPaymentData {
            subaccount_index: 0,
            subaddress_index: 3,
            transaction_id: "tx1".into(),
            confirmation_count: 0,
            block_height: 0,
            lock_time: 0,
            invoice_settled_confirmation_threshold: None,
        },
    });
    store.insert_invoice(inv);

    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 1, 3));
    let listener = listener(wallet, store.clone(), EventBus::new(64));
    listener.update_pending_payments("XMR").await.unwrap();

    let payments = store.invoice("inv1").payments;
    assert_eq!(payments.len(), 1);
    // 1 confirmation is below the 5-confirmation override, but the record
    // was settled and stays settled
    assert_eq!(payments[0].status, PaymentStatus::Settled);
    assert_eq!(payments[0].details.confirmation_count, 1);
}

#[tokio::test]
async fn unmatched_transfer_is_dropped_silently() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));
    // change output / unrelated wallet activity
    wallet.add_transfer(0, transfer("addrUnknown", "tx9", 7_000_000_000, 2, 9));

    let bus = EventBus::new(64);
    let mut rx = bus.subscribe_invoice();
    let listener = listener(wallet, store.clone(), bus);
    listener.update_pending_payments("XMR").await.unwrap();

    assert!(store.added.lock().unwrap().is_empty());
    assert!(store.updated.lock().unwrap().is_empty());
    assert!(drain_invoice_events(&mut rx).is_empty());
}

#[tokio::test]
async fn partial_payments_each_get_their_own_record() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));
    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 1, 3));
    wallet.add_transfer(0, transfer("addrA", "tx2", 2_500_000_000, 0, 3));

    let listener = listener(wallet, store.clone(), EventBus::new(64));
    listener.update_pending_payments("XMR").await.unwrap();

    let payments = store.invoice("inv1").payments;
    assert_eq!(payments.len(), 2);
    let ids: HashSet<&str> = payments.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, HashSet::from(["tx1#0#3", "tx2#0#3"]));
}

#[tokio::test]
async fn duplicate_create_race_is_idempotent() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));
    // the store already knows this id (a concurrent pass won the race),
    // but the invoice projection handed to the listener is stale
    store.known_ids.lock().unwrap().insert("tx1#0#3".to_string());
    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 0, 3));

    let bus = EventBus::new(64);
    let mut rx = bus.subscribe_invoice();
    let listener = listener(wallet, store.clone(), bus);
    listener.update_pending_payments("XMR").await.unwrap();

    assert!(store.added.lock().unwrap().is_empty(), "no duplicate insert");
    assert!(
        drain_invoice_events(&mut rx).is_empty(),
        "no event for a rejected duplicate"
    );
}

#[tokio::test]
async fn single_tx_path_groups_destinations_per_invoice() {
    let wallet = Arc::new(MockWallet::available().with_account(0).with_account(1));
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));
    store.insert_invoice(invoice("inv2", "addrB", 4, SpeedPolicy::HighSpeed));

    // one tx paying addrA twice and addrB once
    let summary = transfer("addrA", "tx7", 1_500_000_000, 1, 3);
    wallet.add_tx(
        0,
        "tx7",
        GetTransferByTxidResponse {
            transfer: summary,
            transfers: vec![
                transfer("addrA", "tx7", 1_000_000_000, 1, 3),
                transfer("addrA", "tx7", 500_000_000, 1, 3),
                transfer("addrB", "tx7", 2_000_000_000, 1, 4),
            ],
        },
    );

    let listener = listener(wallet, store.clone(), EventBus::new(64));
    listener.on_transaction_updated("XMR", "tx7").await.unwrap();

    let inv1 = store.invoice("inv1").payments;
    assert_eq!(inv1.len(), 1);
    assert_eq!(inv1[0].amount, Decimal::from_str("1.5").unwrap());
    assert_eq!(inv1[0].id, "tx7#0#3");

    let inv2 = store.invoice("inv2").payments;
    assert_eq!(inv2.len(), 1);
    assert_eq!(inv2[0].amount, Decimal::from(2));
    assert_eq!(inv2[0].id, "tx7#0#4");
}

#[tokio::test]
async fn single_tx_path_activates_pending_prompt() {
    let wallet = Arc::new(MockWallet::available().with_account(0));
    let store = Arc::new(MemoryStore::default());
    let mut inv = invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed);
    // payment arrived before the payer ever opened the invoice UI
    inv.prompt.as_mut().unwrap().activated = false;
    store.insert_invoice(inv);

    wallet.add_tx(
        0,
        "tx1",
        GetTransferByTxidResponse {
            transfer: transfer("addrA", "tx1", 1_000_000_000, 0, 3),
            transfers: vec![transfer("addrA", "tx1", 1_000_000_000, 0, 3)],
        },
    );

    let listener = listener(wallet, store.clone(), EventBus::new(64));
    listener.on_transaction_updated("XMR", "tx1").await.unwrap();

    assert_eq!(store.activations.lock().unwrap().clone(), vec!["inv1"]);
    assert!(store.invoice("inv1").prompt.unwrap().activated);
}

#[tokio::test]
async fn unknown_tx_hash_is_a_noop() {
    let wallet = Arc::new(MockWallet::available().with_account(0).with_account(1));
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));

    let listener = listener(wallet, store.clone(), EventBus::new(64));
    listener
        .on_transaction_updated("XMR", "nonexistent")
        .await
        .unwrap();

    assert!(store.added.lock().unwrap().is_empty());
}

#[tokio::test]
async fn block_event_runs_pass_and_publishes_new_block() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));
    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 1, 3));

    let bus = EventBus::new(64);
    let mut rx = bus.subscribe_invoice();
    let listener = listener(wallet, store.clone(), bus);

    listener
        .process_event(MoneroEvent::BlockNotify {
            crypto_code: "XMR".into(),
            hash: "blockhash".into(),
        })
        .await;

    let events = drain_invoice_events(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, InvoiceEvent::ReceivedPayment { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, InvoiceEvent::NewBlock { crypto_code } if crypto_code == "XMR")));
}

#[tokio::test]
async fn events_are_ignored_while_unavailable() {
    let wallet = Arc::new(MockWallet::default()); // not available
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));
    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 1, 3));

    let listener = listener(wallet.clone(), store.clone(), EventBus::new(64));
    listener
        .process_event(MoneroEvent::BlockNotify {
            crypto_code: "XMR".into(),
            hash: "blockhash".into(),
        })
        .await;

    assert!(wallet.transfer_calls.lock().unwrap().is_empty());
    assert!(store.added.lock().unwrap().is_empty());
}

#[tokio::test]
async fn availability_transition_triggers_bulk_pass() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());
    store.insert_invoice(invoice("inv1", "addrA", 3, SpeedPolicy::HighSpeed));
    wallet.add_transfer(0, transfer("addrA", "tx1", 1_000_000_000, 0, 3));

    let listener = listener(wallet, store.clone(), EventBus::new(64));
    listener
        .process_event(MoneroEvent::DaemonStateChange {
            crypto_code: "XMR".into(),
            summary: Arc::new(MoneroSummary {
                synced: true,
                daemon_available: true,
                wallet_available: true,
                current_height: 100,
                target_height: 100,
                wallet_height: 100,
                updated_at: None,
            }),
        })
        .await;

    assert_eq!(store.added.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn subaddress_query_covers_existing_payments() {
    let wallet = Arc::new(MockWallet::available());
    let store = Arc::new(MemoryStore::default());

    // the invoice was re-activated onto subaddress 5 after a payment
    // arrived on subaddress 3; both must be queried
    let mut inv = invoice("inv1", "addrA2", 5, SpeedPolicy::HighSpeed);
    inv.payments.push(PaymentRecord {
        id: "tx1#0#3".into(),
        invoice_id: "inv1".into(),
        crypto_code: "XMR".into(),
        destination: "addrA".into(),
        amount: Decimal::ONE,
        status: PaymentStatus::Settled,
        created: Utc::now(),
        details: MoneroPaymentData {
            subaccount_index: 0,
            subaddress_index: 3,
            transaction_id: "tx1".into(),
            confirmation_count: 2,
            block_height: 100,
            lock_time: 0,
            invoice_settled_confirmation_threshold: None,
        },
    });
    store.insert_invoice(inv);

    let listener = listener(wallet.clone(), store, EventBus::new(64));
    listener.update_pending_payments("XMR").await.unwrap();

    let calls = wallet.transfer_calls.lock().unwrap().clone();
    assert_eq!(calls, vec![(0, vec![3, 5])]);
}
