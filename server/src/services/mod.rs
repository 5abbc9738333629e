//! Long-running gateway services.

pub mod listener;
pub mod summary_updater;
pub mod wallet_service;

pub use listener::{MoneroListener, WalletQuery};
pub use summary_updater::SummaryUpdater;
pub use wallet_service::MoneroWalletService;
