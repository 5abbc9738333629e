//! Monero daemon/wallet RPC integration.
//!
//! `rpc` is the stateless JSON-RPC transport, `models` the typed request and
//! response bodies, `provider` the per-currency availability tracker and
//! wallet-lifecycle surface, and `fee` the daemon fee estimation helper.

pub mod fee;
pub mod models;
pub mod provider;
pub mod rpc;

pub use fee::FeeEstimate;
pub use provider::MoneroRpcProvider;
pub use rpc::JsonRpcClient;
