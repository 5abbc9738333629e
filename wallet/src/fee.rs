//! Network fee estimation via the daemon's `get_fee_estimate`.
//!
//! Fees are quantized per protocol: `(fee + mask - 1) / mask * mask`.

use monero_gateway_common::MoneroError;

use crate::models::{GetFeeEstimateRequest, GetFeeEstimateResponse};
use crate::provider::MoneroRpcProvider;
use crate::rpc::JsonRpcClient;

/// Fee-per-byte figure surfaced to invoices as the expected network cost.
#[derive(Debug, Clone, Copy)]
pub struct FeeEstimate {
    /// Atomic units per byte.
    pub fee_per_byte: i64,
    pub quantization_mask: i64,
}

impl FeeEstimate {
    /// Quantized fee for a transaction of the given size.
    pub fn fee_for_size(&self, tx_size_bytes: i64) -> i64 {
        quantize(tx_size_bytes * self.fee_per_byte, self.quantization_mask)
    }
}

/// Round a raw fee up to the nearest multiple of the quantization mask.
fn quantize(fee: i64, mask: i64) -> i64 {
    if mask <= 0 {
        return fee;
    }
    (fee + mask - 1) / mask * mask
}

pub(crate) async fn fetch_estimate(
    daemon: &JsonRpcClient,
    grace_blocks: Option<i64>,
) -> Result<FeeEstimate, MoneroError> {
    let response: GetFeeEstimateResponse = daemon
        .call("get_fee_estimate", &GetFeeEstimateRequest { grace_blocks })
        .await?;
    Ok(FeeEstimate {
        fee_per_byte: response.fee,
        quantization_mask: response.quantization_mask.max(1),
    })
}

impl MoneroRpcProvider {
    /// Current fee estimate from the currency's daemon.
    pub async fn get_fee_estimate(
        &self,
        crypto_code: &str,
        grace_blocks: Option<i64>,
    ) -> Result<FeeEstimate, MoneroError> {
        fetch_estimate(self.daemon_client(crypto_code)?, grace_blocks).await
    }
}
