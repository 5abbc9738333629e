//! Stateless JSON-RPC transport.
//!
//! One client per endpoint. The client performs no retries: retry policy
//! belongs to the caller, and several wallet commands (`generate_from_keys`
//! among them) are not idempotent.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use monero_gateway_common::MoneroError;

/// Default request timeout. Wallet RPCs can be slow while rescanning, so
/// this is deliberately above the health-check timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameter type for RPC methods that take no arguments.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyParams {}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcEnvelope {
    pub result: Option<Value>,
    pub error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Decode a JSON-RPC envelope into a typed response, classifying a present
/// `error` object as `Rejected`.
pub(crate) fn parse_envelope<Resp: DeserializeOwned>(
    envelope: JsonRpcEnvelope,
) -> Result<Resp, MoneroError> {
    if let Some(error) = envelope.error {
        return Err(MoneroError::Rejected {
            code: error.code,
            message: error.message,
        });
    }
    let result = envelope
        .result
        .ok_or_else(|| MoneroError::Malformed("missing result and error".to_string()))?;
    serde_json::from_value(result).map_err(|e| MoneroError::Malformed(e.to_string()))
}

/// HTTP JSON-RPC client for a single daemon or wallet endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl JsonRpcClient {
    pub fn new(
        endpoint: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, MoneroError> {
        Self::with_timeout(endpoint, username, password, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: &str,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MoneroError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MoneroError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            username,
            password,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one JSON-RPC command. Transport failures map to `Unavailable`,
    /// structured RPC errors to `Rejected`, undecodable bodies to
    /// `Malformed`.
    pub async fn call<Req, Resp>(&self, method: &str, params: &Req) -> Result<Resp, MoneroError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "0",
            "method": method,
            "params": params,
        });

        let mut request = self
            .client
            .post(format!("{}/json_rpc", self.endpoint))
            .json(&body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| MoneroError::Unavailable(e.to_string()))?;

        let envelope: JsonRpcEnvelope = response
            .json()
            .await
            .map_err(|e| MoneroError::Malformed(e.to_string()))?;

        parse_envelope(envelope)
    }
}
