//! Ethereum JSON-RPC client
//!
//! Thin read-only proxy over an upstream node, used by the authenticated
//! `/eth/*` endpoints.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Decimal places between wei and ether
const ETHER_DECIMALS: usize = 18;

/// JSON-RPC client errors
#[derive(Error, Debug)]
pub enum EthClientError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

/// Read access to chain state
#[async_trait]
pub trait EthGateway: Send + Sync {
    /// Chain ID of the connected network
    async fn chain_id(&self) -> Result<U256, EthClientError>;

    /// Latest balance of `address` in wei
    async fn balance(&self, address: &Address) -> Result<U256, EthClientError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// reqwest-backed [`EthGateway`]
pub struct EthClient {
    rpc_url: String,
    client: Client,
}

impl EthClient {
    pub fn new(rpc_url: String) -> Self {
        Self {
            rpc_url,
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, EthClientError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json::<RpcResponse>()
            .await?;

        if let Some(err) = response.error {
            return Err(EthClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        response
            .result
            .ok_or_else(|| EthClientError::InvalidResponse(format!("No result for {}", method)))
    }

    async fn call_quantity(&self, method: &str, params: Value) -> Result<U256, EthClientError> {
        let result = self.call(method, params).await?;
        let quantity = result.as_str().ok_or_else(|| {
            EthClientError::InvalidResponse(format!("{} returned a non-string result", method))
        })?;
        parse_quantity(quantity)
    }
}

#[async_trait]
impl EthGateway for EthClient {
    async fn chain_id(&self) -> Result<U256, EthClientError> {
        self.call_quantity("eth_chainId", json!([])).await
    }

    async fn balance(&self, address: &Address) -> Result<U256, EthClientError> {
        self.call_quantity("eth_getBalance", json!([address.to_string(), "latest"]))
            .await
    }
}

/// Decode a `0x`-prefixed hex quantity
pub fn parse_quantity(quantity: &str) -> Result<U256, EthClientError> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| EthClientError::InvalidResponse(format!("Not a hex quantity: {}", quantity)))?;

    if digits.is_empty() {
        return Err(EthClientError::InvalidResponse(
            "Empty hex quantity".to_string(),
        ));
    }

    U256::from_str_radix(digits, 16)
        .map_err(|e| EthClientError::InvalidResponse(format!("{}: {}", quantity, e)))
}

/// Render a wei amount as ether with all 18 fractional digits
pub fn format_ether(wei: U256) -> String {
    let digits = wei.to_string();
    let padded = format!("{:0>width$}", digits, width = ETHER_DECIMALS + 1);
    let (whole, fraction) = padded.split_at(padded.len() - ETHER_DECIMALS);
    format!("{}.{}", whole, fraction)
}
