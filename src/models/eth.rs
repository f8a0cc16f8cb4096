//! Chain proxy request and response bodies

use serde::{Deserialize, Serialize};

/// Chain the upstream node serves
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    /// Decimal chain ID
    pub chain_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub address: Option<String>,
}

/// Balance of an account at the latest block
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// EIP-55 checksummed
    pub address: String,
    /// Decimal wei
    pub wei: String,
    /// Ether with 18 fractional digits
    pub eth: String,
}
