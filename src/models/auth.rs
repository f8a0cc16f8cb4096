//! Sign-in request and response bodies

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Response for a fresh sign-in attempt
///
/// Carries the server-side expectations so a client can build a message
/// that will pass validation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub nonce: String,
    pub domain: String,
    pub uri: String,
    pub chain_id: u64,
    pub statement: String,
    /// Seconds until the nonce expires
    pub expires_in: i64,
}

/// Request to verify a signed SIWE message
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    /// Exact message text the wallet signed
    #[serde(default)]
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,

    /// Hex `r || s || v` signature
    #[serde(default)]
    #[validate(length(min = 1, message = "signature is required"))]
    pub signature: String,
}

/// Issued session token
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub token: String,
    pub address: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Identity behind the presented bearer token
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub address: String,
}
