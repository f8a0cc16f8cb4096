//! Ethereum signature verification
//!
//! Recovers the signer of an EIP-191 personal message and checks it against
//! the address the message claims.

use alloy_primitives::{Address, Signature, U256};
use thiserror::Error;

/// Errors that can occur during signature verification
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("Signer recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Recovered signer {recovered} does not match claimed address {expected}")]
    AddressMismatch { expected: Address, recovered: Address },
}

/// Verify that `signature_hex` is a personal-message signature over `message`
/// made by the key behind `claimed`
///
/// # Arguments
/// * `message` - The exact text the wallet signed
/// * `signature_hex` - 65-byte `r || s || v` signature, hex with optional `0x`
/// * `claimed` - Address the message says it was signed by
///
/// # Returns
/// * `Ok(Address)` with the recovered signer if it matches
/// * `Err(SignatureError)` otherwise
pub fn verify_personal_signature(
    message: &str,
    signature_hex: &str,
    claimed: &Address,
) -> Result<Address, SignatureError> {
    let signature = parse_signature(signature_hex)?;
    let recovered = recover_signer(message, &signature)?;

    // Byte comparison, so checksum casing never matters
    if recovered != *claimed {
        return Err(SignatureError::AddressMismatch {
            expected: *claimed,
            recovered,
        });
    }

    Ok(recovered)
}

/// Recover the address that signed `message` under the EIP-191 prefix
pub fn recover_signer(message: &str, signature: &Signature) -> Result<Address, SignatureError> {
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))
}

/// Decode a hex `r || s || v` signature
///
/// `v` may be given either as a parity bit (0/1) or in the legacy 27/28 form.
pub fn parse_signature(signature_hex: &str) -> Result<Signature, SignatureError> {
    let trimmed = signature_hex.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes =
        hex::decode(digits).map_err(|e| SignatureError::InvalidSignatureFormat(e.to_string()))?;

    if bytes.len() != 65 {
        return Err(SignatureError::InvalidSignatureFormat(format!(
            "Expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let y_parity = match bytes[64] {
        0 | 27 => false,
        1 | 28 => true,
        v => return Err(SignatureError::InvalidRecoveryId(v)),
    };

    let r = U256::from_be_slice(&bytes[..32]);
    let s = U256::from_be_slice(&bytes[32..64]);

    Ok(Signature::new(r, s, y_parity))
}

/// Parse a `0x`-prefixed 20-byte hex address, accepting any letter case
pub fn parse_address(address: &str) -> Result<Address, SignatureError> {
    let digits = address.strip_prefix("0x").ok_or_else(|| {
        SignatureError::InvalidAddressFormat("Address must start with '0x'".to_string())
    })?;

    if digits.len() != 40 {
        return Err(SignatureError::InvalidAddressFormat(format!(
            "Expected 40 hex digits, got {}",
            digits.len()
        )));
    }

    let bytes =
        hex::decode(digits).map_err(|e| SignatureError::InvalidAddressFormat(e.to_string()))?;

    Ok(Address::from_slice(&bytes))
}

/// EIP-55 mixed-case representation of an address
pub fn checksum_address(address: &Address) -> String {
    address.to_checksum(None)
}
