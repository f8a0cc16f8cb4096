//! JWT session tokens
//!
//! Handles creation and verification of stateless bearer tokens that carry
//! the authenticated wallet address.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::clock::Clock;

/// The only algorithm tokens are signed and accepted with
pub const JWT_ALGORITHM: Algorithm = Algorithm::HS256;
const JWT_ALGORITHM_NAME: &str = "HS256";

/// JWT-related errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Unexpected signing algorithm: {0}")]
    WrongAlgorithm(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Unexpected token issuer")]
    WrongIssuer,

    #[error("Token has no address claim")]
    MissingAddressClaim,
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::EncodingFailed(_) => "TOKEN_ENCODING_FAILED",
            TokenError::MalformedToken(_) => "MALFORMED_TOKEN",
            TokenError::WrongAlgorithm(_) => "WRONG_ALGORITHM",
            TokenError::InvalidSignature => "INVALID_TOKEN_SIGNATURE",
            TokenError::ExpiredToken => "TOKEN_EXPIRED",
            TokenError::WrongIssuer => "WRONG_ISSUER",
            TokenError::MissingAddressClaim => "MISSING_ADDRESS_CLAIM",
        }
    }
}

/// JWT claims for session tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (checksummed wallet address)
    #[serde(default)]
    pub sub: String,
    /// Issuer
    #[serde(default)]
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID, for log correlation
    #[serde(default)]
    pub jti: String,
}

/// Resolves a bearer token to the wallet address it was issued for
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<String, TokenError>;
}

/// Issues and verifies HS256 session tokens
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiry: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtService {
    /// # Arguments
    /// * `secret` - HMAC signing secret
    /// * `issuer` - Issuer claim; when empty the issuer is not checked on verify
    /// * `expiry` - Token lifetime
    pub fn new(secret: &str, issuer: String, expiry: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            expiry,
            clock,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Mint a token for `address`
    pub fn issue(&self, address: &str) -> Result<String, TokenError> {
        let now = self.clock.now();
        let exp = now.checked_add_signed(self.expiry).ok_or_else(|| {
            TokenError::EncodingFailed("Token expiry out of range".to_string())
        })?;

        let claims = Claims {
            sub: address.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))
    }

    /// Verify and decode a token
    ///
    /// # Returns
    /// * `Ok(Claims)` if the token is valid at the current clock time
    /// * `Err(TokenError)` naming the first check that failed
    pub fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        // Checked up front so "none" and other algorithms get their own error
        let algorithm = header_algorithm(token)?;
        if algorithm != JWT_ALGORITHM_NAME {
            return Err(TokenError::WrongAlgorithm(algorithm));
        }

        // Expiry and issuer are checked below against the injected clock
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => TokenError::WrongAlgorithm(algorithm.clone()),
                _ => TokenError::MalformedToken(e.to_string()),
            },
        )?;
        let claims = token_data.claims;

        if self.clock.now().timestamp() > claims.exp {
            return Err(TokenError::ExpiredToken);
        }

        if !self.issuer.is_empty() && claims.iss != self.issuer {
            return Err(TokenError::WrongIssuer);
        }

        if claims.sub.is_empty() {
            return Err(TokenError::MissingAddressClaim);
        }

        Ok(claims)
    }
}

impl TokenVerifier for JwtService {
    fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.decode_claims(token).map(|claims| claims.sub)
    }
}

/// Read the `alg` field of the token header without trusting anything else
fn header_algorithm(token: &str) -> Result<String, TokenError> {
    let header_segment = token
        .split('.')
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| TokenError::MalformedToken("Missing header".to_string()))?;

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_segment)
        .map_err(|e| TokenError::MalformedToken(e.to_string()))?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| TokenError::MalformedToken(e.to_string()))?;

    header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TokenError::MalformedToken("Missing 'alg' header".to_string()))
}
