//! Authentication service
//!
//! Drives the Sign-In with Ethereum flow: hand out a nonce, then accept a
//! signed message that embeds it and exchange it for a session token.

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;

use super::clock::Clock;
use super::crypto::{checksum_address, verify_personal_signature, SignatureError};
use super::jwt::{JwtService, TokenError};
use super::message::{MessageParseError, PolicyViolation, SiweConstraints, SiweMessage};
use super::nonce_store::{NonceError, NonceStore};

/// Auth service errors
///
/// Callers must restart the flow with a new nonce on any of these.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Nonce generation failed: {0}")]
    NonceGeneration(#[from] NonceError),

    #[error("Malformed SIWE message: {0}")]
    MalformedMessage(#[from] MessageParseError),

    #[error("SIWE domain mismatch: got {actual:?}, expected {expected:?}")]
    DomainMismatch { expected: String, actual: String },

    #[error("SIWE URI mismatch: got {actual:?}, expected {expected:?}")]
    UriMismatch { expected: String, actual: String },

    #[error("SIWE chain ID mismatch: got {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Missing nonce")]
    MissingNonce,

    #[error("Invalid or expired nonce")]
    InvalidOrExpiredNonce,

    #[error("SIWE message time constraints invalid")]
    TimeConstraintViolation,

    #[error("Invalid signature: {0}")]
    SignatureInvalid(#[from] SignatureError),

    #[error("Nonce already used")]
    NonceReplay,

    #[error("Failed to issue token: {0}")]
    TokenIssuance(#[source] TokenError),
}

impl From<PolicyViolation> for AuthError {
    fn from(violation: PolicyViolation) -> Self {
        match violation {
            PolicyViolation::DomainMismatch { expected, actual } => {
                AuthError::DomainMismatch { expected, actual }
            }
            PolicyViolation::UriMismatch { expected, actual } => {
                AuthError::UriMismatch { expected, actual }
            }
            PolicyViolation::ChainMismatch { expected, actual } => {
                AuthError::ChainMismatch { expected, actual }
            }
            PolicyViolation::MissingNonce => AuthError::MissingNonce,
            PolicyViolation::TimeConstraintViolation(_) => AuthError::TimeConstraintViolation,
        }
    }
}

impl AuthError {
    /// Stable name of the failure kind, for logs
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::NonceGeneration(_) => "NONCE_GENERATION_FAILED",
            AuthError::MalformedMessage(_) => "MALFORMED_MESSAGE",
            AuthError::DomainMismatch { .. } => "DOMAIN_MISMATCH",
            AuthError::UriMismatch { .. } => "URI_MISMATCH",
            AuthError::ChainMismatch { .. } => "CHAIN_MISMATCH",
            AuthError::MissingNonce => "MISSING_NONCE",
            AuthError::InvalidOrExpiredNonce => "INVALID_OR_EXPIRED_NONCE",
            AuthError::TimeConstraintViolation => "TIME_CONSTRAINT_VIOLATION",
            AuthError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            AuthError::NonceReplay => "NONCE_REPLAY",
            AuthError::TokenIssuance(_) => "TOKEN_ISSUANCE_FAILED",
        }
    }
}

/// Outcome of a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLogin {
    pub token: String,
    /// EIP-55 checksummed
    pub address: String,
}

/// Collaborators and policy for [`AuthService`]
pub struct AuthDeps {
    pub nonce_store: Arc<NonceStore>,
    pub jwt: Arc<JwtService>,
    pub constraints: SiweConstraints,
    pub nonce_ttl: Duration,
    pub clock: Arc<dyn Clock>,
}

/// Authentication service
pub struct AuthService {
    nonce_store: Arc<NonceStore>,
    jwt: Arc<JwtService>,
    constraints: SiweConstraints,
    nonce_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(deps: AuthDeps) -> Self {
        Self {
            nonce_store: deps.nonce_store,
            jwt: deps.jwt,
            constraints: deps.constraints,
            nonce_ttl: deps.nonce_ttl,
            clock: deps.clock,
        }
    }

    /// Issue a nonce for a new sign-in attempt
    pub fn new_nonce(&self) -> Result<String, AuthError> {
        Ok(self.nonce_store.new_nonce(self.nonce_ttl)?)
    }

    /// Verify a signed SIWE message and mint a session token
    ///
    /// Cheap checks run before signature recovery, and the nonce is only
    /// consumed once the signature is known to be good.
    pub fn verify_siwe(&self, message: &str, signature: &str) -> Result<VerifiedLogin, AuthError> {
        let parsed: SiweMessage = message.parse()?;

        self.constraints.validate(&parsed, self.clock.now())?;

        if parsed.nonce.is_empty() {
            return Err(AuthError::MissingNonce);
        }

        if !self.nonce_store.is_valid(&parsed.nonce) {
            return Err(AuthError::InvalidOrExpiredNonce);
        }

        // Re-evaluated here since issuance and submission are apart in time
        self.constraints
            .check_time_window(&parsed, self.clock.now())?;

        // The wallet signed the submitted text byte for byte
        verify_personal_signature(message, signature, &parsed.address)?;

        if !self.nonce_store.consume(&parsed.nonce) {
            return Err(AuthError::NonceReplay);
        }

        let address = checksum_address(&parsed.address);
        let token = self.jwt.issue(&address).map_err(AuthError::TokenIssuance)?;

        Ok(VerifiedLogin { token, address })
    }

    pub fn constraints(&self) -> &SiweConstraints {
        &self.constraints
    }

    pub fn nonce_ttl(&self) -> Duration {
        self.nonce_ttl
    }

    pub fn token_expiry(&self) -> Duration {
        self.jwt.expiry()
    }
}
