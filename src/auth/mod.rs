//! Authentication module
//!
//! Provides wallet-based authentication using Sign-In with Ethereum.
//! - Single-use nonce challenges
//! - EIP-4361 message parsing and policy checks
//! - EIP-191 signature recovery
//! - JWT session token generation and validation

pub mod clock;
mod crypto;
mod jwt;
mod message;
mod nonce_store;
mod service;

pub use clock::{Clock, FakeClock, SystemClock};
pub use crypto::{
    checksum_address, parse_address, parse_signature, recover_signer, verify_personal_signature,
    SignatureError,
};
pub use jwt::{Claims, JwtService, TokenError, TokenVerifier, JWT_ALGORITHM};
pub use message::{
    MessageParseError, PolicyViolation, SiweConstraints, SiweMessage, SiweTimestamp,
};
pub use nonce_store::{NonceError, NonceStore};
pub use service::{AuthDeps, AuthError, AuthService, VerifiedLogin};
