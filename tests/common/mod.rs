//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::{eip191_hash_message, Address};
use chrono::{DateTime, Duration, TimeZone, Utc};
use k256::ecdsa::SigningKey;

use siwe_auth_server::auth::{
    AuthDeps, AuthService, Clock, FakeClock, JwtService, NonceStore, SiweConstraints,
    SiweMessage, SiweTimestamp,
};

pub const DOMAIN: &str = "example.com";
pub const URI: &str = "https://example.com";
pub const CHAIN_ID: u64 = 1;
pub const JWT_SECRET: &str = "integration-test-secret-0123456789";
pub const JWT_ISSUER: &str = "siwe-auth-server";

/// Wallet with a throwaway secp256k1 key
pub struct TestWallet {
    key: SigningKey,
    pub address: Address,
}

impl TestWallet {
    pub fn random() -> Self {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let address = Address::from_private_key(&key);
        Self { key, address }
    }

    /// personal_sign over `message`, hex `r || s || v` with v in 27/28
    pub fn sign(&self, message: &str) -> String {
        let hash = eip191_hash_message(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .expect("signing failed");

        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        format!("0x{}", hex::encode(bytes))
    }
}

/// Auth service wired to a fake clock
pub struct Harness {
    pub clock: FakeClock,
    pub nonce_store: Arc<NonceStore>,
    pub jwt: Arc<JwtService>,
    pub service: Arc<AuthService>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Clock that moves a shared [`FakeClock`] forward after every read
pub struct TickingClock {
    inner: FakeClock,
    step: Duration,
}

impl TickingClock {
    pub fn new(inner: FakeClock, step: Duration) -> Self {
        Self { inner, step }
    }
}

impl Clock for TickingClock {
    fn now(&self) -> DateTime<Utc> {
        let now = self.inner.now();
        self.inner.advance(self.step);
        now
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_token_expiry(Duration::hours(24))
    }

    pub fn with_token_expiry(token_expiry: Duration) -> Self {
        let clock = FakeClock::new(start_time());
        let nonce_store = Arc::new(NonceStore::new(Arc::new(clock.clone())));
        let jwt = Arc::new(JwtService::new(
            JWT_SECRET,
            JWT_ISSUER.to_string(),
            token_expiry,
            Arc::new(clock.clone()),
        ));

        let service = Arc::new(AuthService::new(AuthDeps {
            nonce_store: nonce_store.clone(),
            jwt: jwt.clone(),
            constraints: constraints(),
            nonce_ttl: Duration::minutes(5),
            clock: Arc::new(clock.clone()),
        }));

        Self {
            clock,
            nonce_store,
            jwt,
            service,
        }
    }

    /// Service sharing this harness's nonce store and tokens, reading time from `clock`
    pub fn service_with_clock(&self, clock: Arc<dyn Clock>) -> AuthService {
        AuthService::new(AuthDeps {
            nonce_store: self.nonce_store.clone(),
            jwt: self.jwt.clone(),
            constraints: constraints(),
            nonce_ttl: Duration::minutes(5),
            clock,
        })
    }

    /// A message the service would accept, for `wallet` and `nonce`
    pub fn message_for(&self, wallet: &TestWallet, nonce: &str) -> SiweMessage {
        SiweMessage {
            domain: DOMAIN.to_string(),
            address: wallet.address,
            statement: Some("Sign in with Ethereum".to_string()),
            uri: URI.to_string(),
            version: "1".to_string(),
            chain_id: CHAIN_ID,
            nonce: nonce.to_string(),
            issued_at: SiweTimestamp::from(self.clock_now()),
            expiration_time: None,
            not_before: None,
            request_id: None,
            resources: Vec::new(),
        }
    }

    fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

pub fn constraints() -> SiweConstraints {
    SiweConstraints {
        domain: DOMAIN.to_string(),
        uri: URI.to_string(),
        chain_id: CHAIN_ID,
        time_skew: Duration::minutes(2),
    }
}
