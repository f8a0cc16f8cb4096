//! Single-use challenge nonces
//!
//! Nonces live in an in-memory table guarded by one mutex. Expired entries are
//! dropped lazily when they are looked up, and in bulk by [`NonceStore::purge_expired`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use super::clock::Clock;

/// Random bytes per nonce (144 bits, 24 base64url characters)
const NONCE_BYTES: usize = 18;

/// Nonce store errors
#[derive(Error, Debug)]
pub enum NonceError {
    #[error("Entropy source failure: {0}")]
    Entropy(#[from] rand::Error),

    #[error("Nonce expiry out of range")]
    ExpiryOutOfRange,
}

#[derive(Debug, Clone, Copy)]
struct NonceEntry {
    expires_at: DateTime<Utc>,
    used: bool,
}

impl NonceEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Issues and tracks single-use nonces
pub struct NonceStore {
    entries: Mutex<HashMap<String, NonceEntry>>,
    clock: Arc<dyn Clock>,
}

impl NonceStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Generate a fresh nonce that stays valid for `ttl`
    pub fn new_nonce(&self, ttl: Duration) -> Result<String, NonceError> {
        loop {
            // Entropy is drawn before taking the lock
            let nonce = generate_nonce()?;
            let expires_at = self
                .clock
                .now()
                .checked_add_signed(ttl)
                .ok_or(NonceError::ExpiryOutOfRange)?;

            let mut entries = self.lock();
            if let Entry::Vacant(slot) = entries.entry(nonce.clone()) {
                slot.insert(NonceEntry {
                    expires_at,
                    used: false,
                });
                return Ok(nonce);
            }
        }
    }

    /// True if the nonce is known, unused and not expired
    ///
    /// An expired entry is evicted as a side effect.
    pub fn is_valid(&self, nonce: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.lock();

        let Some(entry) = entries.get(nonce) else {
            return false;
        };

        if entry.used {
            return false;
        }

        if entry.is_expired(now) {
            entries.remove(nonce);
            return false;
        }

        true
    }

    /// Atomically mark the nonce as used
    ///
    /// Returns false if the nonce is unknown, already used or expired. Among
    /// concurrent callers on the same nonce exactly one gets `true`.
    pub fn consume(&self, nonce: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.lock();

        let Some(entry) = entries.get_mut(nonce) else {
            return false;
        };

        if entry.used {
            return false;
        }

        if entry.is_expired(now) {
            entries.remove(nonce);
            return false;
        }

        entry.used = true;
        true
    }

    /// Drop every expired or consumed entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();

        let before = entries.len();
        entries.retain(|_, entry| !entry.used && !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, NonceEntry>> {
        // The table holds plain data, so a panicked holder cannot leave it torn
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Generate a cryptographically secure, URL-safe nonce
fn generate_nonce() -> Result<String, NonceError> {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
