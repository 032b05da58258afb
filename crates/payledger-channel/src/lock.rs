//! Hash-time locks.
//!
//! A [`Lock`] promises `amount` to the partner if the secret behind
//! `hashlock` is revealed before block `expiration`. Locks are immutable
//! values identified by the SHA256 of their canonical encoding; that identity
//! hash is what goes into the Merkle tree, and is unrelated to the hashlock.

use crate::Hash;
use payledger_crypto::{random_bytes_32, sha256};
use serde::{Deserialize, Serialize};

/// Encoded size of a lock: expiration (8) + amount (16) + hashlock (32).
pub const LOCK_ENCODED_LEN: usize = 56;

/// A conditional payment held in one party's lock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Block number at which the lock stops being claimable.
    pub expiration: u64,
    /// Value promised.
    pub amount: u128,
    /// SHA256 of the secret that unlocks the value.
    pub hashlock: Hash,
}

impl Lock {
    /// Create a new lock.
    pub fn new(amount: u128, hashlock: Hash, expiration: u64) -> Self {
        Self {
            expiration,
            amount,
            hashlock,
        }
    }

    /// Canonical big-endian encoding used for the lock hash.
    pub fn as_bytes(&self) -> [u8; LOCK_ENCODED_LEN] {
        let mut data = [0u8; LOCK_ENCODED_LEN];
        data[0..8].copy_from_slice(&self.expiration.to_be_bytes());
        data[8..24].copy_from_slice(&self.amount.to_be_bytes());
        data[24..56].copy_from_slice(&self.hashlock);
        data
    }

    /// Identity hash of this lock, used as its Merkle leaf.
    pub fn lock_hash(&self) -> Hash {
        sha256(&self.as_bytes())
    }

    /// A lock is expired once the chain reaches its expiration block.
    pub fn is_expired(&self, block_number: u64) -> bool {
        self.expiration <= block_number
    }

    /// Check whether `secret` opens this lock.
    pub fn matches_secret(&self, secret: &[u8]) -> bool {
        hash_secret(secret) == self.hashlock
    }
}

/// Hashlock committing to `secret`.
pub fn hash_secret(secret: &[u8]) -> Hash {
    sha256(secret)
}

/// Generate a random secret together with its hashlock.
pub fn generate_secret() -> ([u8; 32], Hash) {
    let secret = random_bytes_32();
    let hashlock = hash_secret(&secret);
    (secret, hashlock)
}
