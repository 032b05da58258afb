//! Cryptographic collaborators for the payledger channel core.
//!
//! The ledger itself never touches key material directly. It consumes two
//! narrow capabilities from this crate:
//!
//! - **SHA256**: lock identity hashes, hashlocks and Merkle node hashing
//! - **Ed25519**: signing balance-proof messages and checking who signed them
//!
//! Channel participants are addressed by their 32-byte Ed25519 public key, so
//! verifying a signature against the key carried in a message envelope is all
//! that "recovering" a sender takes.
//!
//! # Example
//!
//! ```
//! use payledger_crypto::{random_bytes_32, sha256, verify_signature, Ed25519Keypair};
//!
//! let payer = Ed25519Keypair::generate();
//!
//! // A secret and the hashlock that commits to it
//! let secret = random_bytes_32();
//! let hashlock = sha256(&secret);
//!
//! let signature = payer.sign(&hashlock);
//! assert!(verify_signature(&payer.public_key, &hashlock, &signature).is_ok());
//! ```

pub mod ed25519;
pub mod sha256;

pub use ed25519::{verify_signature, Ed25519Error, Ed25519Keypair};
pub use sha256::{sha256, sha256_multi};

/// Generate a cryptographically secure random 32-byte array.
///
/// Used for lock secrets; the hashlock of a secret is `sha256(secret)`.
pub fn random_bytes_32() -> [u8; 32] {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
