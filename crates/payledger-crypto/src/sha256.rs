//! SHA256 helpers.
//!
//! Every hash in the ledger (lock hashes, hashlocks, Merkle nodes) is a
//! plain 32-byte SHA256 digest produced here.

use sha2::{Digest, Sha256};

/// Compute the SHA256 digest of `data`.
///
/// # Example
/// ```
/// use payledger_crypto::sha256::sha256;
///
/// let hashlock = sha256(b"secret");
/// assert_eq!(hashlock.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the SHA256 digest of several slices as if they were concatenated.
///
/// Merkle parents are `sha256_multi(&[&left, &right])`, which avoids
/// building a 64-byte buffer per node.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
