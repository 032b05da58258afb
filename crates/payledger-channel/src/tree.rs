//! Merkle tree over the hashes of one party's locks.
//!
//! Both parties rebuild each other's tree independently and compare roots,
//! so the construction has to be fully deterministic:
//!
//! - leaves are lock hashes sorted ascending by raw bytes
//! - an empty tree has root [`EMPTY_HASH`]
//! - a single leaf is its own root
//! - parents are `sha256(left || right)`; an odd trailing node pairs with itself

use crate::error::{LedgerError, LedgerResult};
use crate::lock::Lock;
use crate::Hash;
use payledger_crypto::sha256_multi;

/// Root of an empty lock tree: `sha256("")`.
pub const EMPTY_HASH: Hash = [
    0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
    0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
];

/// Compute the Merkle root of already-sorted leaves.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    match leaves {
        [] => EMPTY_HASH,
        [leaf] => *leaf,
        _ => {
            let mut level: Vec<Hash> = leaves.to_vec();
            while level.len() > 1 {
                level = level
                    .chunks(2)
                    .map(|pair| {
                        let left = &pair[0];
                        let right = pair.get(1).unwrap_or(left);
                        sha256_multi(&[left, right])
                    })
                    .collect();
            }
            level[0]
        }
    }
}

/// Ordered set of lock hashes with a cached root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTree {
    leaves: Vec<Hash>,
    root: Hash,
}

impl LockTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            leaves: Vec::new(),
            root: EMPTY_HASH,
        }
    }

    /// Insert a lock.
    pub fn add_lock(&mut self, lock: &Lock) -> LedgerResult<()> {
        let lock_hash = lock.lock_hash();
        match self.leaves.binary_search(&lock_hash) {
            Ok(_) => Err(LedgerError::DuplicateLock { lock_hash }),
            Err(pos) => {
                self.leaves.insert(pos, lock_hash);
                self.root = merkle_root(&self.leaves);
                Ok(())
            }
        }
    }

    /// Remove a lock.
    pub fn remove_lock(&mut self, lock: &Lock) -> LedgerResult<()> {
        let lock_hash = lock.lock_hash();
        match self.leaves.binary_search(&lock_hash) {
            Ok(pos) => {
                self.leaves.remove(pos);
                self.root = merkle_root(&self.leaves);
                Ok(())
            }
            Err(_) => Err(LedgerError::UnknownLock { lock_hash }),
        }
    }

    /// Current root.
    pub fn merkle_root(&self) -> Hash {
        self.root
    }

    /// Root the tree would have with `lock` added. Does not modify the tree.
    pub fn compute_root_with(&self, lock: &Lock) -> LedgerResult<Hash> {
        let lock_hash = lock.lock_hash();
        match self.leaves.binary_search(&lock_hash) {
            Ok(_) => Err(LedgerError::DuplicateLock { lock_hash }),
            Err(pos) => {
                let mut leaves = self.leaves.clone();
                leaves.insert(pos, lock_hash);
                Ok(merkle_root(&leaves))
            }
        }
    }

    /// Root the tree would have with `lock` removed. Does not modify the tree.
    pub fn compute_root_without(&self, lock: &Lock) -> LedgerResult<Hash> {
        let lock_hash = lock.lock_hash();
        match self.leaves.binary_search(&lock_hash) {
            Ok(pos) => {
                let mut leaves = self.leaves.clone();
                leaves.remove(pos);
                Ok(merkle_root(&leaves))
            }
            Err(_) => Err(LedgerError::UnknownLock { lock_hash }),
        }
    }

    pub fn contains(&self, lock: &Lock) -> bool {
        self.leaves.binary_search(&lock.lock_hash()).is_ok()
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

impl Default for LockTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payledger_crypto::sha256;

    fn lock(n: u8) -> Lock {
        Lock::new(n as u128 * 10, sha256(&[n]), 100 + n as u64)
    }

    #[test]
    fn test_empty_tree() {
        let tree = LockTree::new();

        assert_eq!(EMPTY_HASH, sha256(&[]));
        assert_eq!(tree.merkle_root(), EMPTY_HASH);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_single_leaf_is_root() {
        let mut tree = LockTree::new();
        let l = lock(1);
        tree.add_lock(&l).unwrap();

        assert_eq!(tree.merkle_root(), l.lock_hash());
    }

    #[test]
    fn test_two_leaves_sorted() {
        let (a, b) = (lock(1), lock(2));
        let mut tree = LockTree::new();
        tree.add_lock(&a).unwrap();
        tree.add_lock(&b).unwrap();

        let (lo, hi) = if a.lock_hash() < b.lock_hash() {
            (a.lock_hash(), b.lock_hash())
        } else {
            (b.lock_hash(), a.lock_hash())
        };
        assert_eq!(tree.merkle_root(), sha256_multi(&[&lo, &hi]));
    }

    #[test]
    fn test_odd_node_pairs_with_itself() {
        let mut leaves: Vec<Hash> = (1..=3).map(|n| lock(n).lock_hash()).collect();
        leaves.sort();

        let left = sha256_multi(&[&leaves[0], &leaves[1]]);
        let right = sha256_multi(&[&leaves[2], &leaves[2]]);
        assert_eq!(merkle_root(&leaves), sha256_multi(&[&left, &right]));
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut forward = LockTree::new();
        let mut backward = LockTree::new();
        for n in 1..=5 {
            forward.add_lock(&lock(n)).unwrap();
        }
        for n in (1..=5).rev() {
            backward.add_lock(&lock(n)).unwrap();
        }

        assert_eq!(forward.merkle_root(), backward.merkle_root());
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_add_then_remove_returns_to_empty() {
        let mut tree = LockTree::new();
        let l = lock(7);

        tree.add_lock(&l).unwrap();
        assert!(tree.contains(&l));
        assert_ne!(tree.merkle_root(), EMPTY_HASH);

        tree.remove_lock(&l).unwrap();
        assert_eq!(tree.merkle_root(), EMPTY_HASH);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_duplicate_and_unknown_locks() {
        let mut tree = LockTree::new();
        let l = lock(3);
        tree.add_lock(&l).unwrap();

        match tree.add_lock(&l) {
            Err(LedgerError::DuplicateLock { lock_hash }) => assert_eq!(lock_hash, l.lock_hash()),
            other => panic!("Expected DuplicateLock, got {:?}", other),
        }
        match tree.remove_lock(&lock(4)) {
            Err(LedgerError::UnknownLock { .. }) => {}
            other => panic!("Expected UnknownLock, got {:?}", other),
        }
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_projections_leave_tree_untouched() {
        let mut tree = LockTree::new();
        tree.add_lock(&lock(1)).unwrap();
        let before = tree.clone();

        let with = tree.compute_root_with(&lock(2)).unwrap();
        let without = tree.compute_root_without(&lock(1)).unwrap();
        assert_eq!(tree, before);
        assert_eq!(without, EMPTY_HASH);

        tree.add_lock(&lock(2)).unwrap();
        assert_eq!(tree.merkle_root(), with);

        assert!(tree.compute_root_with(&lock(2)).is_err());
        assert!(tree.compute_root_without(&lock(9)).is_err());
    }
}
