//! One participant's half of the channel ledger.
//!
//! A [`ChannelEndState`] tracks what a single participant has deposited,
//! sent and locked. It only changes through the `register_*` methods, each
//! of which validates a balance proof completely before touching any field:
//! a rejected message leaves the end-state exactly as it was.
//!
//! # Lock bookkeeping
//!
//! Locks live in one of two sets, and in the Merkle tree while in either:
//!
//! - **pending**: the secret is unknown
//! - **unclaimed**: the secret is known locally, but the sender has not yet
//!   signed a balance proof that removes the lock
//!
//! Only a [`SecretMessage`] moves value out of the lock and into
//! `transferred_amount`.

use crate::error::{LedgerError, LedgerResult};
use crate::lock::{hash_secret, Lock};
use crate::messages::{DirectTransfer, MediatedTransfer, SecretMessage};
use crate::tree::LockTree;
use crate::{Address, Hash};
use std::collections::HashMap;

/// A lock whose secret has been revealed but whose value is not settled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclaimedLock {
    pub lock: Lock,
    pub secret: [u8; 32],
}

/// Ledger state of one channel participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEndState {
    address: Address,
    /// On-chain deposit.
    contract_balance: u128,
    /// Total value this participant has sent, ever.
    transferred_amount: u128,
    /// Nonce of the last accepted balance proof, 0 before the first one.
    nonce: u64,
    pending_locks: HashMap<Hash, Lock>,
    unclaimed_locks: HashMap<Hash, UnclaimedLock>,
    tree: LockTree,
}

impl ChannelEndState {
    /// Create the end-state at channel open.
    pub fn new(address: Address, contract_balance: u128) -> Self {
        Self {
            address,
            contract_balance,
            transferred_amount: 0,
            nonce: 0,
            pending_locks: HashMap::new(),
            unclaimed_locks: HashMap::new(),
            tree: LockTree::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn contract_balance(&self) -> u128 {
        self.contract_balance
    }

    pub fn transferred_amount(&self) -> u128 {
        self.transferred_amount
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn next_nonce(&self) -> u64 {
        self.nonce + 1
    }

    /// Settled value held by this participant, before subtracting locks.
    ///
    /// `contract_balance - transferred_amount + other.transferred_amount`
    pub fn balance(&self, other: &ChannelEndState) -> u128 {
        self.contract_balance
            .saturating_add(other.transferred_amount)
            .saturating_sub(self.transferred_amount)
    }

    /// Value this participant may still commit to new transfers.
    pub fn distributable(&self, other: &ChannelEndState) -> u128 {
        self.balance(other).saturating_sub(self.amount_locked())
    }

    /// Total value held in locks, pending or unclaimed.
    pub fn amount_locked(&self) -> u128 {
        let pending: u128 = self.pending_locks.values().map(|lock| lock.amount).sum();
        let unclaimed: u128 = self.unclaimed_locks.values().map(|u| u.lock.amount).sum();
        pending + unclaimed
    }

    /// True if a lock with this hashlock is waiting for its secret.
    pub fn is_locked(&self, hashlock: &Hash) -> bool {
        self.pending_locks.contains_key(hashlock)
    }

    /// True if a lock with this hashlock is held at all.
    pub fn is_known(&self, hashlock: &Hash) -> bool {
        self.pending_locks.contains_key(hashlock) || self.unclaimed_locks.contains_key(hashlock)
    }

    /// Look up a held lock by hashlock.
    pub fn get_lock(&self, hashlock: &Hash) -> Option<&Lock> {
        self.pending_locks
            .get(hashlock)
            .or_else(|| self.unclaimed_locks.get(hashlock).map(|u| &u.lock))
    }

    pub fn unclaimed_locks(&self) -> impl Iterator<Item = &UnclaimedLock> {
        self.unclaimed_locks.values()
    }

    pub fn merkle_root(&self) -> Hash {
        self.tree.merkle_root()
    }

    pub fn compute_root_with(&self, lock: &Lock) -> LedgerResult<Hash> {
        self.tree.compute_root_with(lock)
    }

    pub fn compute_root_without(&self, lock: &Lock) -> LedgerResult<Hash> {
        self.tree.compute_root_without(lock)
    }

    /// Record a newer on-chain deposit.
    pub fn update_contract_balance(&mut self, contract_balance: u128) -> LedgerResult<()> {
        if contract_balance < self.contract_balance {
            return Err(LedgerError::BalanceDecrease {
                current: self.contract_balance,
                requested: contract_balance,
            });
        }
        self.contract_balance = contract_balance;
        Ok(())
    }

    fn check_nonce(&self, nonce: u64) -> LedgerResult<()> {
        if nonce != self.next_nonce() {
            return Err(LedgerError::InvalidNonce {
                expected: self.next_nonce(),
                actual: nonce,
            });
        }
        Ok(())
    }

    fn check_transferred_increase(&self, transferred_amount: u128) -> LedgerResult<()> {
        if transferred_amount < self.transferred_amount {
            return Err(LedgerError::TransferAmountDecrease {
                current: self.transferred_amount,
                received: transferred_amount,
            });
        }
        Ok(())
    }

    /// Check that sending `transferred_amount` in total while holding
    /// `amount_locked` stays within this participant's funds.
    fn check_spendable(
        &self,
        other: &ChannelEndState,
        transferred_amount: u128,
        amount_locked: u128,
    ) -> LedgerResult<()> {
        let funds = self.contract_balance.saturating_add(other.transferred_amount);
        let committed = transferred_amount.saturating_add(amount_locked);
        if committed > funds {
            let already = self.transferred_amount.saturating_add(self.amount_locked());
            return Err(LedgerError::InsufficientBalance {
                available: self.distributable(other),
                required: committed.saturating_sub(already),
            });
        }
        Ok(())
    }

    /// Apply a direct transfer signed by this participant.
    pub fn register_direct_transfer(
        &mut self,
        transfer: &DirectTransfer,
        other: &ChannelEndState,
    ) -> LedgerResult<()> {
        self.check_nonce(transfer.nonce)?;
        if transfer.locksroot != self.merkle_root() {
            return Err(LedgerError::LocksrootMismatch {
                expected: self.merkle_root(),
                actual: transfer.locksroot,
            });
        }
        self.check_transferred_increase(transfer.transferred_amount)?;
        self.check_spendable(other, transfer.transferred_amount, self.amount_locked())?;

        self.transferred_amount = transfer.transferred_amount;
        self.nonce = transfer.nonce;
        Ok(())
    }

    /// Apply a mediated transfer signed by this participant, adding its lock.
    pub fn register_locked_transfer(
        &mut self,
        transfer: &MediatedTransfer,
        other: &ChannelEndState,
    ) -> LedgerResult<()> {
        let lock = transfer.lock;

        self.check_nonce(transfer.nonce)?;
        if self.is_known(&lock.hashlock) {
            return Err(LedgerError::DuplicateLock {
                lock_hash: lock.lock_hash(),
            });
        }
        let expected_root = self.compute_root_with(&lock)?;
        if transfer.locksroot != expected_root {
            return Err(LedgerError::LocksrootMismatch {
                expected: expected_root,
                actual: transfer.locksroot,
            });
        }
        self.check_transferred_increase(transfer.transferred_amount)?;
        self.check_spendable(
            other,
            transfer.transferred_amount,
            self.amount_locked().saturating_add(lock.amount),
        )?;

        self.tree.add_lock(&lock)?;
        self.pending_locks.insert(lock.hashlock, lock);
        self.transferred_amount = transfer.transferred_amount;
        self.nonce = transfer.nonce;
        Ok(())
    }

    /// Record that `secret` is known without moving any value.
    ///
    /// Returns `true` if this revealed a pending lock and `false` if the lock
    /// was already unclaimed.
    pub fn register_secret(&mut self, secret: &[u8; 32]) -> LedgerResult<bool> {
        let hashlock = hash_secret(secret);
        if self.unclaimed_locks.contains_key(&hashlock) {
            return Ok(false);
        }
        match self.pending_locks.remove(&hashlock) {
            Some(lock) => {
                self.unclaimed_locks.insert(
                    hashlock,
                    UnclaimedLock {
                        lock,
                        secret: *secret,
                    },
                );
                Ok(true)
            }
            None => Err(LedgerError::NoMatchingLock { hashlock }),
        }
    }

    /// Apply a secret message signed by this participant, settling the lock.
    pub fn register_secret_message(&mut self, message: &SecretMessage) -> LedgerResult<()> {
        let hashlock = message.hashlock();
        let lock = *self
            .get_lock(&hashlock)
            .ok_or(LedgerError::NoMatchingLock { hashlock })?;

        self.check_nonce(message.nonce)?;
        let expected_root = self.compute_root_without(&lock)?;
        if message.locksroot != expected_root {
            return Err(LedgerError::LocksrootMismatch {
                expected: expected_root,
                actual: message.locksroot,
            });
        }
        let expected_amount = self.transferred_amount.saturating_add(lock.amount);
        if message.transferred_amount != expected_amount {
            return Err(LedgerError::TransferAmountMismatch {
                expected: expected_amount,
                actual: message.transferred_amount,
            });
        }

        self.tree.remove_lock(&lock)?;
        self.pending_locks.remove(&hashlock);
        self.unclaimed_locks.remove(&hashlock);
        self.transferred_amount = expected_amount;
        self.nonce = message.nonce;
        Ok(())
    }
}
