//! Error types for the channel ledger.
//!
//! Every rejection is returned to the caller; none is fatal. A call that
//! returns an error has not changed either end-state.

use crate::{Address, Hash};
use thiserror::Error;

/// Errors that can occur while creating or registering channel messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Reveal/settle timeouts do not satisfy `0 < reveal < settle`.
    #[error("Invalid timeouts: reveal {reveal_timeout}, settle {settle_timeout}")]
    InvalidTimeout {
        reveal_timeout: u64,
        settle_timeout: u64,
    },

    /// Transfer amount must be positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(u128),

    /// Amount exceeds what the sender may still distribute.
    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u128, required: u128 },

    /// On-chain deposits can only grow.
    #[error("Contract balance cannot decrease: current {current}, requested {requested}")]
    BalanceDecrease { current: u128, requested: u128 },

    /// Nonce must be exactly one above the last accepted nonce.
    #[error("Invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: u64, actual: u64 },

    /// Locksroot in the message disagrees with the locally computed root.
    #[error(
        "Locksroot mismatch: expected {}, got {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    LocksrootMismatch { expected: Hash, actual: Hash },

    /// No pending or unclaimed lock commits to this hashlock.
    #[error("No lock matches hashlock {}", hex::encode(.hashlock))]
    NoMatchingLock { hashlock: Hash },

    /// The lock, or another lock with the same hashlock, is already held.
    #[error("Duplicate lock {}", hex::encode(.lock_hash))]
    DuplicateLock { lock_hash: Hash },

    /// The lock is not in the tree.
    #[error("Unknown lock {}", hex::encode(.lock_hash))]
    UnknownLock { lock_hash: Hash },

    /// Message was signed by someone who is not a channel participant,
    /// or by the wrong participant for this message.
    #[error("Invalid sender {}", hex::encode(.sender))]
    InvalidSender { sender: Address },

    /// Signature is malformed or does not match the claimed sender.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Channel is in the wrong lifecycle state for the operation.
    #[error("Invalid channel state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    /// Message targets a different channel.
    #[error(
        "Channel mismatch: expected {}, got {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    ChannelMismatch { expected: Address, actual: Address },

    /// Message names a different token.
    #[error(
        "Token mismatch: expected {}, got {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    TokenMismatch { expected: Address, actual: Address },

    /// Message recipient is not the other participant.
    #[error(
        "Invalid recipient: expected {}, got {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    InvalidRecipient { expected: Address, actual: Address },

    /// Address is not one of the two participants.
    #[error("Address {} is not a channel participant", hex::encode(.address))]
    NotParticipant { address: Address },

    /// Lock expiration lies outside the accepted window.
    #[error("Invalid lock expiration {expiration}, limit {limit}")]
    InvalidLockExpiration { expiration: u64, limit: u64 },

    /// Transferred amount went backwards.
    #[error("Transferred amount cannot decrease: current {current}, received {received}")]
    TransferAmountDecrease { current: u128, received: u128 },

    /// Transferred amount does not match the value being unlocked.
    #[error("Transferred amount mismatch: expected {expected}, got {actual}")]
    TransferAmountMismatch { expected: u128, actual: u128 },
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_display() {
        let err = LedgerError::InsufficientBalance {
            available: 40,
            required: 70,
        };
        assert!(err.to_string().contains("40"));
        assert!(err.to_string().contains("70"));
    }

    #[test]
    fn test_invalid_nonce_display() {
        let err = LedgerError::InvalidNonce {
            expected: 5,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Invalid nonce: expected 5, got 3");
    }

    #[test]
    fn test_hashes_render_as_hex() {
        let err = LedgerError::NoMatchingLock {
            hashlock: [0xab; 32],
        };
        assert!(err.to_string().contains(&"ab".repeat(32)));

        let err = LedgerError::LocksrootMismatch {
            expected: [0x01; 32],
            actual: [0x02; 32],
        };
        let rendered = err.to_string();
        assert!(rendered.contains(&"01".repeat(32)));
        assert!(rendered.contains(&"02".repeat(32)));
    }
}
