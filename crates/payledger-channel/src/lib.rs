//! Payledger - Off-Chain Ledger for Two-Party Payment Channels
//!
//! This crate keeps the balance-proof state of a payment channel between two
//! participants, so they can exchange value many times and reconcile on-chain
//! only once.
//!
//! # Overview
//!
//! Each participant owns half of the ledger, a [`ChannelEndState`]:
//!
//! - **contract balance**: what they deposited on-chain
//! - **transferred amount**: the running total they have sent
//! - **nonce**: the number of balance proofs they have signed
//! - **locks**: conditional payments waiting for a secret, committed to by a
//!   Merkle root (the locksroot)
//!
//! Every message a participant signs carries their whole balance proof
//! (`nonce`, `transferred_amount`, `locksroot`). The receiver replays it
//! against its own copy of the sender's end-state and accepts it only if the
//! nonce is the next one, the locksroot matches and the sender does not
//! spend more than it has.
//!
//! # Architecture
//!
//! - [`Lock`] / [`LockTree`]: hash-time locks and the Merkle tree over them
//! - [`ChannelEndState`]: one participant's ledger half
//! - [`Channel`]: both halves plus timeouts; creates unsigned messages and
//!   registers signed ones
//! - [`ExternalState`]: on-chain address, lifecycle and the
//!   [`ChannelObserver`] notified of revealed secrets
//!
//! Two `Channel` instances modelling the same on-chain channel (one per
//! participant) share nothing. They stay in agreement because both register
//! the same signed messages.
//!
//! # Example: Locked Transfer
//!
//! ```
//! use payledger_channel::{Channel, ChannelEndState, ExternalState, SignedMessage};
//! use payledger_channel::lock::generate_secret;
//! use payledger_crypto::Ed25519Keypair;
//!
//! let alice = Ed25519Keypair::generate();
//! let bob = Ed25519Keypair::generate();
//! let token = [0x70; 32];
//! let address = [0xc0; 32];
//!
//! // Alice's view of the channel: she deposited 100, Bob deposited 50
//! let channel = Channel::new(
//!     ChannelEndState::new(alice.public_key, 100),
//!     ChannelEndState::new(bob.public_key, 50),
//!     ExternalState::new(address, 1),
//!     token,
//!     address,
//!     10,  // reveal timeout
//!     100, // settle timeout
//! )
//! .unwrap();
//!
//! // Lock 30 behind a secret, expiring at block 50
//! let (secret, hashlock) = generate_secret();
//! let transfer = channel
//!     .create_mediated_transfer(alice.public_key, bob.public_key, 0, 30, 1, 50, hashlock)
//!     .unwrap();
//! channel
//!     .register_transfer(1, &SignedMessage::sign(&alice, transfer))
//!     .unwrap();
//!
//! assert_eq!(channel.locked(), 30);
//! assert_eq!(channel.distributable(), 70);
//!
//! // Reveal the secret to settle the lock
//! let reveal = channel.create_secret(2, secret).unwrap();
//! channel
//!     .register_transfer(2, &SignedMessage::sign(&alice, reveal))
//!     .unwrap();
//!
//! assert_eq!(channel.locked(), 0);
//! assert_eq!(channel.balance(), 70);
//! assert_eq!(channel.transfer_amount(), 30);
//! ```

pub mod channel;
pub mod config;
pub mod end_state;
pub mod error;
pub mod external;
pub mod lock;
pub mod messages;
pub mod tree;

/// Participant or contract address: a 32-byte Ed25519 public key.
pub type Address = [u8; 32];

/// SHA256 digest.
pub type Hash = [u8; 32];

pub use channel::{Channel, ChannelSnapshot, Direction, Registration};
pub use config::{ChannelConfig, ExpirationPolicy};
pub use end_state::{ChannelEndState, UnclaimedLock};
pub use error::{LedgerError, LedgerResult};
pub use external::{ChannelLifecycle, ChannelObserver, ExternalState};
pub use lock::Lock;
pub use messages::{
    DirectTransfer, MediatedTransfer, Message, MessageTag, SecretMessage, SignedMessage,
};
pub use tree::{LockTree, EMPTY_HASH};
