//! Balance-proof messages exchanged between channel participants.
//!
//! Every message carries the sender's full balance proof for the channel:
//! `nonce`, `transferred_amount` and `locksroot`. The channel feeds signed
//! messages into [`Channel::register_transfer`](crate::Channel::register_transfer),
//! which dispatches on [`Message`] by kind.
//!
//! # Message Types
//!
//! - **DirectTransfer**: raises `transferred_amount`, no locks involved
//! - **MediatedTransfer**: adds a [`Lock`] to the sender's lock tree
//! - **SecretMessage**: reveals a secret, removing its lock and settling its value
//!
//! Wire encoding is left to the transport layer. [`Message::serialize`]
//! only produces the deterministic payload that gets signed.

use crate::error::{LedgerError, LedgerResult};
use crate::lock::{hash_secret, Lock};
use crate::{Address, Hash};
use payledger_crypto::{verify_signature, Ed25519Keypair};
use serde::{Deserialize, Serialize};

/// Discriminant written in front of every signing payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    /// Secret reveal with balance proof.
    Secret = 0x04,
    /// Direct transfer.
    DirectTransfer = 0x05,
    /// Mediated (locked) transfer.
    MediatedTransfer = 0x07,
}

impl MessageTag {
    /// Convert from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x04 => Some(MessageTag::Secret),
            0x05 => Some(MessageTag::DirectTransfer),
            0x07 => Some(MessageTag::MediatedTransfer),
            _ => None,
        }
    }
}

/// Unconditional transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectTransfer {
    pub identifier: u64,
    pub nonce: u64,
    pub token: Address,
    pub channel: Address,
    /// Total amount ever sent by the signer, not the delta.
    pub transferred_amount: u128,
    pub recipient: Address,
    pub locksroot: Hash,
}

impl DirectTransfer {
    fn write_payload(&self, data: &mut Vec<u8>) {
        data.extend_from_slice(&self.identifier.to_be_bytes());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        data.extend_from_slice(&self.token);
        data.extend_from_slice(&self.channel);
        data.extend_from_slice(&self.transferred_amount.to_be_bytes());
        data.extend_from_slice(&self.recipient);
        data.extend_from_slice(&self.locksroot);
    }
}

/// Transfer conditioned on a hashlock.
///
/// `transferred_amount` is normally unchanged; the locked value only counts
/// as transferred once the matching [`SecretMessage`] is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediatedTransfer {
    pub identifier: u64,
    pub nonce: u64,
    pub token: Address,
    pub channel: Address,
    pub transferred_amount: u128,
    pub recipient: Address,
    /// Root of the sender's lock tree including `lock`.
    pub locksroot: Hash,
    pub lock: Lock,
    /// Final payee of the mediated payment.
    pub target: Address,
    /// Payer that started the mediated payment.
    pub initiator: Address,
    pub fee: u128,
}

impl MediatedTransfer {
    fn write_payload(&self, data: &mut Vec<u8>) {
        data.extend_from_slice(&self.identifier.to_be_bytes());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        data.extend_from_slice(&self.token);
        data.extend_from_slice(&self.channel);
        data.extend_from_slice(&self.transferred_amount.to_be_bytes());
        data.extend_from_slice(&self.recipient);
        data.extend_from_slice(&self.locksroot);
        data.extend_from_slice(&self.lock.as_bytes());
        data.extend_from_slice(&self.target);
        data.extend_from_slice(&self.initiator);
        data.extend_from_slice(&self.fee.to_be_bytes());
    }
}

/// Secret reveal that unlocks one of the signer's locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMessage {
    pub identifier: u64,
    pub nonce: u64,
    pub channel: Address,
    /// Previous transferred amount plus the unlocked lock's amount.
    pub transferred_amount: u128,
    /// Root of the sender's lock tree with the lock removed.
    pub locksroot: Hash,
    pub secret: [u8; 32],
}

impl SecretMessage {
    /// Hashlock the carried secret opens.
    pub fn hashlock(&self) -> Hash {
        hash_secret(&self.secret)
    }

    fn write_payload(&self, data: &mut Vec<u8>) {
        data.extend_from_slice(&self.identifier.to_be_bytes());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        data.extend_from_slice(&self.channel);
        data.extend_from_slice(&self.transferred_amount.to_be_bytes());
        data.extend_from_slice(&self.locksroot);
        data.extend_from_slice(&self.secret);
    }
}

/// Any message that carries a balance proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Direct(DirectTransfer),
    Mediated(MediatedTransfer),
    Secret(SecretMessage),
}

impl Message {
    pub fn tag(&self) -> MessageTag {
        match self {
            Message::Direct(_) => MessageTag::DirectTransfer,
            Message::Mediated(_) => MessageTag::MediatedTransfer,
            Message::Secret(_) => MessageTag::Secret,
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Message::Direct(m) => m.nonce,
            Message::Mediated(m) => m.nonce,
            Message::Secret(m) => m.nonce,
        }
    }

    pub fn channel(&self) -> Address {
        match self {
            Message::Direct(m) => m.channel,
            Message::Mediated(m) => m.channel,
            Message::Secret(m) => m.channel,
        }
    }

    pub fn transferred_amount(&self) -> u128 {
        match self {
            Message::Direct(m) => m.transferred_amount,
            Message::Mediated(m) => m.transferred_amount,
            Message::Secret(m) => m.transferred_amount,
        }
    }

    pub fn locksroot(&self) -> Hash {
        match self {
            Message::Direct(m) => m.locksroot,
            Message::Mediated(m) => m.locksroot,
            Message::Secret(m) => m.locksroot,
        }
    }

    /// Deterministic signing payload: tag byte, then fields big-endian.
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(256);
        data.push(self.tag() as u8);
        match self {
            Message::Direct(m) => m.write_payload(&mut data),
            Message::Mediated(m) => m.write_payload(&mut data),
            Message::Secret(m) => m.write_payload(&mut data),
        }
        data
    }
}

impl From<DirectTransfer> for Message {
    fn from(m: DirectTransfer) -> Self {
        Message::Direct(m)
    }
}

impl From<MediatedTransfer> for Message {
    fn from(m: MediatedTransfer) -> Self {
        Message::Mediated(m)
    }
}

impl From<SecretMessage> for Message {
    fn from(m: SecretMessage) -> Self {
        Message::Secret(m)
    }
}

impl std::fmt::Display for MessageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageTag::Secret => write!(f, "Secret"),
            MessageTag::DirectTransfer => write!(f, "DirectTransfer"),
            MessageTag::MediatedTransfer => write!(f, "MediatedTransfer"),
        }
    }
}

/// A message together with its signer and Ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub message: Message,
    /// Claimed signer. Only trusted after [`recover_sender`](Self::recover_sender).
    pub sender: Address,
    pub signature: [u8; 64],
}

impl SignedMessage {
    /// Sign a message.
    pub fn sign(keypair: &Ed25519Keypair, message: impl Into<Message>) -> Self {
        let message = message.into();
        let signature = keypair.sign(&message.serialize());
        Self {
            message,
            sender: keypair.public_key,
            signature,
        }
    }

    /// Verify the signature and return the signer's address.
    pub fn recover_sender(&self) -> LedgerResult<Address> {
        verify_signature(&self.sender, &self.message.serialize(), &self.signature)
            .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;
        Ok(self.sender)
    }
}
