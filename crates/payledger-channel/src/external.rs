//! On-chain identity and lifecycle of a channel.
//!
//! [`ExternalState`] is what the ledger knows about the world outside it:
//! the channel contract's address, the blocks at which it was opened,
//! closed and settled, and an optional [`ChannelObserver`] that hears about
//! ledger events.

use crate::error::{LedgerError, LedgerResult};
use crate::{Address, Hash};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle of the on-chain channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLifecycle {
    /// Open; transfers may be created and registered.
    Opened,
    /// Closed on-chain, waiting for the settle timeout.
    Closing,
    /// Settled; the ledger is final.
    Settled,
}

impl std::fmt::Display for ChannelLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelLifecycle::Opened => write!(f, "Opened"),
            ChannelLifecycle::Closing => write!(f, "Closing"),
            ChannelLifecycle::Settled => write!(f, "Settled"),
        }
    }
}

/// Receives ledger events.
///
/// Called synchronously while the channel's write lock is held. An
/// implementation must not call back into the same channel.
pub trait ChannelObserver: Send + Sync {
    /// A secret for `hashlock` became known to the channel at `channel`.
    fn secret_revealed(&self, channel: &Address, hashlock: &Hash);
}

/// On-chain state of a channel.
#[derive(Clone)]
pub struct ExternalState {
    channel_address: Address,
    opened_block: u64,
    closed_block: Option<u64>,
    settled_block: Option<u64>,
    observer: Option<Arc<dyn ChannelObserver>>,
}

impl ExternalState {
    /// Create the state of a channel opened at `opened_block`.
    pub fn new(channel_address: Address, opened_block: u64) -> Self {
        Self {
            channel_address,
            opened_block,
            closed_block: None,
            settled_block: None,
            observer: None,
        }
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: Arc<dyn ChannelObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn channel_address(&self) -> Address {
        self.channel_address
    }

    pub fn opened_block(&self) -> u64 {
        self.opened_block
    }

    pub fn closed_block(&self) -> Option<u64> {
        self.closed_block
    }

    pub fn settled_block(&self) -> Option<u64> {
        self.settled_block
    }

    pub fn lifecycle(&self) -> ChannelLifecycle {
        match (self.closed_block, self.settled_block) {
            (_, Some(_)) => ChannelLifecycle::Settled,
            (Some(_), None) => ChannelLifecycle::Closing,
            (None, None) => ChannelLifecycle::Opened,
        }
    }

    /// Record the on-chain close.
    pub fn set_closed(&mut self, block_number: u64) -> LedgerResult<()> {
        if self.lifecycle() != ChannelLifecycle::Opened {
            return Err(LedgerError::InvalidState {
                expected: "Opened",
                actual: self.lifecycle().to_string(),
            });
        }
        self.closed_block = Some(block_number);
        Ok(())
    }

    /// Record the on-chain settlement.
    pub fn set_settled(&mut self, block_number: u64) -> LedgerResult<()> {
        if self.lifecycle() != ChannelLifecycle::Closing {
            return Err(LedgerError::InvalidState {
                expected: "Closing",
                actual: self.lifecycle().to_string(),
            });
        }
        self.settled_block = Some(block_number);
        Ok(())
    }

    pub(crate) fn notify_secret_revealed(&self, hashlock: &Hash) {
        if let Some(observer) = &self.observer {
            observer.secret_revealed(&self.channel_address, hashlock);
        }
    }
}

impl std::fmt::Debug for ExternalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalState")
            .field("channel_address", &hex::encode(self.channel_address))
            .field("opened_block", &self.opened_block)
            .field("closed_block", &self.closed_block)
            .field("settled_block", &self.settled_block)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}
