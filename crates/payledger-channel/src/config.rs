//! Channel configuration.

use crate::error::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};

/// Default reveal timeout, in blocks.
pub const DEFAULT_REVEAL_TIMEOUT: u64 = 10;

/// Default settle timeout, in blocks.
pub const DEFAULT_SETTLE_TIMEOUT: u64 = 600;

/// Rule applied to the expiration of locks we create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExpirationPolicy {
    /// Require `expiration > block_number + reveal_timeout`, leaving the
    /// payee at least the reveal window to learn and use the secret.
    #[default]
    RevealTimeout,
    /// Accept any expiration.
    Unchecked,
}

impl ExpirationPolicy {
    /// Check a new lock's expiration at `block_number`.
    pub fn check(&self, expiration: u64, block_number: u64, reveal_timeout: u64) -> LedgerResult<()> {
        match self {
            ExpirationPolicy::RevealTimeout => {
                let limit = block_number.saturating_add(reveal_timeout);
                if expiration <= limit {
                    return Err(LedgerError::InvalidLockExpiration { expiration, limit });
                }
                Ok(())
            }
            ExpirationPolicy::Unchecked => Ok(()),
        }
    }
}

/// Timeouts and policies for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Blocks a payee needs to reveal a secret before the lock expires.
    pub reveal_timeout: u64,
    /// Blocks between channel close and settlement.
    pub settle_timeout: u64,
    #[serde(default)]
    pub expiration_policy: ExpirationPolicy,
}

impl ChannelConfig {
    pub fn new(reveal_timeout: u64, settle_timeout: u64) -> Self {
        Self {
            reveal_timeout,
            settle_timeout,
            expiration_policy: ExpirationPolicy::default(),
        }
    }

    /// Set the expiration policy.
    pub fn with_expiration_policy(mut self, policy: ExpirationPolicy) -> Self {
        self.expiration_policy = policy;
        self
    }

    /// Check `0 < reveal_timeout < settle_timeout`.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.reveal_timeout == 0
            || self.settle_timeout == 0
            || self.reveal_timeout >= self.settle_timeout
        {
            return Err(LedgerError::InvalidTimeout {
                reveal_timeout: self.reveal_timeout,
                settle_timeout: self.settle_timeout,
            });
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REVEAL_TIMEOUT, DEFAULT_SETTLE_TIMEOUT)
    }
}
