//! Two-party channel orchestration.
//!
//! A [`Channel`] is one participant's view of a channel: our end-state, the
//! partner's end-state, the on-chain [`ExternalState`] and the timeouts.
//!
//! # Flow
//!
//! 1. `create_*` builds an unsigned message from our current state. Nothing
//!    changes; the nonce is not reserved.
//! 2. The caller signs it into a [`SignedMessage`].
//! 3. [`Channel::register_transfer`] verifies the signer, validates the
//!    message against both end-states and applies it to the signer's side.
//!
//! Our own messages go through step 3 exactly like the partner's, which is
//! how our side of the ledger advances. The partner's copy of the channel
//! stays consistent only by registering the same signed messages.
//!
//! # Locking
//!
//! All state sits behind one `parking_lot::RwLock`. Registration and other
//! mutations hold the write lock for their whole check-then-apply sequence;
//! views and message creation take the read lock.

use crate::config::ChannelConfig;
use crate::end_state::ChannelEndState;
use crate::error::{LedgerError, LedgerResult};
use crate::external::{ChannelLifecycle, ExternalState};
use crate::lock::{hash_secret, Lock};
use crate::messages::{DirectTransfer, MediatedTransfer, Message, SecretMessage, SignedMessage};
use crate::{Address, Hash};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

/// Who signed a registered message, from our point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// We signed it; our end-state advanced.
    Outgoing,
    /// The partner signed it; their end-state advanced.
    Incoming,
}

/// Outcome of an accepted [`Channel::register_transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub sender: Address,
    pub direction: Direction,
    /// Hashlock added or settled by the message.
    pub hashlock: Option<Hash>,
    /// False when the registered lock had already expired. Such a lock is
    /// kept for ordering but must not be forwarded or paid.
    pub payable: bool,
}

/// Every view of the channel, read under a single lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub contract_balance: u128,
    pub balance: u128,
    pub transfer_amount: u128,
    pub distributable: u128,
    pub locked: u128,
    pub outstanding: u128,
    pub next_nonce: u64,
}

struct ChannelInner {
    our_state: ChannelEndState,
    partner_state: ChannelEndState,
    external: ExternalState,
    block_number: u64,
}

impl ChannelInner {
    fn snapshot(&self) -> ChannelSnapshot {
        let our = &self.our_state;
        let partner = &self.partner_state;
        ChannelSnapshot {
            contract_balance: our.contract_balance(),
            balance: our.balance(partner),
            transfer_amount: our.transferred_amount(),
            distributable: our.distributable(partner),
            locked: our.amount_locked(),
            outstanding: partner.amount_locked(),
            next_nonce: our.next_nonce(),
        }
    }

    fn ensure_open(&self) -> LedgerResult<()> {
        match self.external.lifecycle() {
            ChannelLifecycle::Opened => Ok(()),
            other => Err(LedgerError::InvalidState {
                expected: "Opened",
                actual: other.to_string(),
            }),
        }
    }

    fn check_amount(&self, amount: u128) -> LedgerResult<()> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let distributable = self.our_state.distributable(&self.partner_state);
        if amount > distributable {
            return Err(LedgerError::InsufficientBalance {
                available: distributable,
                required: amount,
            });
        }
        Ok(())
    }
}

/// One participant's view of a two-party payment channel.
pub struct Channel {
    token_address: Address,
    channel_address: Address,
    config: ChannelConfig,
    inner: RwLock<ChannelInner>,
}

impl Channel {
    /// Create a channel with the default expiration policy.
    ///
    /// # Errors
    /// `InvalidTimeout` unless `0 < reveal_timeout < settle_timeout`;
    /// `ChannelMismatch` if `external` belongs to another channel.
    pub fn new(
        our_state: ChannelEndState,
        partner_state: ChannelEndState,
        external: ExternalState,
        token_address: Address,
        channel_address: Address,
        reveal_timeout: u64,
        settle_timeout: u64,
    ) -> LedgerResult<Self> {
        Self::from_config(
            our_state,
            partner_state,
            external,
            token_address,
            channel_address,
            ChannelConfig::new(reveal_timeout, settle_timeout),
        )
    }

    /// Create a channel from a full configuration.
    pub fn from_config(
        our_state: ChannelEndState,
        partner_state: ChannelEndState,
        external: ExternalState,
        token_address: Address,
        channel_address: Address,
        config: ChannelConfig,
    ) -> LedgerResult<Self> {
        config.validate()?;
        if external.channel_address() != channel_address {
            return Err(LedgerError::ChannelMismatch {
                expected: channel_address,
                actual: external.channel_address(),
            });
        }

        let block_number = external.opened_block();
        Ok(Self {
            token_address,
            channel_address,
            config,
            inner: RwLock::new(ChannelInner {
                our_state,
                partner_state,
                external,
                block_number,
            }),
        })
    }

    pub fn token_address(&self) -> Address {
        self.token_address
    }

    pub fn channel_address(&self) -> Address {
        self.channel_address
    }

    pub fn reveal_timeout(&self) -> u64 {
        self.config.reveal_timeout
    }

    pub fn settle_timeout(&self) -> u64 {
        self.config.settle_timeout
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn our_address(&self) -> Address {
        self.inner.read().our_state.address()
    }

    pub fn partner_address(&self) -> Address {
        self.inner.read().partner_state.address()
    }

    /// Our on-chain deposit.
    pub fn contract_balance(&self) -> u128 {
        self.inner.read().our_state.contract_balance()
    }

    /// Settled value we hold.
    pub fn balance(&self) -> u128 {
        let inner = self.inner.read();
        inner.our_state.balance(&inner.partner_state)
    }

    /// Total value we have sent.
    pub fn transfer_amount(&self) -> u128 {
        self.inner.read().our_state.transferred_amount()
    }

    /// Value we may still send or lock.
    pub fn distributable(&self) -> u128 {
        let inner = self.inner.read();
        inner.our_state.distributable(&inner.partner_state)
    }

    /// Value we have locked that the partner may claim.
    pub fn locked(&self) -> u128 {
        self.inner.read().our_state.amount_locked()
    }

    /// Value the partner has locked that we may claim.
    pub fn outstanding(&self) -> u128 {
        self.inner.read().partner_state.amount_locked()
    }

    pub fn next_nonce(&self) -> u64 {
        self.inner.read().our_state.next_nonce()
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        self.inner.read().snapshot()
    }

    /// Copy of our end-state.
    pub fn our_state(&self) -> ChannelEndState {
        self.inner.read().our_state.clone()
    }

    /// Copy of the partner's end-state.
    pub fn partner_state(&self) -> ChannelEndState {
        self.inner.read().partner_state.clone()
    }

    pub fn lifecycle(&self) -> ChannelLifecycle {
        self.inner.read().external.lifecycle()
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle() == ChannelLifecycle::Opened
    }

    pub fn block_number(&self) -> u64 {
        self.inner.read().block_number
    }

    /// Update the chain height used when creating locks.
    pub fn set_block_number(&self, block_number: u64) {
        self.inner.write().block_number = block_number;
    }

    /// Record a deposit observed on-chain for `participant`.
    pub fn update_contract_balance(&self, participant: Address, balance: u128) -> LedgerResult<()> {
        let mut inner = self.inner.write();
        let state = if inner.our_state.address() == participant {
            &mut inner.our_state
        } else if inner.partner_state.address() == participant {
            &mut inner.partner_state
        } else {
            return Err(LedgerError::NotParticipant {
                address: participant,
            });
        };
        state.update_contract_balance(balance)?;
        debug!(
            "Contract balance of {} updated to {}",
            hex::encode(&participant[..8]),
            balance
        );
        Ok(())
    }

    /// Record the on-chain close. Registration stops being accepted.
    pub fn set_closed(&self, block_number: u64) -> LedgerResult<()> {
        self.inner.write().external.set_closed(block_number)
    }

    /// Record the on-chain settlement.
    pub fn set_settled(&self, block_number: u64) -> LedgerResult<()> {
        self.inner.write().external.set_settled(block_number)
    }

    /// Build an unsigned direct transfer of `amount` to the partner.
    pub fn create_direct_transfer(&self, amount: u128, identifier: u64) -> LedgerResult<DirectTransfer> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner.check_amount(amount)?;

        let our = &inner.our_state;
        let transfer = DirectTransfer {
            identifier,
            nonce: our.next_nonce(),
            token: self.token_address,
            channel: self.channel_address,
            transferred_amount: our.transferred_amount().saturating_add(amount),
            recipient: inner.partner_state.address(),
            locksroot: our.merkle_root(),
        };
        trace!(
            "Created direct transfer nonce={} amount={}",
            transfer.nonce,
            amount
        );
        Ok(transfer)
    }

    /// Build an unsigned mediated transfer locking `amount` under `hashlock`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_mediated_transfer(
        &self,
        initiator: Address,
        target: Address,
        fee: u128,
        amount: u128,
        identifier: u64,
        expiration: u64,
        hashlock: Hash,
    ) -> LedgerResult<MediatedTransfer> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        inner.check_amount(amount)?;
        self.config.expiration_policy.check(
            expiration,
            inner.block_number,
            self.config.reveal_timeout,
        )?;
        self.check_expiration_limit(expiration, inner.block_number)?;

        let our = &inner.our_state;
        let lock = Lock::new(amount, hashlock, expiration);
        if our.is_known(&hashlock) {
            return Err(LedgerError::DuplicateLock {
                lock_hash: lock.lock_hash(),
            });
        }

        let transfer = MediatedTransfer {
            identifier,
            nonce: our.next_nonce(),
            token: self.token_address,
            channel: self.channel_address,
            transferred_amount: our.transferred_amount(),
            recipient: inner.partner_state.address(),
            locksroot: our.compute_root_with(&lock)?,
            lock,
            target,
            initiator,
            fee,
        };
        trace!(
            "Created mediated transfer nonce={} amount={} hashlock={}",
            transfer.nonce,
            amount,
            hex::encode(&hashlock[..8])
        );
        Ok(transfer)
    }

    /// Build an unsigned secret message releasing one of our locks.
    pub fn create_secret(&self, identifier: u64, secret: [u8; 32]) -> LedgerResult<SecretMessage> {
        let inner = self.inner.read();
        inner.ensure_open()?;

        let our = &inner.our_state;
        let hashlock = hash_secret(&secret);
        let lock = *our
            .get_lock(&hashlock)
            .ok_or(LedgerError::NoMatchingLock { hashlock })?;

        let message = SecretMessage {
            identifier,
            nonce: our.next_nonce(),
            channel: self.channel_address,
            transferred_amount: our.transferred_amount().saturating_add(lock.amount),
            locksroot: our.compute_root_without(&lock)?,
            secret,
        };
        trace!(
            "Created secret message nonce={} hashlock={}",
            message.nonce,
            hex::encode(&hashlock[..8])
        );
        Ok(message)
    }

    /// Validate a signed message and apply it to the signer's end-state.
    ///
    /// This is the only way either end-state's balance proof advances. On
    /// error nothing has changed.
    pub fn register_transfer(
        &self,
        block_number: u64,
        signed: &SignedMessage,
    ) -> LedgerResult<Registration> {
        let sender = signed.recover_sender()?;

        let mut guard = self.inner.write();
        let result = self.apply_registration(&mut guard, block_number, sender, &signed.message);
        match &result {
            Ok(registration) => debug!(
                "Registered {} nonce={} transferred={} locksroot={} from {} ({:?})",
                signed.message.tag(),
                signed.message.nonce(),
                signed.message.transferred_amount(),
                hex::encode(&signed.message.locksroot()[..8]),
                hex::encode(&sender[..8]),
                registration.direction
            ),
            Err(e) => trace!(
                "Rejected {} nonce={} from {}: {}",
                signed.message.tag(),
                signed.message.nonce(),
                hex::encode(&sender[..8]),
                e
            ),
        }
        result
    }

    fn apply_registration(
        &self,
        inner: &mut ChannelInner,
        block_number: u64,
        sender: Address,
        message: &Message,
    ) -> LedgerResult<Registration> {
        inner.ensure_open()?;

        let ChannelInner {
            our_state,
            partner_state,
            external,
            ..
        } = inner;
        let (from, to, direction) = if sender == our_state.address() {
            (our_state, &*partner_state, Direction::Outgoing)
        } else if sender == partner_state.address() {
            (partner_state, &*our_state, Direction::Incoming)
        } else {
            return Err(LedgerError::InvalidSender { sender });
        };

        if message.channel() != self.channel_address {
            return Err(LedgerError::ChannelMismatch {
                expected: self.channel_address,
                actual: message.channel(),
            });
        }

        let mut registration = Registration {
            sender,
            direction,
            hashlock: None,
            payable: true,
        };

        match message {
            Message::Direct(transfer) => {
                self.check_envelope(&transfer.token, &transfer.recipient, to)?;
                from.register_direct_transfer(transfer, to)?;
            }
            Message::Mediated(transfer) => {
                self.check_envelope(&transfer.token, &transfer.recipient, to)?;
                let lock = transfer.lock;
                self.check_expiration_limit(lock.expiration, block_number)?;
                from.register_locked_transfer(transfer, to)?;

                registration.hashlock = Some(lock.hashlock);
                if lock.is_expired(block_number) {
                    warn!(
                        "Accepted expired lock {} (expiration {}, block {})",
                        hex::encode(&lock.hashlock[..8]),
                        lock.expiration,
                        block_number
                    );
                    registration.payable = false;
                }
            }
            Message::Secret(secret) => {
                let hashlock = secret.hashlock();
                if !from.is_known(&hashlock) {
                    // Only the payer of a lock can sign the proof that releases it
                    if to.is_known(&hashlock) {
                        return Err(LedgerError::InvalidSender { sender });
                    }
                    return Err(LedgerError::NoMatchingLock { hashlock });
                }
                let newly_revealed = from.is_locked(&hashlock);
                from.register_secret_message(secret)?;

                registration.hashlock = Some(hashlock);
                if newly_revealed {
                    external.notify_secret_revealed(&hashlock);
                }
            }
        }

        Ok(registration)
    }

    /// A lock must not outlive the settlement window of `block_number`.
    fn check_expiration_limit(&self, expiration: u64, block_number: u64) -> LedgerResult<()> {
        let limit = block_number.saturating_add(self.config.settle_timeout);
        if expiration > limit {
            return Err(LedgerError::InvalidLockExpiration { expiration, limit });
        }
        Ok(())
    }

    fn check_envelope(
        &self,
        token: &Address,
        recipient: &Address,
        to: &ChannelEndState,
    ) -> LedgerResult<()> {
        if *token != self.token_address {
            return Err(LedgerError::TokenMismatch {
                expected: self.token_address,
                actual: *token,
            });
        }
        if *recipient != to.address() {
            return Err(LedgerError::InvalidRecipient {
                expected: to.address(),
                actual: *recipient,
            });
        }
        Ok(())
    }

    /// Record a secret learned off-band, in every end-state that holds its lock.
    ///
    /// No value moves. The observer is told once per newly revealed lock.
    pub fn register_secret(&self, secret: &[u8; 32]) -> LedgerResult<()> {
        let hashlock = hash_secret(secret);
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let mut known = false;
        let mut revealed = false;
        for state in [&mut inner.our_state, &mut inner.partner_state] {
            if state.is_known(&hashlock) {
                known = true;
                revealed |= state.register_secret(secret)?;
            }
        }
        if !known {
            return Err(LedgerError::NoMatchingLock { hashlock });
        }

        if revealed {
            debug!("Secret registered for {}", hex::encode(&hashlock[..8]));
            inner.external.notify_secret_revealed(&hashlock);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Channel")
            .field("channel_address", &hex::encode(self.channel_address))
            .field("lifecycle", &inner.external.lifecycle())
            .field("our_nonce", &inner.our_state.nonce())
            .field("partner_nonce", &inner.partner_state.nonce())
            .field("snapshot", &inner.snapshot())
            .finish()
    }
}
