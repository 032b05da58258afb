//! Two channel instances modelling both sides of one on-chain channel.
//!
//! Every signed message is registered in both instances; the instances share
//! no state, so these tests check that replaying the same messages keeps
//! them mirrored and that tokens are conserved.

use payledger_channel::lock::hash_secret;
use payledger_channel::{
    Channel, ChannelEndState, ChannelObserver, DirectTransfer, ExternalState, LedgerError, Lock,
    MediatedTransfer, SignedMessage, EMPTY_HASH,
};
use parking_lot::Mutex;
use payledger_crypto::{sha256, Ed25519Keypair};
use std::sync::Arc;
use std::thread;

const TOKEN: [u8; 32] = [0x70; 32];
const CHANNEL: [u8; 32] = [0xc0; 32];

struct Pair {
    ch0: Channel,
    ch1: Channel,
    key0: Ed25519Keypair,
    key1: Ed25519Keypair,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn make_pair_channel(
    deposit0: u128,
    deposit1: u128,
    reveal_timeout: u64,
    settle_timeout: u64,
    opened_block: u64,
) -> Pair {
    init_tracing();
    let key0 = Ed25519Keypair::from_private_key([0x10; 32]);
    let key1 = Ed25519Keypair::from_private_key([0x11; 32]);

    let view = |ours: &Ed25519Keypair, our_deposit, partner: &Ed25519Keypair, partner_deposit| {
        Channel::new(
            ChannelEndState::new(ours.public_key, our_deposit),
            ChannelEndState::new(partner.public_key, partner_deposit),
            ExternalState::new(CHANNEL, opened_block),
            TOKEN,
            CHANNEL,
            reveal_timeout,
            settle_timeout,
        )
        .unwrap()
    };

    Pair {
        ch0: view(&key0, deposit0, &key1, deposit1),
        ch1: view(&key1, deposit1, &key0, deposit0),
        key0,
        key1,
    }
}

fn default_pair() -> Pair {
    make_pair_channel(330, 110, 7, 30, 1)
}

/// Secret number `n` and its hashlock.
fn secret(n: u8) -> ([u8; 32], [u8; 32]) {
    let secret = sha256(&[n]);
    (secret, hash_secret(&secret))
}

fn register_both(pair: &Pair, block_number: u64, signed: &SignedMessage) {
    pair.ch0.register_transfer(block_number, signed).unwrap();
    pair.ch1.register_transfer(block_number, signed).unwrap();
}

fn assert_mirror(a: &Channel, b: &Channel) {
    assert_eq!(a.our_state(), b.partner_state());
    assert_eq!(a.partner_state(), b.our_state());

    assert_eq!(a.locked(), b.outstanding());
    assert_eq!(a.outstanding(), b.locked());
    assert_eq!(
        a.our_state().merkle_root(),
        b.partner_state().merkle_root()
    );
}

fn assert_balance(channel: &Channel, balance: u128, outstanding: u128, locked: u128) {
    assert_eq!(channel.balance(), balance);
    assert_eq!(channel.outstanding(), outstanding);
    assert_eq!(channel.locked(), locked);
    assert_eq!(channel.distributable(), balance - locked);
}

fn assert_synced(pair: &Pair) {
    assert_mirror(&pair.ch0, &pair.ch1);
    assert_eq!(
        pair.ch0.contract_balance() + pair.ch1.contract_balance(),
        pair.ch0.balance() + pair.ch1.balance()
    );
    for channel in [&pair.ch0, &pair.ch1] {
        let snapshot = channel.snapshot();
        assert_eq!(snapshot.balance, snapshot.locked + snapshot.distributable);
    }
}

#[test]
fn test_transfer() {
    let pair = default_pair();

    let transfer = pair.ch0.create_direct_transfer(10, 1).unwrap();
    register_both(&pair, 1, &SignedMessage::sign(&pair.key0, transfer));

    assert_balance(&pair.ch0, 320, 0, 0);
    assert_balance(&pair.ch1, 120, 0, 0);
    assert_synced(&pair);
}

#[test]
fn test_nonce_and_transferred_amount_increase() {
    let pair = default_pair();

    for i in 1..=10u64 {
        let transfer = pair.ch0.create_direct_transfer(7, i).unwrap();
        assert_eq!(transfer.nonce, i);
        assert_eq!(transfer.transferred_amount, 7 * i as u128);
        register_both(&pair, 1, &SignedMessage::sign(&pair.key0, transfer));

        assert_eq!(pair.ch0.our_state().nonce(), i);
        assert_eq!(pair.ch1.partner_state().nonce(), i);
        assert_synced(&pair);
    }

    assert_balance(&pair.ch0, 260, 0, 0);
    assert_balance(&pair.ch1, 180, 0, 0);
}

#[test]
fn test_interwoven_transfers() {
    let pair = default_pair();
    let mut pending: Vec<(u128, [u8; 32])> = Vec::new();
    let mut claimed = 0u128;

    for n in 1..=10u8 {
        let amount = n as u128;
        let (secret_n, hashlock) = secret(n);

        let transfer = pair
            .ch0
            .create_mediated_transfer(
                pair.key0.public_key,
                pair.key1.public_key,
                0,
                amount,
                n as u64,
                20,
                hashlock,
            )
            .unwrap();
        register_both(&pair, 1, &SignedMessage::sign(&pair.key0, transfer));
        pending.push((amount, secret_n));

        // Claim the previous lock on every second round
        if n % 2 == 0 {
            let (prev_amount, prev_secret) = pending.remove(pending.len() - 2);
            let reveal = pair.ch0.create_secret(100 + n as u64, prev_secret).unwrap();
            register_both(&pair, 1, &SignedMessage::sign(&pair.key0, reveal));
            claimed += prev_amount;
        }

        let locked: u128 = pending.iter().map(|(amount, _)| amount).sum();
        assert_balance(&pair.ch0, 330 - claimed, 0, locked);
        assert_balance(&pair.ch1, 110 + claimed, locked, 0);
        assert_eq!(pair.ch0.transfer_amount(), claimed);
        assert_synced(&pair);
    }

    // Locks 2, 4, .., 10 are still pending
    assert_eq!(pair.ch0.locked(), 2 + 4 + 6 + 8 + 10);
    assert_eq!(claimed, 1 + 3 + 5 + 7 + 9);
}

#[test]
fn test_register_invalid_transfer() {
    let pair = default_pair();
    let before0 = (pair.ch0.our_state(), pair.ch0.partner_state());
    let before1 = (pair.ch1.our_state(), pair.ch1.partner_state());

    // Hand-built, since create_direct_transfer refuses to overspend
    let transfer = DirectTransfer {
        identifier: 1,
        nonce: 1,
        token: TOKEN,
        channel: CHANNEL,
        transferred_amount: 331,
        recipient: pair.key1.public_key,
        locksroot: EMPTY_HASH,
    };
    let signed = SignedMessage::sign(&pair.key0, transfer);

    for channel in [&pair.ch0, &pair.ch1] {
        match channel.register_transfer(1, &signed) {
            Err(LedgerError::InsufficientBalance { available: 330, required: 331 }) => {}
            other => panic!("Expected InsufficientBalance, got {:?}", other),
        }
    }

    assert_eq!((pair.ch0.our_state(), pair.ch0.partner_state()), before0);
    assert_eq!((pair.ch1.our_state(), pair.ch1.partner_state()), before1);
}

#[test]
fn test_sender_cannot_overspend() {
    let pair = default_pair();
    let (_, hashlock) = secret(1);

    let transfer = pair
        .ch0
        .create_mediated_transfer(pair.key0.public_key, pair.key1.public_key, 0, 330, 1, 20, hashlock)
        .unwrap();
    register_both(&pair, 1, &SignedMessage::sign(&pair.key0, transfer));
    assert_balance(&pair.ch0, 330, 0, 330);

    match pair.ch0.create_direct_transfer(1, 2) {
        Err(LedgerError::InsufficientBalance { available: 0, required: 1 }) => {}
        other => panic!("Expected InsufficientBalance, got {:?}", other),
    }

    // A second lock built by hand is refused by both sides
    let (_, hashlock2) = secret(2);
    let lock = Lock::new(1, hashlock2, 20);
    let our_state = pair.ch0.our_state();
    let lock_transfer = MediatedTransfer {
        identifier: 2,
        nonce: our_state.next_nonce(),
        token: TOKEN,
        channel: CHANNEL,
        transferred_amount: 0,
        recipient: pair.key1.public_key,
        locksroot: our_state.compute_root_with(&lock).unwrap(),
        lock,
        target: pair.key1.public_key,
        initiator: pair.key0.public_key,
        fee: 0,
    };
    let signed = SignedMessage::sign(&pair.key0, lock_transfer);

    for channel in [&pair.ch0, &pair.ch1] {
        match channel.register_transfer(1, &signed) {
            Err(LedgerError::InsufficientBalance { .. }) => {}
            other => panic!("Expected InsufficientBalance, got {:?}", other),
        }
    }
    assert_synced(&pair);
}

#[test]
fn test_receiver_cannot_spend_locked_amount() {
    let pair = default_pair();
    let (secret1, hashlock) = secret(1);

    let transfer = pair
        .ch0
        .create_mediated_transfer(pair.key0.public_key, pair.key1.public_key, 0, 100, 1, 20, hashlock)
        .unwrap();
    register_both(&pair, 1, &SignedMessage::sign(&pair.key0, transfer));

    assert_balance(&pair.ch1, 110, 100, 0);
    match pair.ch1.create_direct_transfer(111, 1) {
        Err(LedgerError::InsufficientBalance { available: 110, required: 111 }) => {}
        other => panic!("Expected InsufficientBalance, got {:?}", other),
    }

    // Knowing the secret is still not enough
    pair.ch1.register_secret(&secret1).unwrap();
    assert!(pair.ch1.create_direct_transfer(111, 1).is_err());

    let reveal = pair.ch0.create_secret(2, secret1).unwrap();
    register_both(&pair, 1, &SignedMessage::sign(&pair.key0, reveal));
    let transfer = pair.ch1.create_direct_transfer(111, 3).unwrap();
    register_both(&pair, 1, &SignedMessage::sign(&pair.key1, transfer));

    assert_balance(&pair.ch1, 99, 0, 0);
    assert_synced(&pair);
}

#[test]
fn test_registered_direct_transfer_cannot_spend_locked_amount() {
    let pair = default_pair();
    let (_, hashlock) = secret(1);

    let transfer = pair
        .ch0
        .create_mediated_transfer(pair.key0.public_key, pair.key1.public_key, 0, 100, 1, 20, hashlock)
        .unwrap();
    register_both(&pair, 1, &SignedMessage::sign(&pair.key0, transfer));
    assert_balance(&pair.ch0, 330, 0, 100);

    // Fits in the deposit, but not next to the 100 still locked
    let our_state = pair.ch0.our_state();
    let overspend = DirectTransfer {
        identifier: 2,
        nonce: our_state.next_nonce(),
        token: TOKEN,
        channel: CHANNEL,
        transferred_amount: 231,
        recipient: pair.key1.public_key,
        locksroot: our_state.merkle_root(),
    };
    let signed = SignedMessage::sign(&pair.key0, overspend.clone());

    let before0 = (pair.ch0.our_state(), pair.ch0.partner_state());
    let before1 = (pair.ch1.our_state(), pair.ch1.partner_state());
    for channel in [&pair.ch0, &pair.ch1] {
        match channel.register_transfer(1, &signed) {
            Err(LedgerError::InsufficientBalance { available: 230, required: 231 }) => {}
            other => panic!("Expected InsufficientBalance, got {:?}", other),
        }
    }
    assert_eq!((pair.ch0.our_state(), pair.ch0.partner_state()), before0);
    assert_eq!((pair.ch1.our_state(), pair.ch1.partner_state()), before1);

    // Everything that is not locked can still go
    let exact = DirectTransfer {
        transferred_amount: 230,
        ..overspend
    };
    register_both(&pair, 1, &SignedMessage::sign(&pair.key0, exact));
    assert_balance(&pair.ch0, 100, 0, 100);
    assert_synced(&pair);
}

#[test]
fn test_channel_must_accept_expired_locks() {
    let pair = make_pair_channel(33, 11, 7, 11, 7);
    let (_, hashlock) = secret(1);

    // Partner locks 1 at block 7, expiring at 18
    let transfer = pair
        .ch1
        .create_mediated_transfer(pair.key1.public_key, pair.key0.public_key, 0, 1, 1, 18, hashlock)
        .unwrap();
    let signed = SignedMessage::sign(&pair.key1, transfer);
    pair.ch1.register_transfer(7, &signed).unwrap();

    // We were offline and only see it at block 19
    let registration = pair.ch0.register_transfer(19, &signed).unwrap();
    assert!(!registration.payable);
    assert_eq!(registration.hashlock, Some(hashlock));

    assert_eq!(pair.ch0.partner_state().nonce(), 1);
    assert_eq!(pair.ch0.outstanding(), 1);
    assert_synced(&pair);
}

#[test]
fn test_out_of_order_messages_rejected() {
    let pair = default_pair();

    let first = SignedMessage::sign(&pair.key0, pair.ch0.create_direct_transfer(10, 1).unwrap());
    pair.ch0.register_transfer(1, &first).unwrap();
    let second = SignedMessage::sign(&pair.key0, pair.ch0.create_direct_transfer(10, 2).unwrap());
    pair.ch0.register_transfer(1, &second).unwrap();

    // ch1 missed the first message
    let before = pair.ch1.partner_state();
    match pair.ch1.register_transfer(1, &second) {
        Err(LedgerError::InvalidNonce { expected: 1, actual: 2 }) => {}
        other => panic!("Expected InvalidNonce, got {:?}", other),
    }
    assert_eq!(pair.ch1.partner_state(), before);

    pair.ch1.register_transfer(1, &first).unwrap();
    pair.ch1.register_transfer(1, &second).unwrap();
    assert_synced(&pair);
}

#[test]
fn test_competing_creations_share_a_nonce() {
    let pair = default_pair();

    let a = SignedMessage::sign(&pair.key0, pair.ch0.create_direct_transfer(10, 1).unwrap());
    let b = SignedMessage::sign(&pair.key0, pair.ch0.create_direct_transfer(20, 2).unwrap());
    assert_eq!(a.message.nonce(), b.message.nonce());

    register_both(&pair, 1, &a);
    for channel in [&pair.ch0, &pair.ch1] {
        assert!(matches!(
            channel.register_transfer(1, &b),
            Err(LedgerError::InvalidNonce { .. })
        ));
    }
    assert_balance(&pair.ch0, 320, 0, 0);
}

#[derive(Default)]
struct SecretLog(Mutex<Vec<[u8; 32]>>);

impl ChannelObserver for SecretLog {
    fn secret_revealed(&self, _channel: &[u8; 32], hashlock: &[u8; 32]) {
        self.0.lock().push(*hashlock);
    }
}

#[test]
fn test_observer_sees_secret_message() {
    let key0 = Ed25519Keypair::from_private_key([0x10; 32]);
    let key1 = Ed25519Keypair::from_private_key([0x11; 32]);
    let log = Arc::new(SecretLog::default());

    let ch1 = Channel::new(
        ChannelEndState::new(key1.public_key, 110),
        ChannelEndState::new(key0.public_key, 330),
        ExternalState::new(CHANNEL, 1).with_observer(log.clone()),
        TOKEN,
        CHANNEL,
        7,
        30,
    )
    .unwrap();
    let pair = default_pair();
    let (secret1, hashlock) = secret(1);

    let transfer = pair
        .ch0
        .create_mediated_transfer(key0.public_key, key1.public_key, 0, 5, 1, 20, hashlock)
        .unwrap();
    let signed = SignedMessage::sign(&key0, transfer);
    pair.ch0.register_transfer(1, &signed).unwrap();
    ch1.register_transfer(1, &signed).unwrap();
    assert!(log.0.lock().is_empty());

    let reveal = SignedMessage::sign(&key0, pair.ch0.create_secret(2, secret1).unwrap());
    pair.ch0.register_transfer(1, &reveal).unwrap();
    ch1.register_transfer(1, &reveal).unwrap();

    assert_eq!(*log.0.lock(), vec![hashlock]);
    assert_eq!(ch1.balance(), 115);
}

#[test]
fn test_concurrent_readers_see_consistent_views() {
    let pair = Arc::new(default_pair());
    let writer_pair = Arc::clone(&pair);

    let writer = thread::spawn(move || {
        for n in 1..=20u8 {
            let (secret_n, hashlock) = secret(n);
            let p = &writer_pair;
            let transfer = p
                .ch0
                .create_mediated_transfer(p.key0.public_key, p.key1.public_key, 0, 3, n as u64, 20, hashlock)
                .unwrap();
            p.ch0
                .register_transfer(1, &SignedMessage::sign(&p.key0, transfer))
                .unwrap();
            let reveal = p.ch0.create_secret(n as u64, secret_n).unwrap();
            p.ch0
                .register_transfer(1, &SignedMessage::sign(&p.key0, reveal))
                .unwrap();
        }
    });

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let pair = Arc::clone(&pair);
            thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = pair.ch0.snapshot();
                    assert_eq!(snapshot.balance, snapshot.locked + snapshot.distributable);
                    assert_eq!(snapshot.balance + snapshot.transfer_amount, 330);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(pair.ch0.transfer_amount(), 60);
    assert_eq!(pair.ch0.next_nonce(), 41);
}
