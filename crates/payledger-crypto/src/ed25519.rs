//! Ed25519 signing for balance-proof messages.
//!
//! A channel participant's address is its Ed25519 public key, so the same
//! key that signs a transfer identifies the party it came from.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors raised while signing or verifying.
#[derive(Debug, Error)]
pub enum Ed25519Error {
    /// The public key bytes do not decode to a curve point.
    #[error("Invalid key bytes: {0}")]
    InvalidKey(String),

    /// The signature does not match the message and key.
    #[error("Signature verification failed")]
    VerificationFailed,
}

/// An Ed25519 keypair owned by one channel participant.
///
/// The private seed is zeroized on drop.
///
/// # Example
/// ```
/// use payledger_crypto::ed25519::Ed25519Keypair;
///
/// let keypair = Ed25519Keypair::from_private_key([7u8; 32]);
/// let signature = keypair.sign(b"balance proof");
/// assert!(keypair.verify(b"balance proof", &signature).is_ok());
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Ed25519Keypair {
    private_key: [u8; 32],
    /// The participant address.
    #[zeroize(skip)]
    pub public_key: [u8; 32],
    // SigningKey zeroizes itself on drop
    #[zeroize(skip)]
    signing_key: SigningKey,
}

impl Ed25519Keypair {
    /// Generate a fresh keypair from the OS random number generator.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Rebuild a keypair from its 32-byte seed.
    ///
    /// Deterministic, which makes it the constructor of choice in tests.
    pub fn from_private_key(private_key: [u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&private_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        Self {
            private_key: signing_key.to_bytes(),
            public_key: signing_key.verifying_key().to_bytes(),
            signing_key,
        }
    }

    /// Sign `message`, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verify a signature made by this keypair.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), Ed25519Error> {
        verify_signature(&self.public_key, message, signature)
    }

    /// The private seed.
    pub fn private_key_bytes(&self) -> &[u8; 32] {
        &self.private_key
    }
}

impl std::fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Keypair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Verify `signature` over `message` against a bare public key.
///
/// # Errors
/// `InvalidKey` if the key is not a valid point, `VerificationFailed` if the
/// signature does not match.
pub fn verify_signature(
    public_key: &[u8; 32],
    message: &[u8],
    signature: &[u8; 64],
) -> Result<(), Ed25519Error> {
    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| Ed25519Error::InvalidKey(e.to_string()))?;
    let signature = Signature::from_bytes(signature);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| Ed25519Error::VerificationFailed)
}
