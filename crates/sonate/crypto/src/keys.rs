use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Ed25519 public key size in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 detached signature size in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 key pair.
///
/// The secret half lives inside `ed25519_dalek::SigningKey`, which zeroizes
/// on drop. Seed material handed to [`SigningKeyPair::from_seed`] is wiped
/// after the key is constructed.
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Reconstruct a key pair from a 32-byte seed.
    pub fn from_seed(mut seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }

    /// Reconstruct a key pair from a hex-encoded seed.
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(seed_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: b.len(),
            })?;
        Ok(Self::from_seed(seed))
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// The secret seed. Only for handing the key to a secrets manager for
    /// protection at rest; never log or serialize this directly.
    pub fn seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public key as raw bytes.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Public key as lowercase hex, the encoding used in DIDs and proofs.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Blake3 fingerprint of the public key, for key references and logs.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"sonate-key-v1:");
        hasher.update(&self.public_key_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Short key identifier derived from the fingerprint.
    pub fn key_id(&self) -> String {
        let fp = self.fingerprint();
        format!("ed25519-{}", hex::encode(&fp[..4]))
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("key_id", &self.key_id())
            .finish_non_exhaustive()
    }
}
