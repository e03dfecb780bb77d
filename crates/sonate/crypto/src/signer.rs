use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer as _, VerifyingKey};

use crate::error::CryptoError;
use crate::keys::{SigningKeyPair, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};

/// A detached signature in every encoding callers need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureBundle {
    pub bytes: Vec<u8>,
    pub hex: String,
    pub base64: String,
}

impl SignatureBundle {
    fn from_signature(sig: &Signature) -> Self {
        let bytes = sig.to_bytes().to_vec();
        Self {
            hex: hex::encode(&bytes),
            base64: BASE64.encode(&bytes),
            bytes,
        }
    }
}

/// Produces detached signatures over canonical byte messages.
///
/// Implementations may be wrapped by decorators that add side effects
/// (see the audit crate) without changing the signature contract.
pub trait Signer: Send + Sync {
    /// Sign a message. Key unavailability is fatal and propagates.
    fn sign(&self, message: &[u8]) -> Result<SignatureBundle, CryptoError>;

    /// Hex encoding of the public key that verifies this signer's output.
    fn public_key_hex(&self) -> String;

    /// Stable identifier for the signing key.
    fn key_id(&self) -> String;
}

/// The standard Ed25519 signer.
pub struct Ed25519Signer {
    keypair: SigningKeyPair,
}

impl Ed25519Signer {
    pub fn new(keypair: SigningKeyPair) -> Self {
        Self { keypair }
    }

    /// Generate a signer with a fresh random key.
    pub fn generate() -> Self {
        Self::new(SigningKeyPair::generate())
    }

    pub fn keypair(&self) -> &SigningKeyPair {
        &self.keypair
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.keypair.public_key_bytes()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> Result<SignatureBundle, CryptoError> {
        let signature = self.keypair.signing_key().sign(message);
        Ok(SignatureBundle::from_signature(&signature))
    }

    fn public_key_hex(&self) -> String {
        self.keypair.public_key_hex()
    }

    fn key_id(&self) -> String {
        self.keypair.key_id()
    }
}

/// Verify a detached Ed25519 signature. Never panics on malformed input.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; PUBLIC_KEY_SIZE]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_SIZE]>::try_from(signature) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify_strict(message, &signature).is_ok()
}

/// Hex-encoded convenience wrapper around [`verify_signature`].
pub fn verify_signature_hex(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let (Ok(key), Ok(sig)) = (hex::decode(public_key_hex), hex::decode(signature_hex)) else {
        return false;
    };
    verify_signature(&key, message, &sig)
}
