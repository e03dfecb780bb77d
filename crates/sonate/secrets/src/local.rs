//! Local symmetric provider: Argon2id passphrase derivation feeding
//! XChaCha20-Poly1305 with a random nonce prepended to the ciphertext.

use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use zeroize::Zeroize;

use async_trait::async_trait;
use sonate_crypto::constant_time_eq;

use crate::error::SecretsError;
use crate::{CiphertextToken, ProviderKind, SecretsManager};

/// XChaCha20-Poly1305 nonce size (192 bits / 24 bytes).
const NONCE_SIZE: usize = 24;

/// Poly1305 tag size appended to the ciphertext.
const TAG_SIZE: usize = 16;

/// Derived-key size (256 bits).
const KEY_SIZE: usize = 32;

pub struct LocalSecretsProvider {
    cipher: XChaCha20Poly1305,
    key_id: String,
}

impl LocalSecretsProvider {
    /// Derive the cipher key from a passphrase and salt with Argon2id.
    pub fn new(passphrase: &str, salt: &str) -> Result<Self, SecretsError> {
        let mut key = [0u8; KEY_SIZE];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut key)
            .map_err(|e| SecretsError::KeyDerivation(e.to_string()))?;

        let cipher = XChaCha20Poly1305::new((&key).into());

        // Key id is a fingerprint of the derived key, not the key itself.
        let fingerprint = blake3_fingerprint(&key);
        key.zeroize();

        Ok(Self {
            cipher,
            key_id: fingerprint,
        })
    }

    fn check_key_id(&self, token: &CiphertextToken) -> Result<(), SecretsError> {
        if constant_time_eq(token.key_id.as_bytes(), self.key_id.as_bytes()) {
            Ok(())
        } else {
            Err(SecretsError::UnknownKey(token.key_id.clone()))
        }
    }
}

fn blake3_fingerprint(key: &[u8; KEY_SIZE]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"sonate-secrets-key-v1:");
    hasher.update(key);
    hex::encode(&hasher.finalize().as_bytes()[..8])
}

#[async_trait]
impl SecretsManager for LocalSecretsProvider {
    async fn encrypt(
        &self,
        plaintext: &[u8],
        key_id: Option<&str>,
    ) -> Result<CiphertextToken, SecretsError> {
        if let Some(requested) = key_id {
            if requested != self.key_id {
                return Err(SecretsError::UnknownKey(requested.to_string()));
            }
        }

        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| SecretsError::EncryptFailed("cipher failure".into()))?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);

        Ok(CiphertextToken {
            provider: ProviderKind::Local,
            key_id: self.key_id.clone(),
            payload: BASE64.encode(payload),
        })
    }

    async fn decrypt(&self, token: &CiphertextToken) -> Result<Vec<u8>, SecretsError> {
        if token.provider != ProviderKind::Local {
            return Err(SecretsError::WrongProvider {
                expected: ProviderKind::Local,
                actual: token.provider,
            });
        }
        self.check_key_id(token)?;

        let payload = BASE64
            .decode(&token.payload)
            .map_err(|e| SecretsError::InvalidToken(e.to_string()))?;
        if payload.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SecretsError::InvalidToken("payload too short".into()));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretsError::DecryptFailed)
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }
}
