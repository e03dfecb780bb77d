use thiserror::Error;

use crate::ProviderKind;

/// Secrets-related errors.
#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("Secrets provider unavailable: {0}")]
    Unavailable(String),

    #[error("Encryption failed: {0}")]
    EncryptFailed(String),

    #[error("Decryption failed")]
    DecryptFailed,

    #[error("Token was produced by {actual:?}, this provider is {expected:?}")]
    WrongProvider {
        expected: ProviderKind,
        actual: ProviderKind,
    },

    #[error("Unknown key id: {0}")]
    UnknownKey(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Malformed ciphertext token: {0}")]
    InvalidToken(String),
}
