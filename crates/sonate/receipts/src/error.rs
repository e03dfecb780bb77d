use thiserror::Error;

/// Receipt-chain errors.
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("Receipt nonce replayed for session {0}")]
    NonceReplayed(String),

    #[error("Nonce store error: {0}")]
    Store(String),

    #[error("Signing failed: {0}")]
    Signing(#[from] sonate_crypto::CryptoError),
}

impl From<sonate_store::StoreError> for ReceiptError {
    fn from(value: sonate_store::StoreError) -> Self {
        match value {
            sonate_store::StoreError::NonceAlreadyUsed(nonce) => Self::NonceReplayed(nonce),
            other => Self::Store(other.to_string()),
        }
    }
}
