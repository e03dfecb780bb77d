use thiserror::Error;

/// Identity-related errors. Verification failures are not errors; they are
/// reported as structured reasons on the verification result.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Unknown DID: {0}")]
    UnknownDid(String),

    #[error("Invalid DID format: {0}")]
    InvalidDid(String),

    #[error("Signing failed: {0}")]
    Signing(#[from] sonate_crypto::CryptoError),

    #[error("Revocation store error: {0}")]
    Store(#[from] sonate_store::StoreError),
}
