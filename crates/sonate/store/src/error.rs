use thiserror::Error;

/// Store-related errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Nonce already used: {0}")]
    NonceAlreadyUsed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Unavailable(value.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}
