use thiserror::Error;

/// Rate-limiter errors. These only surface from administrative operations;
/// `check_limit` converts store failures into a policy decision instead.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for RateLimitError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Unavailable(value.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}
