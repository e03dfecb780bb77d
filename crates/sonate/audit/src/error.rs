use thiserror::Error;

/// Audit-related errors.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Invalid audit event: missing {0}")]
    InvalidEvent(&'static str),

    #[error("Unknown retention category: {0}")]
    UnknownCategory(String),

    #[error("Store error: {0}")]
    Store(String),
}
