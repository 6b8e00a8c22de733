//! Error taxonomy for the ledger and auth core.
//!
//! Repositories return these typed kinds so callers can branch on the
//! failure class without parsing database error text. Only `Store` is
//! considered retryable.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("product name already exists: {0}")]
    DuplicateName(String),

    #[error("username already exists: {0}")]
    DuplicateUsername(String),

    #[error("invalid or expired credentials")]
    Unauthorized,

    #[error("insufficient role")]
    Forbidden,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(String),
}

impl CoreError {
    /// Transient transport/transaction failures may be retried; every
    /// other kind is a definitive answer.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<sea_orm::DbErr> for CoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Store(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
