//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::email::MailError;

/// Errors that can occur during sign-in.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] sharerides_core::EmailError),

    /// The link is malformed, unknown, or already used.
    #[error("invalid sign-in link")]
    InvalidLink,

    /// The link is past its expiry.
    #[error("sign-in link expired")]
    ExpiredLink,

    /// The sign-in email could not be sent.
    #[error("email delivery failed: {0}")]
    Mail(#[from] MailError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
