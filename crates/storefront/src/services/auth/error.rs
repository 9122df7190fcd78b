//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::validation::ValidationErrors;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// One or more form fields failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Invalid credentials (wrong password or unknown email).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("email already exists")]
    EmailAlreadyExists,

    /// Reset token unknown, already used, or past its expiry.
    #[error("invalid or expired reset token")]
    InvalidOrExpiredToken,

    /// No account with this email.
    #[error("user not found")]
    UserNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Session store error.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Whether this error is caused by the request rather than the server.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Repository(_) | Self::Session(_) | Self::PasswordHash
        )
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}
