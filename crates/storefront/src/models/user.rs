//! User domain types.

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use emporium_core::{Email, UserId};

/// A storefront account (domain type).
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized login email.
    pub email: Email,
    /// Argon2id PHC string. Never rendered or logged.
    pub password_hash: SecretString,
    /// Outstanding password reset, if a reset flow is in progress.
    pub reset: Option<PasswordReset>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A pending password reset.
///
/// Token and expiry only exist together, which the `Option<PasswordReset>`
/// on [`User`] makes unrepresentable otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    /// Hex-encoded random token sent to the user's inbox.
    pub token: String,
    /// The token is rejected once the current time is past this instant.
    pub expires_at: DateTime<Utc>,
}

impl PasswordReset {
    /// Whether the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_reset_expiry_boundary() {
        let now = Utc::now();
        let reset = PasswordReset {
            token: "t".to_string(),
            expires_at: now,
        };

        assert!(!reset.is_expired_at(now));
        assert!(reset.is_expired_at(now + Duration::milliseconds(1)));
    }

    #[test]
    fn test_user_debug_hides_password_hash() {
        let user = User {
            id: UserId::new(1),
            email: Email::parse("a@b.com").unwrap(),
            password_hash: SecretString::from("$argon2id$v=19$secret-hash"),
            reset: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let debug_output = format!("{user:?}");
        assert!(!debug_output.contains("secret-hash"));
    }
}
