//! Authentication service.
//!
//! Password signup and login, session lifecycle, and the password reset
//! token flow. The service only touches the `auth` session key; CSRF and
//! flash state belong to the middleware.

mod error;

pub use error::AuthError;

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use secrecy::ExposeSecret;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::UserId;

use crate::db::{RepositoryError, UserStore};
use crate::models::{PasswordReset, SessionAuth, User, session_keys};
use crate::services::validation::{self, Field, ValidationErrors};

/// How long a password reset link stays valid.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// Random bytes in a reset token (hex-encoded to twice as many characters).
const RESET_TOKEN_BYTES: usize = 32;

/// Hash verified for unknown emails so they take as long as wrong passwords.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("emporium-timing-equalizer").unwrap_or_default());

/// A freshly issued reset token, ready to be mailed.
#[derive(Debug, Clone)]
pub struct IssuedResetToken {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: &'a dyn UserStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserStore) -> Self {
        Self { users }
    }

    /// Log in with email and password.
    ///
    /// On success the session id is rotated and the logged-in state is saved
    /// to the store before this returns.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed email or empty password.
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        session: &Session,
        email: &str,
        password: &str,
    ) -> Result<SessionAuth, AuthError> {
        let mut errors = ValidationErrors::new();
        let email = validation::check_email(&mut errors, email, "Please enter a valid Email!");
        let password = password.trim();
        if password.is_empty() {
            errors.push(Field::Password, "Please enter the password you used to SignUp!");
        }
        let Some(email) = email.filter(|_| errors.is_empty()) else {
            return Err(AuthError::Validation(errors));
        };

        let user = self.users.find_user_by_email(&email).await?;
        let stored_hash = user
            .as_ref()
            .map_or_else(|| DUMMY_HASH.clone(), |u| u.password_hash.expose_secret().to_owned());

        let matches = verify_password_blocking(password.to_owned(), stored_hash).await?;
        let user = match user {
            Some(user) if matches => user,
            _ => {
                tracing::info!("login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let auth = SessionAuth::logged_in(user.id);
        session.cycle_id().await?;
        session.insert(session_keys::AUTH, auth).await?;
        session.save().await?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(auth)
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` listing every invalid field (a taken
    /// email is one of them when other fields are also wrong).
    /// Returns `AuthError::EmailAlreadyExists` if only the email is a problem.
    #[instrument(skip_all)]
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User, AuthError> {
        let mut errors = ValidationErrors::new();
        let email = validation::check_email(&mut errors, email, "Please enter a valid email.");
        validation::check_new_password(&mut errors, password);
        validation::check_confirmation(&mut errors, password, confirm_password);

        if let Some(email) = &email
            && self.users.find_user_by_email(email).await?.is_some()
        {
            if errors.is_empty() {
                return Err(AuthError::EmailAlreadyExists);
            }
            errors.push(Field::Email, "E-mail already exists!");
        }

        let Some(email) = email.filter(|_| errors.is_empty()) else {
            return Err(AuthError::Validation(errors));
        };

        let password_hash = hash_password_blocking(password.trim().to_owned()).await?;
        let user = self
            .users
            .create_user(&email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "user signed up");
        Ok(user)
    }

    /// Destroy the session. Calling this on an empty or already destroyed
    /// session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the store delete fails.
    pub async fn logout(&self, session: &Session) -> Result<(), AuthError> {
        session.flush().await?;
        Ok(())
    }

    /// Issue a reset token for the account with `email`, replacing any
    /// earlier token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account matches.
    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<IssuedResetToken, AuthError> {
        let Ok(email) = emporium_core::Email::parse(email) else {
            return Err(AuthError::UserNotFound);
        };
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let reset = PasswordReset {
            token: generate_reset_token(),
            expires_at: Utc::now() + RESET_TOKEN_TTL,
        };
        self.users.set_reset_token(user.id, &reset).await?;

        tracing::info!(user_id = %user.id, "password reset requested");
        Ok(IssuedResetToken {
            user,
            token: reset.token,
            expires_at: reset.expires_at,
        })
    }

    /// Look up the user a reset token belongs to. An expired token is
    /// cleared when it is found.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidOrExpiredToken` if the token is unknown or
    /// expired.
    pub async fn validate_reset_token(&self, token: &str) -> Result<User, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        let user = self
            .users
            .find_user_by_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let expired = user
            .reset
            .as_ref()
            .is_none_or(|r| r.is_expired_at(Utc::now()));
        if expired {
            self.users.clear_reset_token(user.id).await?;
            return Err(AuthError::InvalidOrExpiredToken);
        }

        Ok(user)
    }

    /// Set a new password using a reset token. The token is consumed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the password breaks the signup rule.
    /// Returns `AuthError::InvalidOrExpiredToken` if the token does not match
    /// `user_id`, was already used, or has expired.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn complete_reset(
        &self,
        token: &str,
        new_password: &str,
        user_id: UserId,
    ) -> Result<(), AuthError> {
        let mut errors = ValidationErrors::new();
        validation::check_new_password(&mut errors, new_password);
        errors.into_result(())?;

        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let password_hash = hash_password_blocking(new_password.trim().to_owned()).await?;
        let updated = self
            .users
            .complete_password_reset(user_id, token, &password_hash, Utc::now())
            .await?;
        if !updated {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        tracing::info!("password reset completed");
        Ok(())
    }
}

/// Generate a hex-encoded reset token.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a PHC hash string.
fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|_| AuthError::PasswordHash)?
}

async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|_| AuthError::PasswordHash)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::db::InMemoryDatabase;

    fn new_session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);

        let user = auth.signup("a@b.com", "abc12", "abc12").await.unwrap();
        assert_eq!(user.email.as_str(), "a@b.com");
        assert!(user.reset.is_none());

        let session = new_session();
        let state = auth.login(&session, "A@B.com", "abc12").await.unwrap();
        assert!(state.is_logged_in);
        assert_eq!(state.user_id, Some(user.id));

        let stored: Option<SessionAuth> = session.get(session_keys::AUTH).await.unwrap();
        assert_eq!(stored, Some(state));
        assert!(session.id().is_some());
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        auth.signup("a@b.com", "abc12", "abc12").await.unwrap();

        let err = auth.signup("a@b.com", "other1", "other1").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyExists));
        assert_eq!(db.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_with_other_errors() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        auth.signup("a@b.com", "abc12", "abc12").await.unwrap();

        let err = auth.signup("a@b.com", "abc12", "xyz").await.unwrap_err();
        let AuthError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.has(Field::Email));
        assert!(errors.has(Field::ConfirmPassword));
    }

    #[tokio::test]
    async fn test_signup_mismatch_creates_nothing() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);

        let err = auth.signup("a@b.com", "abc12", "xyz").await.unwrap_err();
        let AuthError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.to_string().contains("match"));
        assert_eq!(db.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_login_errors_are_indistinguishable() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        auth.signup("a@b.com", "abc12", "abc12").await.unwrap();

        let wrong_password = auth
            .login(&new_session(), "a@b.com", "wrong1")
            .await
            .unwrap_err();
        let unknown_email = auth
            .login(&new_session(), "nobody@b.com", "abc12")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_validation() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);

        let err = auth.login(&new_session(), "bad", "").await.unwrap_err();
        let AuthError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.has(Field::Email));
        assert!(errors.has(Field::Password));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        auth.signup("a@b.com", "abc12", "abc12").await.unwrap();

        let session = new_session();
        auth.login(&session, "a@b.com", "abc12").await.unwrap();

        auth.logout(&session).await.unwrap();
        auth.logout(&session).await.unwrap();
        let stored: Option<SessionAuth> = session.get(session_keys::AUTH).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_reset_token_lifecycle() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        let user = auth.signup("a@b.com", "abc12", "abc12").await.unwrap();

        let issued = auth.request_password_reset("a@b.com").await.unwrap();
        assert_eq!(issued.token.len(), RESET_TOKEN_BYTES * 2);
        assert_eq!(issued.user.id, user.id);

        let found = auth.validate_reset_token(&issued.token).await.unwrap();
        assert_eq!(found.id, user.id);

        auth.complete_reset(&issued.token, "newpw1", user.id)
            .await
            .unwrap();
        let again = auth
            .complete_reset(&issued.token, "newpw2", user.id)
            .await
            .unwrap_err();
        assert!(matches!(again, AuthError::InvalidOrExpiredToken));

        auth.login(&new_session(), "a@b.com", "newpw1").await.unwrap();
        let old = auth
            .login(&new_session(), "a@b.com", "abc12")
            .await
            .unwrap_err();
        assert!(matches!(old, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_and_cleared() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        let user = auth.signup("a@b.com", "abc12", "abc12").await.unwrap();
        let issued = auth.request_password_reset("a@b.com").await.unwrap();

        let backdated = PasswordReset {
            token: issued.token.clone(),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        db.set_reset_token(user.id, &backdated).await.unwrap();

        let err = auth.validate_reset_token(&issued.token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
        assert!(db.find_user_by_id(user.id).await.unwrap().unwrap().reset.is_none());
    }

    #[tokio::test]
    async fn test_complete_reset_rejects_expired_token() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        let user = auth.signup("a@b.com", "abc12", "abc12").await.unwrap();

        let reset = PasswordReset {
            token: "deadbeef".to_owned(),
            expires_at: Utc::now() - Duration::minutes(5),
        };
        db.set_reset_token(user.id, &reset).await.unwrap();

        let err = auth
            .complete_reset("deadbeef", "newpw1", user.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn test_complete_reset_validates_password() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        let user = auth.signup("a@b.com", "abc12", "abc12").await.unwrap();
        let issued = auth.request_password_reset("a@b.com").await.unwrap();

        let err = auth
            .complete_reset(&issued.token, "no", user.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        // Token survives a rejected attempt
        auth.validate_reset_token(&issued.token).await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_reset_requires_matching_user() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        auth.signup("a@b.com", "abc12", "abc12").await.unwrap();
        let other = auth.signup("c@d.com", "abc12", "abc12").await.unwrap();
        let issued = auth.request_password_reset("a@b.com").await.unwrap();

        let err = auth
            .complete_reset(&issued.token, "newpw1", other.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn test_reset_unknown_email() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        let err = auth.request_password_reset("ghost@b.com").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_new_request_replaces_token() {
        let db = InMemoryDatabase::new();
        let auth = AuthService::new(&db);
        auth.signup("a@b.com", "abc12", "abc12").await.unwrap();

        let first = auth.request_password_reset("a@b.com").await.unwrap();
        let second = auth.request_password_reset("a@b.com").await.unwrap();
        assert_ne!(first.token, second.token);
        assert!(matches!(
            auth.validate_reset_token(&first.token).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }
}
