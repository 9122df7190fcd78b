//! Session-related types.
//!
//! Types stored in the session for authentication state and flash messages.

use serde::{Deserialize, Serialize};

use emporium_core::UserId;

/// Authentication state kept in the session payload.
///
/// Only the auth service writes this key; everything else reads it through
/// the request context built by the user hydration middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAuth {
    /// Whether the session belongs to a logged-in user.
    pub is_logged_in: bool,
    /// The logged-in user, if any.
    pub user_id: Option<UserId>,
}

impl SessionAuth {
    /// State written on successful login.
    #[must_use]
    pub const fn logged_in(user_id: UserId) -> Self {
        Self {
            is_logged_in: true,
            user_id: Some(user_id),
        }
    }

    /// The user this session is authenticated as, if any.
    #[must_use]
    pub const fn authenticated_user(&self) -> Option<UserId> {
        if self.is_logged_in { self.user_id } else { None }
    }
}

/// Severity of a flash message, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Error,
    Info,
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

impl FlashMessage {
    /// An error message.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            text: text.into(),
        }
    }

    /// An informational message.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            text: text.into(),
        }
    }

    /// CSS class for templates.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Error => "user-message user-message--error",
            FlashKind::Info => "user-message",
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for [`super::SessionAuth`].
    pub const AUTH: &str = "auth";

    /// Key for the per-session CSRF secret.
    pub const CSRF_TOKEN: &str = "csrf_token";

    /// Key for pending flash messages.
    pub const FLASH: &str = "flash";
}
