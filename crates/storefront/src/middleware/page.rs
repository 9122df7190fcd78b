//! Per-page template context.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use super::auth::RequestContext;
use super::csrf::csrf_token;
use super::flash::take_flash;
use crate::error::AppError;
use crate::models::{FlashMessage, User};

/// Values every rendered page needs: the CSRF token for its forms, the
/// current user for navigation, and pending flash messages.
///
/// Building one consumes the flash messages, so only page handlers that
/// always render should extract it. Form handlers that usually redirect call
/// [`PageContext::load`] on their re-render path instead.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub csrf_token: String,
    pub user: Option<User>,
    pub flash: Vec<FlashMessage>,
}

impl PageContext {
    /// Context for pages rendered outside the session layer, such as
    /// error pages. Renders no forms and no user.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            csrf_token: String::new(),
            user: None,
            flash: Vec::new(),
        }
    }

    /// Build the context from the session and the hydrated user.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn load(session: &Session, user: Option<User>) -> Result<Self, AppError> {
        Ok(Self {
            csrf_token: csrf_token(session).await?,
            user,
            flash: take_flash(session).await?,
        })
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Email of the current user, for the navigation bar.
    #[must_use]
    pub fn user_email(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.email.as_str())
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;

        let user = parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.user.clone());

        Self::load(&session, user).await
    }
}
