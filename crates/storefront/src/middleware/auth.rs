//! User hydration middleware and authentication extractors.
//!
//! [`hydrate_user`] runs after the session layer and stores a
//! [`RequestContext`] in request extensions. Handlers read it through
//! [`CurrentUser`] or [`RequireAuth`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{Method, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{SessionAuth, User, session_keys};
use crate::state::AppState;

/// Per-request authentication state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// The logged-in user, if the session holds one that still exists.
    pub user: Option<User>,
}

impl RequestContext {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Middleware that loads the session's user into a [`RequestContext`].
///
/// A session pointing at a deleted user is treated as anonymous.
pub async fn hydrate_user(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let auth: SessionAuth = match session.get(session_keys::AUTH).await {
        Ok(auth) => auth.unwrap_or_default(),
        Err(e) => return AppError::from(e).into_response(),
    };

    let user = match auth.authenticated_user() {
        Some(id) => match state.users().find_user_by_id(id).await {
            Ok(user) => {
                if user.is_none() {
                    tracing::debug!(user_id = %id, "session user no longer exists");
                }
                user
            }
            Err(e) => return AppError::from(e).into_response(),
        },
        None => None,
    };

    request.extensions_mut().insert(RequestContext { user });
    next.run(request).await
}

/// Extractor for the optional current user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}!", u.email),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct CurrentUser(pub Option<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.user.clone());
        Ok(Self(user))
    }
}

/// Extractor that requires a logged-in user.
///
/// Page requests without one are redirected to `/login`; `DELETE` requests
/// (issued by scripts) get a bare 401.
pub struct RequireAuth(pub User);

/// Error returned when authentication is required but the user is not logged in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for script requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.user.clone())
            .map(Self)
            .ok_or(if parts.method == Method::DELETE {
                AuthRejection::Unauthorized
            } else {
                AuthRejection::RedirectToLogin
            })
    }
}
