//! Unified error handling with Sentry integration.
//!
//! All route handlers return `Result<T, AppError>`. [`AppError`] is the only
//! place that logs failures and captures them to Sentry; it renders an HTML
//! error page without internal details and falls back to plain text if the
//! page itself cannot be rendered.

use std::any::Any;

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::middleware::PageContext;
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid CSRF token.
    #[error("Forbidden")]
    Forbidden,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Template)]
#[template(path = "errors/404.html")]
struct NotFoundPage {
    page: PageContext,
}

#[derive(Template)]
#[template(path = "errors/403.html")]
struct ForbiddenPage {
    page: PageContext,
}

#[derive(Template)]
#[template(path = "errors/500.html")]
struct ServerErrorPage {
    page: PageContext,
}

#[derive(Template)]
#[template(path = "errors/error.html")]
struct ErrorPage<'a> {
    page: PageContext,
    status: u16,
    message: &'a str,
}

impl AppError {
    /// Whether this error is the server's fault.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => true,
            Self::Auth(err) => !err.is_client_error(),
            Self::NotFound(_) | Self::Forbidden | Self::BadRequest(_) => false,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        if self.is_server_error() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Auth(err) => match err {
                AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::EmailAlreadyExists => StatusCode::CONFLICT,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Auth(err) => match err {
                AuthError::Validation(errors) => errors.to_string(),
                AuthError::InvalidCredentials => "Invalid email or password.".to_owned(),
                AuthError::EmailAlreadyExists => {
                    "An account with this email already exists.".to_owned()
                }
                AuthError::InvalidOrExpiredToken => {
                    "This reset link is invalid or has expired.".to_owned()
                }
                AuthError::UserNotFound => "No account with that email found.".to_owned(),
                _ => "Authentication error.".to_owned(),
            },
            Self::BadRequest(msg) => msg.clone(),
            _ => String::new(),
        }
    }

    fn render_page(&self, status: StatusCode) -> askama::Result<String> {
        let page = PageContext::anonymous();
        match status {
            StatusCode::NOT_FOUND if matches!(self, Self::NotFound(_)) => {
                NotFoundPage { page }.render()
            }
            StatusCode::FORBIDDEN => ForbiddenPage { page }.render(),
            StatusCode::INTERNAL_SERVER_ERROR => ServerErrorPage { page }.render(),
            _ => ErrorPage {
                page,
                status: status.as_u16(),
                message: &self.public_message(),
            }
            .render(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        html_or_plain(status, self.render_page(status))
    }
}

/// Render the 500 page for a panic caught by `CatchPanicLayer`.
#[must_use]
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    server_error_response()
}

/// The generic 500 page.
#[must_use]
pub fn server_error_response() -> Response {
    let body = ServerErrorPage {
        page: PageContext::anonymous(),
    }
    .render();
    html_or_plain(StatusCode::INTERNAL_SERVER_ERROR, body)
}

/// The rendered page, or the bare status text if rendering failed.
fn html_or_plain(status: StatusCode, body: askama::Result<String>) -> Response {
    match body {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render error page");
            let text = status.canonical_reason().unwrap_or("Error");
            (status, text).into_response()
        }
    }
}

/// Render the 404 page for unmatched routes.
pub async fn not_found_fallback() -> AppError {
    AppError::NotFound("no route".to_owned())
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after login.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
