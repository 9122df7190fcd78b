//! Authentication route handlers.
//!
//! Handles signup, login, logout, and the emailed password reset flow.
//! Validation problems re-render the form with status 422 and the submitted
//! email kept; credential and token problems become a flash message on a
//! redirect.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use emporium_core::UserId;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{CurrentUser, PageContext, push_flash};
use crate::models::FlashMessage;
use crate::services::auth::{AuthError, AuthService};
use crate::services::validation::ValidationErrors;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Signup form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

/// Reset request form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetForm {
    pub email: String,
}

/// New password form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewPasswordForm {
    pub password: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "passwordToken", alias = "token")]
    pub token: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub email: String,
    pub error: Option<String>,
    pub invalid_fields: Vec<&'static str>,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub page: PageContext,
    pub email: String,
    pub error: Option<String>,
    pub invalid_fields: Vec<&'static str>,
}

impl LoginTemplate {
    fn is_invalid(&self, field: &str) -> bool {
        self.invalid_fields.iter().any(|f| *f == field)
    }
}

impl SignupTemplate {
    fn is_invalid(&self, field: &str) -> bool {
        self.invalid_fields.iter().any(|f| *f == field)
    }
}

/// Reset request page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset.html")]
pub struct ResetTemplate {
    pub page: PageContext,
}

/// New password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/new_password.html")]
pub struct NewPasswordTemplate {
    pub page: PageContext,
    pub user_id: UserId,
    pub token: String,
    pub error: Option<String>,
}

fn error_fields(errors: &ValidationErrors) -> (Option<String>, Vec<&'static str>) {
    (
        errors.first_message().map(str::to_owned),
        errors.field_names(),
    )
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Display the login page.
pub async fn login_page(page: PageContext) -> impl IntoResponse {
    LoginTemplate {
        page,
        email: String::new(),
        error: None,
        invalid_fields: Vec::new(),
    }
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let auth = AuthService::new(state.users());

    match auth.login(&session, &form.email, &form.password).await {
        Ok(session_auth) => {
            if let Some(user_id) = session_auth.user_id {
                set_sentry_user(&user_id);
            }
            Ok(Redirect::to("/").into_response())
        }
        Err(AuthError::Validation(errors)) => {
            let (error, invalid_fields) = error_fields(&errors);
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                LoginTemplate {
                    page: PageContext::load(&session, user).await?,
                    email: form.email,
                    error,
                    invalid_fields,
                },
            )
                .into_response())
        }
        Err(AuthError::InvalidCredentials) => {
            push_flash(&session, FlashMessage::error("Invalid email or password.")).await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Handle logout. Always redirects home, even if there was no session.
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    AuthService::new(state.users()).logout(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

// =============================================================================
// Signup
// =============================================================================

/// Display the signup page.
pub async fn signup_page(page: PageContext) -> impl IntoResponse {
    SignupTemplate {
        page,
        email: String::new(),
        error: None,
        invalid_fields: Vec::new(),
    }
}

/// Handle signup form submission.
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let auth = AuthService::new(state.users());

    let (error, invalid_fields) = match auth
        .signup(&form.email, &form.password, &form.confirm_password)
        .await
    {
        Ok(_) => {
            push_flash(
                &session,
                FlashMessage::info("Your account has been created. Please log in."),
            )
            .await?;
            return Ok(Redirect::to("/login").into_response());
        }
        Err(AuthError::Validation(errors)) => error_fields(&errors),
        Err(AuthError::EmailAlreadyExists) => (
            Some("E-mail already exists, please pick a different one.".to_owned()),
            vec!["email"],
        ),
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        SignupTemplate {
            page: PageContext::load(&session, user).await?,
            email: form.email,
            error,
            invalid_fields,
        },
    )
        .into_response())
}

// =============================================================================
// Password Reset
// =============================================================================

/// Display the reset request page.
pub async fn reset_page(page: PageContext) -> impl IntoResponse {
    ResetTemplate { page }
}

/// Issue a reset token and email the link.
pub async fn request_reset(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ResetForm>,
) -> Result<Redirect> {
    let issued = match AuthService::new(state.users())
        .request_password_reset(&form.email)
        .await
    {
        Ok(issued) => issued,
        Err(AuthError::UserNotFound) => {
            push_flash(&session, FlashMessage::error("No account with that email found.")).await?;
            return Ok(Redirect::to("/reset"));
        }
        Err(e) => return Err(e.into()),
    };

    let reset_url = state.config().password_reset_url(&issued.token);
    match state.mailer() {
        Some(mailer) => {
            if let Err(e) = mailer
                .send_password_reset(issued.user.email.as_str(), &reset_url)
                .await
            {
                tracing::error!(error = %e, user_id = %issued.user.id, "failed to send reset email");
            }
        }
        None => {
            tracing::warn!(user_id = %issued.user.id, "SMTP not configured, reset email not sent");
        }
    }

    push_flash(
        &session,
        FlashMessage::info("Check your inbox for a link to reset your password."),
    )
    .await?;
    Ok(Redirect::to("/"))
}

/// Display the new password form for a valid token.
pub async fn new_password_page(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Path(token): Path<String>,
) -> Result<Response> {
    match AuthService::new(state.users())
        .validate_reset_token(&token)
        .await
    {
        Ok(user) => Ok(NewPasswordTemplate {
            page,
            user_id: user.id,
            token,
            error: None,
        }
        .into_response()),
        Err(AuthError::InvalidOrExpiredToken) => {
            push_flash(&session, FlashMessage::error(expired_link_message())).await?;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Set the new password and consume the token.
pub async fn new_password(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<NewPasswordForm>,
) -> Result<Response> {
    let Ok(user_id) = form.user_id.parse::<UserId>() else {
        push_flash(&session, FlashMessage::error(expired_link_message())).await?;
        return Ok(Redirect::to("/reset").into_response());
    };

    match AuthService::new(state.users())
        .complete_reset(&form.token, &form.password, user_id)
        .await
    {
        Ok(()) => {
            push_flash(
                &session,
                FlashMessage::info("Your password has been updated. Please log in."),
            )
            .await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(AuthError::Validation(errors)) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            NewPasswordTemplate {
                page: PageContext::load(&session, user).await?,
                user_id,
                token: form.token,
                error: errors.first_message().map(str::to_owned),
            },
        )
            .into_response()),
        Err(AuthError::InvalidOrExpiredToken) => {
            push_flash(&session, FlashMessage::error(expired_link_message())).await?;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

const fn expired_link_message() -> &'static str {
    "This reset link is invalid or has expired. Please request a new one."
}
