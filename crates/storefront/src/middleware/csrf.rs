//! CSRF protection.
//!
//! Each session holds a random secret under the `csrf_token` key. Pages embed
//! it as a hidden `_csrf` field; scripts send it in a `csrf-token` header.
//! State-changing requests must echo the secret or are refused with 403
//! before they reach a handler.

use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderMap, Method, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::session_keys;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "_csrf";

/// Headers checked for the token, in order.
pub const CSRF_HEADERS: [&str; 2] = ["csrf-token", "x-csrf-token"];

/// Largest urlencoded body buffered while looking for the token.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Return the session's CSRF secret, creating one if the session has none.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn csrf_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(session_keys::CSRF_TOKEN).await? {
        return Ok(token);
    }

    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

/// Middleware rejecting state-changing requests without a valid token.
pub async fn csrf_protection(session: Session, request: Request, next: Next) -> Response {
    if is_safe_method(request.method()) {
        return next.run(request).await;
    }

    let expected = match session.get::<String>(session_keys::CSRF_TOKEN).await {
        Ok(token) => token,
        Err(e) => return AppError::from(e).into_response(),
    };

    let (request, submitted) = match submitted_token(request).await {
        Ok(found) => found,
        Err(response) => return response,
    };

    match (expected, submitted) {
        (Some(expected), Some(submitted)) if constant_time_compare(&expected, &submitted) => {
            next.run(request).await
        }
        (expected, submitted) => {
            tracing::warn!(
                path = %request.uri().path(),
                has_session_token = expected.is_some(),
                has_submitted_token = submitted.is_some(),
                "rejected request with invalid CSRF token"
            );
            AppError::Forbidden.into_response()
        }
    }
}

const fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

/// Find the submitted token in headers, query string, or urlencoded body.
///
/// The body is buffered and put back so the handler can still read it.
async fn submitted_token(request: Request) -> Result<(Request, Option<String>), Response> {
    if let Some(token) = token_from_headers(request.headers()) {
        return Ok((request, Some(token)));
    }

    if let Some(token) = request.uri().query().and_then(token_from_form) {
        return Ok((request, Some(token)));
    }

    if !is_urlencoded(request.headers()) {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES).await.map_err(|e| {
        AppError::BadRequest(format!("unreadable form body: {e}")).into_response()
    })?;
    let token = std::str::from_utf8(&bytes).ok().and_then(token_from_form);

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    CSRF_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    })
}

fn token_from_form(encoded: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded.as_bytes())
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
