//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness check
//! GET  /health/ready               - Readiness check (store ping)
//! GET  /static/*                   - Stylesheets and scripts
//! GET  /images/*                   - Uploaded product images
//! GET  /500                        - Error page
//!
//! # Shop
//! GET  /                           - Product listing (?page=)
//! GET  /products                   - Product listing (?page=)
//! GET  /products/{id}              - Product detail
//! GET  /cart                       - Cart (requires auth)
//! POST /cart                       - Add product to cart
//! POST /cart-delete-item           - Remove product from cart
//! POST /create-order               - Place order from cart
//! GET  /orders                     - Order history
//! GET  /orders/{id}                - Order detail
//!
//! # Auth
//! GET  /login, POST /login         - Login
//! GET  /signup, POST /signup       - Signup
//! POST /logout                     - Logout
//! GET  /reset, POST /reset         - Request a reset link
//! GET  /reset/{token}              - New password form
//! POST /new-password               - Set new password
//!
//! # Admin (requires auth, owner only)
//! GET  /admin/add-product          - Product form
//! POST /admin/add-product          - Create product (multipart)
//! GET  /admin/products             - Own products
//! GET  /admin/edit-product/{id}    - Edit form
//! POST /admin/edit-product         - Update product (multipart)
//! POST /admin/delete-product       - Delete product (form)
//! DELETE /admin/product/{id}       - Delete product (JSON)
//! ```

pub mod admin;
pub mod auth;
pub mod shop;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::{delete, get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, services::ServeDir,
    trace::TraceLayer,
};
use tower_sessions::SessionStore;

use crate::config::StorefrontConfig;
use crate::error::{handle_panic, not_found_fallback, server_error_response};
use crate::middleware::{
    auth_rate_limiter, create_session_layer, csrf_protection, hydrate_user,
    request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Largest accepted product form (image included).
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the auth routes router. POST handlers are rate limited when
/// enabled in configuration.
pub fn auth_routes(config: &StorefrontConfig) -> Router<AppState> {
    let pages = Router::new()
        .route("/login", get(auth::login_page))
        .route("/signup", get(auth::signup_page))
        .route("/reset", get(auth::reset_page))
        .route("/reset/{token}", get(auth::new_password_page))
        .route("/logout", post(auth::logout));

    let mut actions = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/reset", post(auth::request_reset))
        .route("/new-password", post(auth::new_password));
    if config.rate_limit_auth {
        actions = actions.layer(auth_rate_limiter(config.trust_proxy_headers));
    }

    pages.merge(actions)
}

/// Create the shop routes router.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(shop::index))
        .route("/products", get(shop::products))
        .route("/products/{id}", get(shop::product_detail))
        .route("/cart", get(shop::cart).post(shop::add_to_cart))
        .route("/cart-delete-item", post(shop::delete_cart_item))
        .route("/create-order", post(shop::create_order))
        .route("/orders", get(shop::orders))
        .route("/orders/{id}", get(shop::order_detail))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/add-product",
            get(admin::add_product_page).post(admin::add_product),
        )
        .route("/products", get(admin::products))
        .route("/edit-product/{id}", get(admin::edit_product_page))
        .route("/edit-product", post(admin::edit_product))
        .route("/delete-product", post(admin::delete_product))
        .route("/product/{id}", delete(admin::delete_product_json))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Create all session-backed page routes.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    Router::new()
        .merge(shop_routes())
        .merge(auth_routes(config))
        .nest("/admin", admin_routes())
        .route("/500", get(error_page))
}

/// Build the complete application.
///
/// Layers, outermost first: security headers, Sentry, compression, trace
/// span, request ID, panic catcher; page routes additionally run the session
/// layer, the CSRF check and user hydration, in that order.
pub fn app<Store>(state: AppState, session_store: Store) -> Router
where
    Store: SessionStore + Clone,
{
    let config = state.config().clone();

    let pages = routes(&config)
        .layer(from_fn_with_state(state.clone(), hydrate_user))
        .layer(from_fn(csrf_protection))
        .layer(create_session_layer(session_store, &config));

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(pages)
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .nest_service("/images", ServeDir::new(&config.upload_dir))
        .fallback(not_found_fallback)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(CompressionLayer::new())
        .with_state(state)
        // Sentry layers wrap everything except the security headers
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(from_fn(security_headers_middleware))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.users().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn error_page() -> Response {
    server_error_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, header};
    use secrecy::SecretString;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;
    use url::Url;

    use super::*;
    use crate::db::InMemoryDatabase;

    fn test_app() -> Router {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://unused"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            base_url: Url::parse("http://localhost:3000/").unwrap(),
            upload_dir: std::env::temp_dir(),
            static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"),
            rate_limit_auth: false,
            trust_proxy_headers: false,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
        };
        let state = AppState::new(config, Arc::new(InMemoryDatabase::new()), None);
        app(state, MemoryStore::default())
    }

    async fn send(method: Method, uri: &str) -> Response {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        test_app().oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = send(Method::GET, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_readiness_pings_store() {
        let response = send(Method::GET, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fallback_is_not_found_page() {
        let response = send(Method::GET, "/nowhere").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(header::CONTENT_SECURITY_POLICY));
        assert!(body_text(response).await.contains("Page Not Found!"));
    }

    #[tokio::test]
    async fn test_login_page_starts_a_session() {
        let response = send(Method::GET, "/login").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::SET_COOKIE));
        assert!(body_text(response).await.contains("name=\"_csrf\""));
    }

    #[tokio::test]
    async fn test_post_without_session_is_forbidden() {
        let response = send(Method::POST, "/logout").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_error_page_route() {
        let response = send(Method::GET, "/500").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("went wrong"));
    }
}
