//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Security headers (CSP, frame and sniffing protection)
//! 2. Sentry hub and request transaction
//! 3. Compression
//! 4. `TraceLayer` (access log span)
//! 5. Request ID (recorded on the span, Sentry scope and response)
//! 6. Panic catcher (renders the 500 page)
//! 7. Session layer (tower-sessions)
//! 8. CSRF check for state-changing methods
//! 9. User hydration (`RequestContext` in extensions)
//!
//! Flash messages and the CSRF token for templates are read lazily through
//! the [`PageContext`] extractor. Auth POST routes additionally carry a
//! rate limiter.

pub mod auth;
pub mod csrf;
pub mod flash;
pub mod page;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{CurrentUser, RequestContext, RequireAuth, hydrate_user};
pub use csrf::{csrf_protection, csrf_token};
pub use flash::{push_flash, take_flash};
pub use page::PageContext;
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
