//! Domain models for the storefront.
//!
//! These types are validated domain objects, separate from database rows.

pub mod catalog;
pub mod order;
pub mod session;
pub mod user;

pub use catalog::{NewProduct, Page, Product, ProductUpdate};
pub use order::{CartLine, Order, OrderItem};
pub use session::{FlashKind, FlashMessage, SessionAuth, keys as session_keys};
pub use user::{PasswordReset, User};
