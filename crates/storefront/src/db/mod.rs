//! Persistence for the storefront.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `user` - Accounts with password hash and pending reset token
//! - `product` - Catalog, each row owned by the admin who created it
//! - `cart_item` - Per-user cart lines, cascade-deleted with the product
//! - `order` / `order_item` - Placed orders with product snapshots
//! - `session` - Session payloads (managed by `tower-sessions-sqlx-store`)
//!
//! Handlers and services talk to the store traits below, never to a pool
//! directly. [`PgStore`] is the production implementation; an in-memory one
//! is available for tests behind the `test-util` feature.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```

mod postgres;

#[cfg(any(test, feature = "test-util"))]
mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use emporium_core::{Email, OrderId, ProductId, UserId};

use crate::models::{CartLine, NewProduct, Order, Page, PasswordReset, Product, ProductUpdate, User};

#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryDatabase;
pub use postgres::PgStore;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Find a user by normalized email.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Find a user by id.
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Find the user holding a reset token, expired or not.
    async fn find_user_by_reset_token(&self, token: &str)
    -> Result<Option<User>, RepositoryError>;

    /// Create a user with an empty cart.
    ///
    /// Returns [`RepositoryError::Conflict`] if the email is taken.
    async fn create_user(&self, email: &Email, password_hash: &str)
    -> Result<User, RepositoryError>;

    /// Store a reset token, replacing any previous one.
    ///
    /// Returns [`RepositoryError::NotFound`] if the user does not exist.
    async fn set_reset_token(
        &self,
        id: UserId,
        reset: &PasswordReset,
    ) -> Result<(), RepositoryError>;

    /// Remove a user's reset token and expiry.
    async fn clear_reset_token(&self, id: UserId) -> Result<(), RepositoryError>;

    /// Replace the password hash and clear the token, but only where the user
    /// still holds `token` and it is unexpired at `now`.
    ///
    /// Returns whether a row was updated.
    async fn complete_password_reset(
        &self,
        id: UserId,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

/// Product storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// One page of products, oldest first, with the total product count.
    async fn list_products(&self, page: Page) -> Result<(Vec<Product>, i64), RepositoryError>;

    /// Products created by `owner`.
    async fn products_by_owner(&self, owner: UserId) -> Result<Vec<Product>, RepositoryError>;

    /// Find a product by id.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Insert a product owned by `owner`.
    async fn create_product(
        &self,
        owner: UserId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError>;

    /// Update a product if `owner` owns it. Returns `None` otherwise.
    async fn update_product(
        &self,
        id: ProductId,
        owner: UserId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Delete a product if `owner` owns it, removing it from every cart.
    /// Returns the deleted product.
    async fn delete_product(
        &self,
        id: ProductId,
        owner: UserId,
    ) -> Result<Option<Product>, RepositoryError>;
}

/// Cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The user's cart lines in insertion order.
    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Add one unit of a product, incrementing an existing line.
    ///
    /// Returns [`RepositoryError::NotFound`] if the product does not exist.
    async fn add_to_cart(&self, user: UserId, product: ProductId) -> Result<(), RepositoryError>;

    /// Remove a product's line from the cart. Missing lines are ignored.
    async fn remove_from_cart(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), RepositoryError>;
}

/// Order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Snapshot the user's cart into a new order and empty the cart, atomically.
    ///
    /// Returns `None` when the cart is empty.
    async fn place_order(&self, user: &User) -> Result<Option<Order>, RepositoryError>;

    /// The user's orders, newest first.
    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// An order by id, only if it belongs to `user`.
    async fn find_order(
        &self,
        id: OrderId,
        user: UserId,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
