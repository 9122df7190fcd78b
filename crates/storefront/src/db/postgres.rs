//! `PostgreSQL` implementation of the store traits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::{FromRow, PgPool};

use emporium_core::{Email, OrderId, Price, ProductId, UserId};

use super::{CartStore, CatalogStore, OrderStore, RepositoryError, UserStore};
use crate::models::{
    CartLine, NewProduct, Order, OrderItem, Page, PasswordReset, Product, ProductUpdate, User,
};

/// Store backed by the `storefront` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, reset_token, reset_token_expires_at, \
                            created_at, updated_at";

const PRODUCT_COLUMNS: &str = "p.id, p.owner_id, p.title, p.price, p.description, p.image_path, \
                               p.created_at, p.updated_at";

#[derive(FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    password_hash: String,
    reset_token: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        let reset = match (row.reset_token, row.reset_token_expires_at) {
            (Some(token), Some(expires_at)) => Some(PasswordReset { token, expires_at }),
            (None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "user {} has a reset token without expiry (or vice versa)",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            email,
            password_hash: SecretString::from(row.password_hash),
            reset,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: ProductId,
    owner_id: UserId,
    title: String,
    price: Price,
    description: String,
    image_path: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            price: row.price,
            description: row.description,
            image_path: row.image_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CartLineRow {
    #[sqlx(flatten)]
    product: ProductRow,
    quantity: i32,
}

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    email: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: Option<ProductId>,
    title: String,
    unit_price: Price,
    quantity: i32,
}

/// Map unique violations to [`RepositoryError::Conflict`].
fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Attach items to their orders, keeping the order of `rows`.
fn assemble_orders(
    rows: Vec<OrderRow>,
    items: Vec<OrderItemRow>,
) -> Result<Vec<Order>, RepositoryError> {
    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(OrderItem {
            product_id: item.product_id,
            title: item.title,
            unit_price: item.unit_price,
            quantity: item.quantity,
        });
    }

    rows.into_iter()
        .map(|row| {
            let email = Email::parse(&row.email).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email on order {}: {e}", row.id))
            })?;
            Ok(Order {
                id: row.id,
                user_id: row.user_id,
                email,
                items: by_order.remove(&row.id).unwrap_or_default(),
                created_at: row.created_at,
            })
        })
        .collect()
}

#[async_trait]
impl UserStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM storefront.user WHERE reset_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn create_user(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO storefront.user (email, password_hash) VALUES ($1, $2) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        User::try_from(row)
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        reset: &PasswordReset,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET reset_token = $2, reset_token_expires_at = $3, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&reset.token)
        .bind(reset.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "reset token"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_reset_token(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.user
            SET reset_token = NULL, reset_token_expires_at = NULL, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        id: UserId,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.user
            SET password_hash = $3,
                reset_token = NULL,
                reset_token_expires_at = NULL,
                updated_at = now()
            WHERE id = $1
              AND reset_token = $2
              AND reset_token_expires_at >= $4
            ",
        )
        .bind(id)
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_products(&self, page: Page) -> Result<(Vec<Product>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM storefront.product")
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product p \
             ORDER BY p.id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Product::from).collect(), total))
    }

    async fn products_by_owner(&self, owner: UserId) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product p \
             WHERE p.owner_id = $1 ORDER BY p.id"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn create_product(
        &self,
        owner: UserId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(
            r"
            INSERT INTO storefront.product (owner_id, title, price, description, image_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, owner_id, title, price, description, image_path, created_at, updated_at
            ",
        )
        .bind(owner)
        .bind(&product.title)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.image_path)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_product(
        &self,
        id: ProductId,
        owner: UserId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            UPDATE storefront.product
            SET title = $3,
                price = $4,
                description = $5,
                image_path = COALESCE($6, image_path),
                updated_at = now()
            WHERE id = $1 AND owner_id = $2
            RETURNING id, owner_id, title, price, description, image_path, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(owner)
        .bind(&update.title)
        .bind(update.price)
        .bind(&update.description)
        .bind(update.image_path.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn delete_product(
        &self,
        id: ProductId,
        owner: UserId,
    ) -> Result<Option<Product>, RepositoryError> {
        // cart_item rows go with the product (ON DELETE CASCADE)
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            DELETE FROM storefront.product
            WHERE id = $1 AND owner_id = $2
            RETURNING id, owner_id, title, price, description, image_path, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS}, ci.quantity \
             FROM storefront.cart_item ci \
             JOIN storefront.product p ON p.id = ci.product_id \
             WHERE ci.user_id = $1 \
             ORDER BY ci.created_at, ci.product_id"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CartLine {
                product: row.product.into(),
                quantity: row.quantity,
            })
            .collect())
    }

    async fn add_to_cart(&self, user: UserId, product: ProductId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.cart_item (user_id, product_id, quantity)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = storefront.cart_item.quantity + 1
            ",
        )
        .bind(user)
        .bind(product)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1 AND product_id = $2")
            .bind(user)
            .bind(product)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, user: &User) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let lines: Vec<CartLineRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS}, ci.quantity \
             FROM storefront.cart_item ci \
             JOIN storefront.product p ON p.id = ci.product_id \
             WHERE ci.user_id = $1 \
             ORDER BY ci.created_at, ci.product_id \
             FOR UPDATE OF ci"
        ))
        .bind(user.id)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Ok(None);
        }

        let order: OrderRow = sqlx::query_as(
            r#"
            INSERT INTO storefront."order" (user_id, email)
            VALUES ($1, $2)
            RETURNING id, user_id, email, created_at
            "#,
        )
        .bind(user.id)
        .bind(user.email.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item: OrderItemRow = sqlx::query_as(
                r"
                INSERT INTO storefront.order_item (order_id, product_id, title, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING order_id, product_id, title, unit_price, quantity
                ",
            )
            .bind(order.id)
            .bind(line.product.id)
            .bind(&line.product.title)
            .bind(line.product.price)
            .bind(line.quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(assemble_orders(vec![order], items)?.pop())
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, email, created_at
            FROM storefront."order"
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let items: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, title, unit_price, quantity
            FROM storefront.order_item
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        assemble_orders(rows, items)
    }

    async fn find_order(
        &self,
        id: OrderId,
        user: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, email, created_at
            FROM storefront."order"
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, title, unit_price, quantity
            FROM storefront.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assemble_orders(vec![row], items)?.pop())
    }
}
