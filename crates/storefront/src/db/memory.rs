//! In-process store used by unit and integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::Mutex;

use emporium_core::{Email, OrderId, ProductId, UserId};

use super::{CartStore, CatalogStore, OrderStore, RepositoryError, UserStore};
use crate::models::{
    CartLine, NewProduct, Order, OrderItem, Page, PasswordReset, Product, ProductUpdate, User,
};

/// A store that keeps every table in memory behind one lock, so each
/// operation is atomic the way a database transaction would be.
#[derive(Default)]
pub struct InMemoryDatabase {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    /// (user, product, quantity) in insertion order.
    cart_items: Vec<(UserId, ProductId, i32)>,
    orders: Vec<Order>,
    next_user_id: i32,
    next_product_id: i32,
    next_order_id: i32,
}

impl Tables {
    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }

    fn user_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

impl InMemoryDatabase {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    /// Delete a user with their products, cart and orders, following the
    /// `ON DELETE CASCADE` keys of the schema. Returns whether the user
    /// existed.
    pub async fn remove_user(&self, id: UserId) -> bool {
        let mut tables = self.inner.lock().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);

        let owned: Vec<ProductId> = tables
            .products
            .iter()
            .filter(|p| p.owner_id == id)
            .map(|p| p.id)
            .collect();
        tables.products.retain(|p| p.owner_id != id);
        tables
            .cart_items
            .retain(|(user, product, _)| *user != id && !owned.contains(product));
        tables.orders.retain(|o| o.user_id != id);

        tables.users.len() < before
    }
}

#[async_trait]
impl UserStore for InMemoryDatabase {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.inner.lock().await;
        Ok(tables.users.iter().find(|u| &u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.inner.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.reset.as_ref().is_some_and(|r| r.token == token))
            .cloned())
    }

    async fn create_user(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tables = self.inner.lock().await;
        if tables.users.iter().any(|u| &u.email == email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(Tables::next_id(&mut tables.next_user_id)),
            email: email.clone(),
            password_hash: SecretString::from(password_hash.to_owned()),
            reset: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        reset: &PasswordReset,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.lock().await;
        let user = tables.user_mut(id).ok_or(RepositoryError::NotFound)?;
        user.reset = Some(reset.clone());
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_reset_token(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut tables = self.inner.lock().await;
        if let Some(user) = tables.user_mut(id) {
            user.reset = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        id: UserId,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.inner.lock().await;
        let Some(user) = tables.user_mut(id) else {
            return Ok(false);
        };

        let matches = user
            .reset
            .as_ref()
            .is_some_and(|r| r.token == token && !r.is_expired_at(now));
        if !matches {
            return Ok(false);
        }

        user.password_hash = SecretString::from(password_hash.to_owned());
        user.reset = None;
        user.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl CatalogStore for InMemoryDatabase {
    async fn list_products(&self, page: Page) -> Result<(Vec<Product>, i64), RepositoryError> {
        let tables = self.inner.lock().await;
        let total = i64::try_from(tables.products.len()).unwrap_or(i64::MAX);
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit()).unwrap_or(0);
        let items = tables.products.iter().skip(skip).take(take).cloned().collect();
        Ok((items, total))
    }

    async fn products_by_owner(&self, owner: UserId) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let tables = self.inner.lock().await;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(
        &self,
        owner: UserId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let mut tables = self.inner.lock().await;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(Tables::next_id(&mut tables.next_product_id)),
            owner_id: owner,
            title: product.title.clone(),
            price: product.price,
            description: product.description.clone(),
            image_path: product.image_path.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        owner: UserId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tables = self.inner.lock().await;
        let Some(product) = tables
            .products
            .iter_mut()
            .find(|p| p.id == id && p.owner_id == owner)
        else {
            return Ok(None);
        };

        product.title.clone_from(&update.title);
        product.price = update.price;
        product.description.clone_from(&update.description);
        if let Some(image_path) = &update.image_path {
            product.image_path.clone_from(image_path);
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(
        &self,
        id: ProductId,
        owner: UserId,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tables = self.inner.lock().await;
        let Some(index) = tables
            .products
            .iter()
            .position(|p| p.id == id && p.owner_id == owner)
        else {
            return Ok(None);
        };

        let product = tables.products.remove(index);
        tables.cart_items.retain(|(_, p, _)| *p != id);
        for item in tables.orders.iter_mut().flat_map(|o| o.items.iter_mut()) {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }
        Ok(Some(product))
    }
}

#[async_trait]
impl CartStore for InMemoryDatabase {
    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .cart_items
            .iter()
            .filter(|(u, _, _)| *u == user)
            .filter_map(|(_, p, quantity)| {
                tables
                    .products
                    .iter()
                    .find(|product| product.id == *p)
                    .map(|product| CartLine {
                        product: product.clone(),
                        quantity: *quantity,
                    })
            })
            .collect())
    }

    async fn add_to_cart(&self, user: UserId, product: ProductId) -> Result<(), RepositoryError> {
        let mut tables = self.inner.lock().await;
        if !tables.products.iter().any(|p| p.id == product) {
            return Err(RepositoryError::NotFound);
        }

        if let Some(line) = tables
            .cart_items
            .iter_mut()
            .find(|(u, p, _)| *u == user && *p == product)
        {
            line.2 += 1;
        } else {
            tables.cart_items.push((user, product, 1));
        }
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.lock().await;
        tables
            .cart_items
            .retain(|(u, p, _)| !(*u == user && *p == product));
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryDatabase {
    async fn place_order(&self, user: &User) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.inner.lock().await;

        let items: Vec<OrderItem> = tables
            .cart_items
            .iter()
            .filter(|(u, _, _)| *u == user.id)
            .filter_map(|(_, p, quantity)| {
                tables.products.iter().find(|product| product.id == *p).map(|product| {
                    OrderItem {
                        product_id: Some(product.id),
                        title: product.title.clone(),
                        unit_price: product.price,
                        quantity: *quantity,
                    }
                })
            })
            .collect();

        if items.is_empty() {
            return Ok(None);
        }

        let order = Order {
            id: OrderId::new(Tables::next_id(&mut tables.next_order_id)),
            user_id: user.id,
            email: user.email.clone(),
            items,
            created_at: Utc::now(),
        };
        tables.orders.push(order.clone());
        tables.cart_items.retain(|(u, _, _)| *u != user.id);
        Ok(Some(order))
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect())
    }

    async fn find_order(
        &self,
        id: OrderId,
        user: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.id == id && o.user_id == user)
            .cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::Price;

    use super::*;

    fn new_product(title: &str) -> NewProduct {
        NewProduct {
            title: title.to_owned(),
            price: Price::parse("4.50").unwrap(),
            description: "A fine product".to_owned(),
            image_path: "img.png".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicate_email() {
        let db = InMemoryDatabase::new();
        let email = Email::parse("a@b.com").unwrap();
        db.create_user(&email, "hash").await.unwrap();

        let err = db.create_user(&email, "hash").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(db.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_user_cascades() {
        let db = InMemoryDatabase::new();
        let owner = db
            .create_user(&Email::parse("owner@b.com").unwrap(), "hash")
            .await
            .unwrap();
        let shopper = db
            .create_user(&Email::parse("shopper@b.com").unwrap(), "hash")
            .await
            .unwrap();
        let product = db
            .create_product(owner.id, &new_product("Notebook"))
            .await
            .unwrap();
        db.add_to_cart(shopper.id, product.id).await.unwrap();

        assert!(db.remove_user(owner.id).await);
        assert!(!db.remove_user(owner.id).await);

        assert!(db.find_user_by_id(owner.id).await.unwrap().is_none());
        assert!(db.find_product(product.id).await.unwrap().is_none());
        assert!(db.cart_lines(shopper.id).await.unwrap().is_empty());
        assert_eq!(db.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_cart_increments_and_orders_snapshot() {
        let db = InMemoryDatabase::new();
        let user = db
            .create_user(&Email::parse("a@b.com").unwrap(), "hash")
            .await
            .unwrap();
        let product = db.create_product(user.id, &new_product("Book")).await.unwrap();

        db.add_to_cart(user.id, product.id).await.unwrap();
        db.add_to_cart(user.id, product.id).await.unwrap();
        let lines = db.cart_lines(user.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 2);

        let order = db.place_order(&user).await.unwrap().unwrap();
        assert_eq!(order.total().to_string(), "$9.00");
        assert!(db.cart_lines(user.id).await.unwrap().is_empty());
        assert!(db.place_order(&user).await.unwrap().is_none());

        db.delete_product(product.id, user.id).await.unwrap();
        let order = db.find_order(order.id, user.id).await.unwrap().unwrap();
        assert_eq!(order.items[0].product_id, None);
        assert_eq!(order.items[0].title, "Book");
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let db = InMemoryDatabase::new();
        let err = db
            .add_to_cart(UserId::new(1), ProductId::new(99))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_only_owner_can_update_or_delete() {
        let db = InMemoryDatabase::new();
        let owner = UserId::new(1);
        let other = UserId::new(2);
        let product = db.create_product(owner, &new_product("Lamp")).await.unwrap();

        let update = ProductUpdate {
            title: "Stolen".to_owned(),
            price: product.price,
            description: product.description.clone(),
            image_path: None,
        };
        assert!(db.update_product(product.id, other, &update).await.unwrap().is_none());
        assert!(db.delete_product(product.id, other).await.unwrap().is_none());

        let updated = db.update_product(product.id, owner, &update).await.unwrap().unwrap();
        assert_eq!(updated.title, "Stolen");
        assert_eq!(updated.image_path, "img.png");
    }

    #[tokio::test]
    async fn test_list_products_pages() {
        let db = InMemoryDatabase::new();
        for i in 0..8 {
            db.create_product(UserId::new(1), &new_product(&format!("P{i}")))
                .await
                .unwrap();
        }

        let (first, total) = db.list_products(Page::products(Some(1))).await.unwrap();
        let (second, _) = db.list_products(Page::products(Some(2))).await.unwrap();
        assert_eq!(total, 8);
        assert_eq!(first.len(), 6);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].title, "P6");
    }
}
