//! Cart and order domain types.

use chrono::{DateTime, Utc};

use emporium_core::{Email, OrderId, Price, ProductId, UserId};

use super::Product;

/// One line of a user's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: i32,
}

impl CartLine {
    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// A placed order. Items are snapshots, so later catalog edits or deletions
/// do not change past orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub email: Email,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Sum of all item totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// A product snapshot inside an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub title: String,
    pub unit_price: Price,
    pub quantity: i32,
}

impl OrderItem {
    /// Price of the whole item.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: Some(line.product.id),
            title: line.product.title.clone(),
            unit_price: line.product.price,
            quantity: line.quantity,
        }
    }
}
