//! Catalog domain types.

use chrono::{DateTime, Utc};

use emporium_core::{Price, ProductId, UserId};

/// A product listed in the shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    /// The admin user who created the product and may edit it.
    pub owner_id: UserId,
    pub title: String,
    pub price: Price,
    pub description: String,
    /// File name of the product image inside the upload directory.
    pub image_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// URL the image is served from.
    #[must_use]
    pub fn image_url(&self) -> String {
        format!("/images/{}", self.image_path)
    }
}

/// Fields for a product being created.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub price: Price,
    pub description: String,
    pub image_path: String,
}

/// Fields for a product being edited. `image_path` is only replaced when a
/// new image was uploaded.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub title: String,
    pub price: Price,
    pub description: String,
    pub image_path: Option<String>,
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub per_page: u32,
}

impl Page {
    /// Products shown per catalog page.
    pub const PRODUCTS_PER_PAGE: u32 = 6;

    /// A catalog page; page numbers below 1 are clamped to 1.
    #[must_use]
    pub fn products(number: Option<u32>) -> Self {
        Self {
            number: number.unwrap_or(1).max(1),
            per_page: Self::PRODUCTS_PER_PAGE,
        }
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.number.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Rows to return.
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.per_page as i64
    }

    /// The last page number for `total` rows (at least 1).
    #[must_use]
    pub fn last_page(&self, total: i64) -> u32 {
        let per_page = i64::from(self.per_page.max(1));
        let pages = (total.max(0) + per_page - 1) / per_page;
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps_to_first() {
        assert_eq!(Page::products(Some(0)).number, 1);
        assert_eq!(Page::products(None).number, 1);
    }

    #[test]
    fn test_page_offset() {
        let page = Page::products(Some(3));
        assert_eq!(page.offset(), 12);
        assert_eq!(page.limit(), 6);
    }

    #[test]
    fn test_last_page() {
        let page = Page::products(Some(1));
        assert_eq!(page.last_page(0), 1);
        assert_eq!(page.last_page(6), 1);
        assert_eq!(page.last_page(7), 2);
        assert_eq!(page.last_page(13), 3);
    }
}
