//! Catalog, cart and order route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;

use emporium_core::{OrderId, Price, ProductId};

use crate::db::RepositoryError;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{PageContext, RequireAuth, push_flash};
use crate::models::{CartLine, FlashMessage, Order, Page, Product};
use crate::state::AppState;

// =============================================================================
// Form / Query Types
// =============================================================================

/// `?page=` on product listings. Unparsable values fall back to page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// A form naming one product.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductIdForm {
    #[serde(rename = "productId")]
    pub product_id: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Links for a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub last: u32,
}

impl Pagination {
    #[must_use]
    pub fn new(page: Page, total: i64) -> Self {
        Self {
            current: page.number,
            last: page.last_page(total),
        }
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.current > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current < self.last
    }

    #[must_use]
    pub const fn previous(&self) -> u32 {
        self.current.saturating_sub(1)
    }

    #[must_use]
    pub const fn next(&self) -> u32 {
        self.current.saturating_add(1)
    }
}

/// Product listing template, used for `/` and `/products`.
#[derive(Template, WebTemplate)]
#[template(path = "shop/product_list.html")]
pub struct ProductListTemplate {
    pub page: PageContext,
    pub title: &'static str,
    pub path: &'static str,
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/product_detail.html")]
pub struct ProductDetailTemplate {
    pub page: PageContext,
    pub product: Product,
}

/// Cart template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/cart.html")]
pub struct CartTemplate {
    pub page: PageContext,
    pub lines: Vec<CartLine>,
    pub total: Price,
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/orders.html")]
pub struct OrdersTemplate {
    pub page: PageContext,
    pub orders: Vec<Order>,
}

/// Order detail (invoice) template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/order_detail.html")]
pub struct OrderDetailTemplate {
    pub page: PageContext,
    pub order: Order,
}

fn parse_product_id(raw: &str) -> Result<ProductId> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("product {raw}")))
}

async fn product_list(
    state: &AppState,
    page: PageContext,
    query: PageQuery,
    title: &'static str,
    path: &'static str,
) -> Result<ProductListTemplate> {
    let requested = Page::products(query.page.as_deref().and_then(|p| p.trim().parse().ok()));
    let (products, total) = state.catalog().list_products(requested).await?;

    Ok(ProductListTemplate {
        page,
        title,
        path,
        products,
        pagination: Pagination::new(requested, total),
    })
}

// =============================================================================
// Catalog
// =============================================================================

/// Shop front page.
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    product_list(&state, page, query, "Shop", "/").await
}

/// All products.
pub async fn products(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    product_list(&state, page, query, "All Products", "/products").await
}

/// One product.
pub async fn product_detail(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_product_id(&id)?;
    let product = state
        .catalog()
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ProductDetailTemplate { page, product })
}

// =============================================================================
// Cart
// =============================================================================

/// Show the cart.
pub async fn cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let lines = state.carts().cart_lines(user.id).await?;
    let total: Price = lines.iter().map(CartLine::line_total).sum();

    Ok(CartTemplate { page, lines, total })
}

/// Add one unit of a product to the cart.
pub async fn add_to_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProductIdForm>,
) -> Result<Redirect> {
    let product_id = parse_product_id(&form.product_id)?;
    state
        .carts()
        .add_to_cart(user.id, product_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound(format!("product {product_id}")),
            other => AppError::Database(other),
        })?;

    Ok(Redirect::to("/cart"))
}

/// Remove a product's line from the cart.
pub async fn delete_cart_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProductIdForm>,
) -> Result<Redirect> {
    let product_id = parse_product_id(&form.product_id)?;
    state.carts().remove_from_cart(user.id, product_id).await?;
    Ok(Redirect::to("/cart"))
}

// =============================================================================
// Orders
// =============================================================================

/// Turn the cart into an order.
pub async fn create_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Redirect> {
    let Some(order) = state.orders().place_order(&user).await? else {
        push_flash(&session, FlashMessage::error("Your cart is empty.")).await?;
        return Ok(Redirect::to("/cart"));
    };

    let order_id = order.id.to_string();
    let total = order.total().to_string();
    add_breadcrumb(
        "checkout",
        "Placed order",
        &[("order_id", &order_id), ("total", &total)],
    );
    tracing::info!(order_id = %order.id, user_id = %user.id, total = %total, "order placed");

    Ok(Redirect::to("/orders"))
}

/// The user's orders.
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let orders = state.orders().orders_for_user(user.id).await?;
    Ok(OrdersTemplate { page, orders })
}

/// One order of the current user.
pub async fn order_detail(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id: OrderId = id
        .parse()
        .map_err(|_| AppError::NotFound(format!("order {id}")))?;
    let order = state
        .orders()
        .find_order(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    Ok(OrderDetailTemplate { page, order })
}
