//! Product administration route handlers.
//!
//! Every route requires a logged-in user, and a product can only be edited or
//! deleted by the user who created it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;

use emporium_core::{Price, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::{PageContext, RequireAuth};
use crate::models::{NewProduct, Product, ProductUpdate, User};
use crate::routes::shop::ProductIdForm;
use crate::services::uploads::{ProductForm, remove_image};
use crate::services::validation::{self, Field, ValidationErrors};
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Values shown in the product form.
#[derive(Debug, Clone, Default)]
pub struct ProductFormValues {
    pub product_id: Option<ProductId>,
    pub title: String,
    pub price: String,
    pub description: String,
}

impl From<&Product> for ProductFormValues {
    fn from(product: &Product) -> Self {
        Self {
            product_id: Some(product.id),
            title: product.title.clone(),
            price: product.price.amount().to_string(),
            description: product.description.clone(),
        }
    }
}

/// Add/edit product template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/edit_product.html")]
pub struct EditProductTemplate {
    pub page: PageContext,
    pub editing: bool,
    pub values: ProductFormValues,
    pub error: Option<String>,
    pub invalid_fields: Vec<&'static str>,
}

/// The current user's products.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products.html")]
pub struct AdminProductsTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
}

impl EditProductTemplate {
    fn is_invalid(&self, field: &str) -> bool {
        self.invalid_fields.iter().any(|f| *f == field)
    }
}

/// Validated text fields of a product form.
struct ValidProduct {
    title: String,
    price: Price,
    description: String,
}

fn validate_product(
    form: &ProductForm,
    require_image: bool,
) -> std::result::Result<ValidProduct, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    validation::check_title(&mut errors, form.field("title"));
    let price = validation::check_price(&mut errors, form.field("price"));
    validation::check_description(&mut errors, form.field("description"));
    if require_image && form.image.is_none() {
        errors.push(Field::Image, "Attached file is not an image.");
    }

    let Some(price) = price.filter(|_| errors.is_empty()) else {
        return Err(errors);
    };
    Ok(ValidProduct {
        title: form.field("title").trim().to_owned(),
        price,
        description: form.field("description").trim().to_owned(),
    })
}

/// Re-render the form with status 422, dropping any image stored for the
/// rejected submission.
async fn reject_product_form(
    state: &AppState,
    session: &Session,
    user: User,
    form: &ProductForm,
    editing: bool,
    errors: &ValidationErrors,
) -> Result<Response> {
    if let Some(image) = &form.image {
        remove_image(&state.config().upload_dir, &image.file_name).await;
    }

    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        EditProductTemplate {
            page: PageContext::load(session, Some(user)).await?,
            editing,
            values: ProductFormValues {
                product_id: form.field("productId").parse().ok(),
                title: form.field("title").to_owned(),
                price: form.field("price").to_owned(),
                description: form.field("description").to_owned(),
            },
            error: errors.first_message().map(str::to_owned),
            invalid_fields: errors.field_names(),
        },
    )
        .into_response())
}

// =============================================================================
// Add / List
// =============================================================================

/// Display the empty product form.
pub async fn add_product_page(
    RequireAuth(_user): RequireAuth,
    page: PageContext,
) -> impl IntoResponse {
    EditProductTemplate {
        page,
        editing: false,
        values: ProductFormValues::default(),
        error: None,
        invalid_fields: Vec::new(),
    }
}

/// Create a product from the multipart form.
pub async fn add_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    form: ProductForm,
) -> Result<Response> {
    let valid = match validate_product(&form, true) {
        Ok(valid) => valid,
        Err(errors) => {
            return reject_product_form(&state, &session, user, &form, false, &errors).await;
        }
    };
    let Some(image) = form.image else {
        return Err(AppError::Internal("validated product form without image".to_owned()));
    };

    let product = state
        .catalog()
        .create_product(
            user.id,
            &NewProduct {
                title: valid.title,
                price: valid.price,
                description: valid.description,
                image_path: image.file_name,
            },
        )
        .await?;

    tracing::info!(product_id = %product.id, user_id = %user.id, "product created");
    Ok(Redirect::to("/admin/products").into_response())
}

/// The current user's products.
pub async fn products(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let products = state.catalog().products_by_owner(user.id).await?;
    Ok(AdminProductsTemplate { page, products })
}

// =============================================================================
// Edit
// =============================================================================

/// Display the form for an owned product. Anything else goes home.
pub async fn edit_product_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
    Path(id): Path<String>,
) -> Result<Response> {
    let Ok(id) = id.parse::<ProductId>() else {
        return Ok(Redirect::to("/").into_response());
    };
    let product = state.catalog().find_product(id).await?;

    match product {
        Some(product) if product.owner_id == user.id => Ok(EditProductTemplate {
            page,
            editing: true,
            values: ProductFormValues::from(&product),
            error: None,
            invalid_fields: Vec::new(),
        }
        .into_response()),
        _ => Ok(Redirect::to("/").into_response()),
    }
}

/// Apply an edit. A new image replaces the old file.
pub async fn edit_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    form: ProductForm,
) -> Result<Response> {
    let upload_dir = &state.config().upload_dir;

    let Ok(id) = form.field("productId").parse::<ProductId>() else {
        if let Some(image) = &form.image {
            remove_image(upload_dir, &image.file_name).await;
        }
        return Ok(Redirect::to("/").into_response());
    };

    let valid = match validate_product(&form, false) {
        Ok(valid) => valid,
        Err(errors) => {
            return reject_product_form(&state, &session, user, &form, true, &errors).await;
        }
    };

    let Some(previous) = state
        .catalog()
        .find_product(id)
        .await?
        .filter(|p| p.owner_id == user.id)
    else {
        if let Some(image) = &form.image {
            remove_image(upload_dir, &image.file_name).await;
        }
        return Ok(Redirect::to("/").into_response());
    };

    let new_image = form.image.map(|image| image.file_name);
    let updated = state
        .catalog()
        .update_product(
            id,
            user.id,
            &ProductUpdate {
                title: valid.title,
                price: valid.price,
                description: valid.description,
                image_path: new_image.clone(),
            },
        )
        .await?;

    match (updated, new_image) {
        (Some(_), Some(_)) => remove_image(upload_dir, &previous.image_path).await,
        (None, Some(orphan)) => remove_image(upload_dir, &orphan).await,
        _ => {}
    }

    tracing::info!(product_id = %id, user_id = %user.id, "product updated");
    Ok(Redirect::to("/admin/products").into_response())
}

// =============================================================================
// Delete
// =============================================================================

async fn delete_owned_product(
    state: &AppState,
    user_id: emporium_core::UserId,
    id: ProductId,
) -> Result<bool> {
    let Some(product) = state.catalog().delete_product(id, user_id).await? else {
        return Ok(false);
    };

    remove_image(&state.config().upload_dir, &product.image_path).await;
    tracing::info!(product_id = %id, user_id = %user_id, "product deleted");
    Ok(true)
}

/// Delete from the admin list form.
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProductIdForm>,
) -> Result<Redirect> {
    let Ok(id) = form.product_id.parse::<ProductId>() else {
        return Ok(Redirect::to("/"));
    };

    if delete_owned_product(&state, user.id, id).await? {
        Ok(Redirect::to("/admin/products"))
    } else {
        Ok(Redirect::to("/"))
    }
}

/// Delete from a script; answers JSON.
pub async fn delete_product_json(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<ProductId>() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Product not found." })),
        )
            .into_response();
    };

    match delete_owned_product(&state, user.id, id).await {
        Ok(true) => Json(json!({ "message": "Success!" })).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Product not found." })),
        )
            .into_response(),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                product_id = %id,
                sentry_event_id = %event_id,
                "deleting product failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Deleting product failed!" })),
            )
                .into_response()
        }
    }
}
