//! Seed the catalog with demo products.
//!
//! Products are attached to an owner account so they show up under that
//! user's admin pages. The images are not shipped; drop files with the listed
//! names into the upload directory to see them.

use emporium_core::{Email, Price};
use emporium_storefront::db::{CatalogStore, PgStore, UserStore};
use emporium_storefront::models::NewProduct;
use emporium_storefront::services::auth::AuthService;

use super::{CommandError, connect};

/// Title, price, description and image file of each demo product.
const DEMO_PRODUCTS: &[(&str, &str, &str, &str)] = &[
    (
        "Red Notebook",
        "12.99",
        "A hardcover notebook with 200 dotted pages.",
        "demo-notebook.png",
    ),
    (
        "Fountain Pen",
        "34.50",
        "Steel nib, converter included. Writes smooth and wet.",
        "demo-pen.png",
    ),
    (
        "Desk Lamp",
        "49.00",
        "Warm white LED lamp with an adjustable arm.",
        "demo-lamp.png",
    ),
    (
        "Coffee Mug",
        "9.95",
        "Stoneware mug that holds a generous 350 ml.",
        "demo-mug.png",
    ),
    (
        "Canvas Tote",
        "15.00",
        "Heavy canvas bag with an inner pocket.",
        "demo-tote.png",
    ),
    (
        "Wall Clock",
        "27.75",
        "Silent sweep movement in a beech frame.",
        "demo-clock.png",
    ),
    (
        "Plant Pot",
        "18.20",
        "Glazed ceramic pot with a drainage saucer.",
        "demo-pot.png",
    ),
];

/// Create the demo products, creating the owner first if needed.
///
/// # Errors
///
/// Returns an error if the email is invalid, the owner does not exist and no
/// password was given, or a database operation fails.
pub async fn demo_products(owner_email: &str, password: Option<&str>) -> Result<(), CommandError> {
    let email = Email::parse(owner_email)
        .map_err(|e| CommandError::InvalidArgument(format!("invalid owner email: {e}")))?;

    let store = PgStore::new(connect().await?);

    let owner = match store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            let password = password.ok_or_else(|| {
                CommandError::InvalidArgument(format!(
                    "no user {email}; pass --password to create one"
                ))
            })?;
            tracing::info!(%email, "Creating owner account");
            AuthService::new(&store)
                .signup(email.as_str(), password, password)
                .await?
        }
    };

    for (title, price, description, image) in DEMO_PRODUCTS {
        let price = Price::parse(price)
            .map_err(|e| CommandError::InvalidArgument(format!("{title}: {e}")))?;
        let product = store
            .create_product(
                owner.id,
                &NewProduct {
                    title: (*title).to_owned(),
                    price,
                    description: (*description).to_owned(),
                    image_path: (*image).to_owned(),
                },
            )
            .await?;
        tracing::info!(product_id = %product.id, title, "Created product");
    }

    tracing::info!(
        count = DEMO_PRODUCTS.len(),
        owner = %owner.email,
        "Seeding complete!"
    );
    Ok(())
}
