//! Catalog browsing, cart and orders over HTTP.

#![allow(clippy::unwrap_used)]

use emporium_core::{Price, ProductId, UserId};
use emporium_integration_tests::{TestApp, location};
use emporium_storefront::db::{CatalogStore, OrderStore};
use emporium_storefront::models::{NewProduct, Product};
use reqwest::StatusCode;

async fn seed_products(app: &TestApp, owner: UserId, count: usize) -> Vec<Product> {
    let mut products = Vec::new();
    for n in 1..=count {
        let product = app
            .store
            .create_product(
                owner,
                &NewProduct {
                    title: format!("Product {n}"),
                    price: Price::parse(&format!("{n}.50")).unwrap(),
                    description: format!("Description of product {n}"),
                    image_path: format!("product-{n}.png"),
                },
            )
            .await
            .unwrap();
        products.push(product);
    }
    products
}

fn card_count(body: &str) -> usize {
    body.matches("class=\"card product-item\"").count()
}

#[tokio::test]
async fn test_listing_is_paginated() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup_and_login("owner@example.com").await;
    let owner = app.user("owner@example.com").await;
    seed_products(&app, owner.id, 7).await;

    let (status, body) = browser.page("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card_count(&body), 6);
    assert!(body.contains("/?page=2"));

    let (_, body) = browser.page("/products?page=2").await;
    assert_eq!(card_count(&body), 1);
    assert!(body.contains("/products?page=1"));

    // Garbage falls back to the first page
    let (status, body) = browser.page("/products?page=abc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card_count(&body), 6);
}

#[tokio::test]
async fn test_empty_catalog() {
    let app = TestApp::spawn().await;
    let (status, body) = app.browser().page("/products").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No Products Found!"));
    assert!(!body.contains("class=\"pagination\""));
}

#[tokio::test]
async fn test_product_detail() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup_and_login("owner@example.com").await;
    let owner = app.user("owner@example.com").await;
    let products = seed_products(&app, owner.id, 1).await;
    let product = products.first().unwrap();

    let (status, body) = app.browser().page(&format!("/products/{}", product.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Product 1"));
    assert!(body.contains("$1.50"));
    assert!(body.contains("/images/product-1.png"));
    // Anonymous visitors get no cart form
    assert!(!body.contains("action=\"/cart\""));

    let (_, body) = browser.page(&format!("/products/{}", product.id)).await;
    assert!(body.contains("action=\"/cart\""));

    let (status, _) = browser.page("/products/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = browser.page("/products/not-a-number").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_add_and_remove() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup_and_login("buyer@example.com").await;
    let buyer = app.user("buyer@example.com").await;
    let products = seed_products(&app, buyer.id, 2).await;
    let first = products.first().unwrap().id.to_string();
    let second = products.get(1).unwrap().id.to_string();

    for id in [&first, &first, &second] {
        let response = browser.post_form("/cart", &[("productId", id)]).await;
        assert_eq!(location(&response), Some("/cart"));
    }

    let (status, body) = browser.page("/cart").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Quantity: 2"));
    assert!(body.contains("Quantity: 1"));
    // 2 x 1.50 + 2.50
    assert!(body.contains("Total: $5.50"));

    let response = browser
        .post_form("/cart-delete-item", &[("productId", &first)])
        .await;
    assert_eq!(location(&response), Some("/cart"));
    let (_, body) = browser.page("/cart").await;
    assert!(!body.contains("Product 1"));
    assert!(body.contains("Total: $2.50"));

    let response = browser
        .post_form("/cart-delete-item", &[("productId", &second)])
        .await;
    assert_eq!(location(&response), Some("/cart"));
    let (_, body) = browser.page("/cart").await;
    assert!(body.contains("No Products in Cart!"));
}

#[tokio::test]
async fn test_add_unknown_product_to_cart() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup_and_login("buyer@example.com").await;

    let response = browser.post_form("/cart", &[("productId", "4242")]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_anonymous_cart_post_redirects_to_login() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = browser.post_form("/cart", &[("productId", "1")]).await;
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn test_order_from_cart() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup_and_login("buyer@example.com").await;
    let buyer = app.user("buyer@example.com").await;
    let products = seed_products(&app, buyer.id, 1).await;
    let product_id = products.first().unwrap().id.to_string();

    browser.post_form("/cart", &[("productId", &product_id)]).await;
    browser.post_form("/cart", &[("productId", &product_id)]).await;

    let response = browser.post_form("/create-order", &[]).await;
    assert_eq!(location(&response), Some("/orders"));

    let (_, body) = browser.page("/cart").await;
    assert!(body.contains("No Products in Cart!"));

    let orders = app.store.orders_for_user(buyer.id).await.unwrap();
    let order = orders.first().unwrap();
    assert_eq!(order.total().to_string(), "$3.00");

    let (status, body) = browser.page("/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Product 1 (2)"));
    assert!(body.contains(&format!("/orders/{}", order.id)));

    let (status, body) = browser.page(&format!("/orders/{}", order.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Invoice"));
    assert!(body.contains("buyer@example.com"));
    assert!(body.contains("Total Price: $3.00"));
}

#[tokio::test]
async fn test_orders_are_private() {
    let app = TestApp::spawn().await;
    let buyer = app.browser();
    let snoop = app.browser();
    buyer.signup_and_login("buyer@example.com").await;
    snoop.signup_and_login("snoop@example.com").await;
    let buyer_id = app.user("buyer@example.com").await.id;
    let products = seed_products(&app, buyer_id, 1).await;

    buyer
        .post_form("/cart", &[("productId", &products.first().unwrap().id.to_string())])
        .await;
    buyer.post_form("/create-order", &[]).await;
    let order = app.store.orders_for_user(buyer_id).await.unwrap();
    let order_id = order.first().unwrap().id;

    let (status, _) = snoop.page(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = snoop.page("/orders").await;
    assert!(body.contains("Nothing there!"));
}

#[tokio::test]
async fn test_empty_cart_cannot_be_ordered() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup_and_login("buyer@example.com").await;

    let response = browser.post_form("/create-order", &[]).await;
    assert_eq!(location(&response), Some("/cart"));
    let (_, body) = browser.page("/cart").await;
    assert!(body.contains("Your cart is empty."));

    let buyer = app.user("buyer@example.com").await;
    assert!(app.store.orders_for_user(buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_order_survives_product_deletion() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    browser.signup_and_login("buyer@example.com").await;
    let buyer = app.user("buyer@example.com").await;
    let products = seed_products(&app, buyer.id, 1).await;
    let product_id: ProductId = products.first().unwrap().id;

    browser
        .post_form("/cart", &[("productId", &product_id.to_string())])
        .await;
    browser.post_form("/create-order", &[]).await;
    app.store.delete_product(product_id, buyer.id).await.unwrap();

    let order = app.store.orders_for_user(buyer.id).await.unwrap();
    let (status, body) = browser
        .page(&format!("/orders/{}", order.first().unwrap().id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Product 1"));
}
