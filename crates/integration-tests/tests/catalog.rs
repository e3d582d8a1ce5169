//! Integration tests for catalog administration.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`bazaar-cli migrate`)
//! - The server running (cargo run -p bazaar-server)
//!
//! Run with: cargo test -p bazaar-integration-tests -- --ignored

use bazaar_integration_tests::{admin, create_product, expect_data, expect_error, unique, url};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn create_category(admin: &Client, parent_id: Option<&Value>) -> Value {
    let resp = admin
        .post(url("/api/categories"))
        .json(&json!({"name": unique("Category"), "parent_id": parent_id}))
        .send()
        .await
        .expect("Failed to create category");
    expect_data(resp, StatusCode::CREATED).await
}

// ============================================================================
// Products
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_duplicate_slug_rejected() {
    let (admin, _) = admin().await;
    let product = create_product(&admin, "10.00", 5).await;

    let resp = admin
        .post(url("/api/products"))
        .json(&json!({
            "name": "Another",
            "slug": product["slug"],
            "sku": unique("SKU"),
            "price": "12.00",
        }))
        .send()
        .await
        .expect("Failed to send");
    expect_error(resp, StatusCode::CONFLICT).await;
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_duplicate_sku_rejected() {
    let (admin, _) = admin().await;
    let product = create_product(&admin, "10.00", 5).await;

    let resp = admin
        .post(url("/api/products"))
        .json(&json!({
            "name": unique("Another"),
            "sku": product["sku"],
            "price": "12.00",
        }))
        .send()
        .await
        .expect("Failed to send");
    expect_error(resp, StatusCode::CONFLICT).await;
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_product_lookup_by_slug() {
    let (admin, _) = admin().await;
    let product = create_product(&admin, "19.99", 3).await;

    let resp = reqwest::get(url(&format!(
        "/api/products/slug/{}",
        product["slug"].as_str().unwrap()
    )))
    .await
    .expect("Failed to fetch product");
    let found = expect_data(resp, StatusCode::OK).await;
    assert_eq!(found["id"], product["id"]);
    assert_eq!(found["effective_price"], json!("19.99"));
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_shopper_cannot_create_products() {
    let (shopper, _) = bazaar_integration_tests::shopper().await;
    let resp = shopper
        .post(url("/api/products"))
        .json(&json!({"name": "Nope", "sku": unique("SKU"), "price": "1.00"}))
        .send()
        .await
        .expect("Failed to send");
    expect_error(resp, StatusCode::FORBIDDEN).await;
}

// ============================================================================
// Categories
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_soft_delete_category_with_products_rejected() {
    let (admin, _) = admin().await;
    let category = create_category(&admin, None).await;

    let slug = unique("product");
    let resp = admin
        .post(url("/api/products"))
        .json(&json!({
            "name": slug,
            "sku": slug.to_uppercase(),
            "price": "5.00",
            "category_id": category["id"],
        }))
        .send()
        .await
        .expect("Failed to create product");
    expect_data(resp, StatusCode::CREATED).await;

    let resp = admin
        .delete(url(&format!("/api/categories/{}", category["id"])))
        .send()
        .await
        .expect("Failed to send");
    expect_error(resp, StatusCode::CONFLICT).await;
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_hard_delete_category_with_children_rejected() {
    let (admin, _) = admin().await;
    let parent = create_category(&admin, None).await;
    let child = create_category(&admin, Some(&parent["id"])).await;

    let resp = admin
        .delete(url(&format!("/api/categories/{}?hard=true", parent["id"])))
        .send()
        .await
        .expect("Failed to send");
    expect_error(resp, StatusCode::CONFLICT).await;

    // Deleting the leaf first unblocks the parent
    let resp = admin
        .delete(url(&format!("/api/categories/{}?hard=true", child["id"])))
        .send()
        .await
        .expect("Failed to send");
    expect_data(resp, StatusCode::OK).await;

    let resp = admin
        .delete(url(&format!("/api/categories/{}?hard=true", parent["id"])))
        .send()
        .await
        .expect("Failed to send");
    expect_data(resp, StatusCode::OK).await;
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_category_cannot_become_its_own_ancestor() {
    let (admin, _) = admin().await;
    let parent = create_category(&admin, None).await;
    let child = create_category(&admin, Some(&parent["id"])).await;

    let resp = admin
        .put(url(&format!("/api/categories/{}", parent["id"])))
        .json(&json!({"name": parent["name"], "parent_id": child["id"]}))
        .send()
        .await
        .expect("Failed to send");
    expect_error(resp, StatusCode::BAD_REQUEST).await;
}
