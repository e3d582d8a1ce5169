//! Integration test helpers for Bazaar.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and apply migrations
//! cargo run -p bazaar-cli -- migrate
//!
//! # Start the server
//! cargo run -p bazaar-server
//!
//! # Run integration tests
//! cargo test -p bazaar-integration-tests -- --ignored
//! ```
//!
//! Tests talk to the server over HTTP. `DATABASE_URL` is used only to
//! promote freshly registered users to admin, since admins cannot be
//! created through the API.
//!
//! Auth endpoints are rate limited per IP; registration waits and retries
//! when the limiter answers 429.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

/// Base URL of the running server (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("BAZAAR_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Absolute URL for an API path such as `/api/products`.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// A short unique suffix for emails, slugs and SKUs.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..10])
}

/// Client with its own cookie jar.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the test database.
pub async fn pool() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to database")
}

/// Assert the status and return the `data` field of the success envelope.
pub async fn expect_data(resp: Response, status: StatusCode) -> Value {
    let actual = resp.status();
    let body: Value = resp.json().await.expect("Response is not JSON");
    assert_eq!(actual, status, "unexpected status, body: {body}");
    assert_eq!(body["success"], json!(true), "body: {body}");
    body["data"].clone()
}

/// Assert an error status and return the error envelope.
pub async fn expect_error(resp: Response, status: StatusCode) -> Value {
    let actual = resp.status();
    let body: Value = resp.json().await.expect("Response is not JSON");
    assert_eq!(actual, status, "unexpected status, body: {body}");
    assert_eq!(body["success"], json!(false), "body: {body}");
    body
}

const REGISTER_ATTEMPTS: u32 = 10;

/// The auth limiter refills one request every six seconds.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(6);

/// Register a fresh shopper and return the logged-in client and user.
pub async fn shopper() -> (Client, Value) {
    let client = client();
    let email = format!("{}@example.com", unique("shopper"));
    let body = json!({
        "name": "Test Shopper",
        "email": email,
        "password": "correct horse battery",
    });

    for _ in 0..REGISTER_ATTEMPTS {
        let resp = client
            .post(url("/api/auth/register"))
            .json(&body)
            .send()
            .await
            .expect("Failed to register");
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
            continue;
        }
        let user = expect_data(resp, StatusCode::CREATED).await;
        return (client, user);
    }
    panic!("registration still rate limited after {REGISTER_ATTEMPTS} attempts");
}

/// Register a fresh user and promote it to admin.
pub async fn admin() -> (Client, Value) {
    let (client, user) = shopper().await;
    let pool = pool().await;
    sqlx::query("UPDATE shop.users SET role = 'admin' WHERE id = $1")
        .bind(user["id"].as_i64().unwrap())
        .execute(&pool)
        .await
        .expect("Failed to promote user");
    (client, user)
}

/// Create an active product through the admin API.
pub async fn create_product(admin: &Client, price: &str, stock: i32) -> Value {
    let slug = unique("product");
    let resp = admin
        .post(url("/api/products"))
        .json(&json!({
            "name": format!("Test {slug}"),
            "slug": slug,
            "sku": slug.to_uppercase(),
            "price": price,
            "stock": stock,
        }))
        .send()
        .await
        .expect("Failed to create product");
    expect_data(resp, StatusCode::CREATED).await
}

/// Put a product in the shopper's cart.
pub async fn add_to_cart(shopper: &Client, product_id: &Value, quantity: i32) -> Value {
    let resp = shopper
        .post(url("/api/cart/items"))
        .json(&json!({"product_id": product_id, "quantity": quantity}))
        .send()
        .await
        .expect("Failed to add to cart");
    expect_data(resp, StatusCode::OK).await
}

/// A valid checkout body.
#[must_use]
pub fn checkout_body() -> Value {
    json!({
        "shipping_address": {
            "recipient": "Test Shopper",
            "line1": "1 Market Street",
            "city": "Springfield",
            "postal_code": "12345",
            "country": "US",
        },
        "payment_method": "card",
    })
}

/// A money value from the API (serialized as a decimal string) in cents.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn cents(value: &Value) -> i64 {
    let amount = value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| value.as_f64())
        .unwrap_or_else(|| panic!("not a money value: {value}"));
    (amount * 100.0).round() as i64
}
