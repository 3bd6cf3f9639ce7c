//! Integration tests for Gerinmah.
//!
//! The tests talk HTTP to a running server and, where they need to damage
//! data on purpose, to its database.
//!
//! # Running Tests
//!
//! ```bash
//! gm-cli migrate
//! cargo run -p gerinmah-storefront &
//! cargo test -p gerinmah-integration-tests -- --ignored
//! ```
//!
//! # Environment
//!
//! - `GERINMAH_TEST_URL` - server under test (default `http://127.0.0.1:5000`)
//! - `ADMIN_USERNAME` / `ADMIN_PASSWORD` - the server's configured admin
//! - `DATABASE_URL` - the server's database, for the backup tests
//! - `GERINMAH_PUBLIC_UPLOAD_DIR` - the server's served upload directory
//!
//! Every client sends its own `X-Forwarded-For` address so parallel tests
//! do not share a rate-limit bucket.

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("GERINMAH_TEST_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string())
}

/// `{base_url}{path}`
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// Client with a cookie jar and a random client address.
#[must_use]
pub fn client() -> Client {
    let mut rng = rand::rng();
    let ip = format!(
        "10.{}.{}.{}",
        rng.random_range(0..=255u8),
        rng.random_range(0..=255u8),
        rng.random_range(1..=254u8)
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&ip).expect("ip is a valid header"),
    );

    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// Short unique suffix for usernames, slugs and file names.
#[must_use]
pub fn unique() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// A registered customer and the client holding their session.
pub struct TestUser {
    pub client: Client,
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Register a new customer; the returned client is logged in.
pub async fn register_user() -> TestUser {
    let client = client();
    let suffix = unique();
    let username = format!("it_{suffix}");
    let email = format!("it_{suffix}@example.com");
    let password = format!("pw-{suffix}-long");

    let resp = client
        .post(url("/api/register"))
        .json(&json!({
            "username": username,
            "email": email,
            "password": password,
            "fullName": "Integration Tester",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Failed to parse user");

    TestUser {
        client,
        id: body["id"].as_i64().expect("user id"),
        username,
        email,
        password,
    }
}

/// Client holding an admin session opened with the configured credentials.
pub async fn admin_client() -> Client {
    let client = client();
    let username = std::env::var("ADMIN_USERNAME").expect("ADMIN_USERNAME must be set");
    let password = std::env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set");

    let resp = client
        .post(url("/api/admin/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to log in as admin");
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

/// Create a category and return its JSON.
pub async fn create_category(admin: &Client) -> Value {
    let slug = format!("it-{}", unique());
    let resp = admin
        .post(url("/api/categories"))
        .json(&json!({ "slug": slug, "nameMn": "Туршилт" }))
        .send()
        .await
        .expect("Failed to create category");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Failed to parse category")
}

/// Create an active product with `stock` units at `price`.
pub async fn create_product(admin: &Client, price: &str, stock: i32) -> Value {
    let form = Form::new()
        .text("nameMn", format!("Үхрийн мах {}", unique()))
        .text("price", price.to_string())
        .text("stock", stock.to_string())
        .text("unit", "кг");
    let resp = admin
        .post(url("/api/products"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Failed to parse product")
}

/// Upload an image to the media library and return the media JSON.
pub async fn upload_media(admin: &Client, bytes: Vec<u8>) -> Value {
    let part = Part::bytes(bytes)
        .file_name(format!("it-{}.png", unique()))
        .mime_str("image/png")
        .expect("valid mime");
    let form = Form::new().part("file", part).text("altText", "test image");
    let resp = admin
        .post(url("/api/media/upload"))
        .multipart(form)
        .send()
        .await
        .expect("Failed to upload");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Failed to parse media")
}

/// Current stock of a product, read through the public API.
pub async fn product_stock(client: &Client, id: i64) -> i64 {
    let product: Value = client
        .get(url(&format!("/api/products/{id}")))
        .send()
        .await
        .expect("Failed to get product")
        .json()
        .await
        .expect("Failed to parse product");
    product["stock"].as_i64().expect("stock")
}
