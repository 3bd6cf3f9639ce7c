//! Integration tests for checkout and order access.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`gm-cli migrate`)
//! - The storefront running (`cargo run -p gerinmah-storefront`)
//! - `ADMIN_USERNAME` / `ADMIN_PASSWORD` matching the server's
//!
//! Run with: cargo test -p gerinmah-integration-tests -- --ignored

#![allow(clippy::expect_used)]

use gerinmah_integration_tests::{
    admin_client, client, create_product, product_stock, register_user, url,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn order_body(lines: &[(i64, i64)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(product, quantity)| json!({ "productId": product, "quantity": quantity }))
        .collect();
    json!({
        "customerName": "Бат",
        "customerPhone": "99112233",
        "deliveryAddress": "СБД, 1-р хороо",
        "items": items,
    })
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_order_decrements_stock_once_and_merges_lines() {
    let admin = admin_client().await;
    let first = create_product(&admin, "25000", 10).await;
    let second = create_product(&admin, "18000", 5).await;
    let first_id = first["id"].as_i64().expect("id");
    let second_id = second["id"].as_i64().expect("id");

    let user = register_user().await;
    let resp = user
        .client
        .post(url("/api/orders"))
        .json(&order_body(&[(first_id, 2), (second_id, 1), (first_id, 1)]))
        .send()
        .await
        .expect("create order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("json");

    let items = order["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["userId"], user.id);

    assert_eq!(product_stock(&user.client, first_id).await, 7);
    assert_eq!(product_stock(&user.client, second_id).await, 4);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_order_over_stock_is_rejected_without_side_effects() {
    let admin = admin_client().await;
    let product = create_product(&admin, "30000", 2).await;
    let id = product["id"].as_i64().expect("id");

    let resp = client()
        .post(url("/api/orders"))
        .json(&order_body(&[(id, 3)]))
        .send()
        .await
        .expect("create order");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(product_stock(&admin, id).await, 2);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_orders_are_private_to_their_owner() {
    let admin = admin_client().await;
    let product = create_product(&admin, "12000", 3).await;
    let id = product["id"].as_i64().expect("id");

    let owner = register_user().await;
    let order: Value = owner
        .client
        .post(url("/api/orders"))
        .json(&order_body(&[(id, 1)]))
        .send()
        .await
        .expect("create order")
        .json()
        .await
        .expect("json");
    let order_id = order["id"].as_i64().expect("order id");
    let path = format!("/api/orders/{order_id}");

    let resp = owner.client.get(url(&path)).send().await.expect("get");
    assert_eq!(resp.status(), StatusCode::OK);

    let other = register_user().await;
    let resp = other.client.get(url(&path)).send().await.expect("get");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let mine: Value = other
        .client
        .get(url("/api/orders"))
        .send()
        .await
        .expect("list")
        .json()
        .await
        .expect("json");
    assert!(mine.as_array().expect("array").is_empty());

    let resp = admin.get(url(&path)).send().await.expect("get");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_status_change_is_admin_only() {
    let admin = admin_client().await;
    let product = create_product(&admin, "9000", 1).await;
    let id = product["id"].as_i64().expect("id");

    let user = register_user().await;
    let order: Value = user
        .client
        .post(url("/api/orders"))
        .json(&order_body(&[(id, 1)]))
        .send()
        .await
        .expect("create order")
        .json()
        .await
        .expect("json");
    let path = format!("/api/orders/{}/status", order["id"]);

    let resp = user
        .client
        .patch(url(&path))
        .json(&json!({ "status": "confirmed" }))
        .send()
        .await
        .expect("patch");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let updated: Value = admin
        .patch(url(&path))
        .json(&json!({ "status": "confirmed" }))
        .send()
        .await
        .expect("patch")
        .json()
        .await
        .expect("json");
    assert_eq!(updated["status"], "confirmed");
}
