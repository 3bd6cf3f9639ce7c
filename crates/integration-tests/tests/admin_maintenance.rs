//! Integration tests for uploads, bank accounts and table backups.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`gm-cli migrate`)
//! - The storefront running (`cargo run -p gerinmah-storefront`)
//! - `ADMIN_USERNAME` / `ADMIN_PASSWORD` matching the server's
//! - `DATABASE_URL` for the backup test, `GERINMAH_PUBLIC_UPLOAD_DIR` for
//!   the served-directory test
//!
//! Run with: cargo test -p gerinmah-integration-tests -- --ignored

#![allow(clippy::expect_used)]

use std::path::PathBuf;

use gerinmah_integration_tests::{admin_client, client, create_category, unique, upload_media, url};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;

/// Minimal PNG signature plus a marker so each upload is distinct.
fn image_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    bytes.extend_from_slice(unique().as_bytes());
    bytes
}

async fn fetch(client: &Client, path: &str) -> (StatusCode, Vec<u8>) {
    let resp = client.get(url(path)).send().await.expect("fetch");
    let status = resp.status();
    let body = resp.bytes().await.expect("body").to_vec();
    (status, body)
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_uploaded_file_is_served_back() {
    let admin = admin_client().await;
    let bytes = image_bytes();
    let media = upload_media(&admin, bytes.clone()).await;
    let path = media["url"].as_str().expect("url").to_string();
    assert!(path.starts_with("/uploads/"));

    let (status, body) = fetch(&client(), &path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, bytes);
}

#[tokio::test]
#[ignore = "Requires running storefront, database and GERINMAH_PUBLIC_UPLOAD_DIR"]
async fn test_upload_survives_served_dir_wipe() {
    let public_dir = PathBuf::from(
        std::env::var("GERINMAH_PUBLIC_UPLOAD_DIR").expect("GERINMAH_PUBLIC_UPLOAD_DIR must be set"),
    );
    let admin = admin_client().await;
    let bytes = image_bytes();
    let media = upload_media(&admin, bytes.clone()).await;
    let filename = media["filename"].as_str().expect("filename").to_string();

    std::fs::remove_file(public_dir.join(&filename)).expect("remove served copy");

    // Reconciliation copies it back
    let report: Value = admin
        .post(url("/api/admin/uploads/sync"))
        .send()
        .await
        .expect("sync")
        .json()
        .await
        .expect("json");
    assert!(report["restored"].as_u64().expect("restored") >= 1);

    let (status, body) = fetch(&client(), &format!("/uploads/{filename}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, bytes);

    // A request alone heals a missing served copy too
    std::fs::remove_file(public_dir.join(&filename)).expect("remove served copy");
    let (status, body) = fetch(&client(), &format!("/uploads/{filename}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, bytes);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_unknown_or_unsafe_upload_names_are_not_found() {
    let client = client();
    let (status, _) = fetch(&client, &format!("/uploads/{}.png", unique())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = fetch(&client, "/uploads/.env").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Bank accounts
// ============================================================================

async fn create_account(admin: &Client, is_default: bool) -> i64 {
    let resp = admin
        .post(url("/api/bank-accounts"))
        .json(&json!({
            "bankName": "Хаан банк",
            "accountNumber": format!("5000{}", rand_digits()),
            "accountHolder": "Gerinmah LLC",
            "isDefault": is_default,
        }))
        .send()
        .await
        .expect("create account");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let account: Value = resp.json().await.expect("json");
    account["id"].as_i64().expect("id")
}

fn rand_digits() -> String {
    unique().bytes().map(|b| char::from(b'0' + b % 10)).collect()
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_setting_default_bank_account_unsets_previous() {
    let admin = admin_client().await;
    let first = create_account(&admin, true).await;
    let second = create_account(&admin, false).await;

    let default: Value = admin
        .get(url("/api/bank-accounts/default"))
        .send()
        .await
        .expect("default")
        .json()
        .await
        .expect("json");
    assert_eq!(default["id"], first);

    let resp = admin
        .post(url(&format!("/api/bank-accounts/{second}/default")))
        .send()
        .await
        .expect("set default");
    assert_eq!(resp.status(), StatusCode::OK);

    let accounts: Value = admin
        .get(url("/api/bank-accounts"))
        .send()
        .await
        .expect("list")
        .json()
        .await
        .expect("json");
    let defaults: Vec<&Value> = accounts
        .as_array()
        .expect("array")
        .iter()
        .filter(|a| a["isDefault"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults.first().expect("one default")["id"], second);
}

// ============================================================================
// Backup / restore
// ============================================================================

fn table_report<'a>(reports: &'a Value, table: &str) -> &'a Value {
    reports["tables"]
        .as_array()
        .expect("tables")
        .iter()
        .find(|r| r["table"] == table)
        .expect("table in report")
}

#[tokio::test]
#[ignore = "Requires running storefront, database and DATABASE_URL"]
async fn test_restore_brings_back_deleted_rows_once() {
    let pool = PgPool::connect(&std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"))
        .await
        .expect("connect");
    let admin = admin_client().await;
    let category = create_category(&admin).await;
    let id = category["id"].as_i64().expect("id");

    let backup: Value = admin
        .post(url("/api/admin/backup"))
        .send()
        .await
        .expect("backup")
        .json()
        .await
        .expect("json");
    assert_eq!(backup["success"], true);

    sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(i32::try_from(id).expect("i32 id"))
        .execute(&pool)
        .await
        .expect("delete category");

    let restore: Value = admin
        .post(url("/api/admin/restore"))
        .send()
        .await
        .expect("restore")
        .json()
        .await
        .expect("json");
    let categories = table_report(&restore, "categories");
    assert_eq!(categories["status"], "restored");
    assert!(categories["inserted"].as_u64().expect("inserted") >= 1);

    let slug: String = sqlx::query_scalar("SELECT slug FROM categories WHERE id = $1")
        .bind(i32::try_from(id).expect("i32 id"))
        .fetch_one(&pool)
        .await
        .expect("restored row");
    assert_eq!(slug, category["slug"].as_str().expect("slug"));

    let again: Value = admin
        .post(url("/api/admin/restore"))
        .send()
        .await
        .expect("restore")
        .json()
        .await
        .expect("json");
    assert_eq!(table_report(&again, "categories")["inserted"], 0);
}
