//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready      - Liveness / DB readiness
//!
//! # Auth (rate limited)
//! POST /api/register, /api/login, /api/logout     GET /api/user
//! GET  /api/auth/google, /api/auth/google/callback
//! POST /api/admin/login, /api/admin/logout        GET /api/admin/status
//!
//! # Catalog
//! /api/products[/{id}[/stock|/reviews]]   /api/categories[/{id}]
//!
//! # Orders
//! /api/orders[/{id}[/status]]             GET /api/admin/orders/pending-count
//!
//! # CMS
//! /api/content, /api/settings, /api/footer, /api/navigation,
//! /api/media, /api/bank-accounts
//!
//! # Stores, reviews, delivery calendar, meal kits
//! /api/service-categories, /api/stores, /api/admin/reviews, /api/reviews/{id},
//! /api/delivery-settings, /api/non-delivery-days,
//! /api/meal-kits, /api/generated-meal-kits
//!
//! # Jobs
//! POST /api/admin/backup, /api/admin/restore, /api/admin/uploads/sync
//! GET  /api/admin/backup/status
//!
//! GET  /uploads/{name}             - Served upload, reconciled on miss
//! ```

pub mod admin;
pub mod auth;
pub mod bank_accounts;
pub mod catalog;
pub mod content;
pub mod delivery;
pub mod health;
pub mod meal_kits;
pub mod media;
pub mod orders;
pub mod reviews;
pub mod stores;
pub mod uploads;

use std::collections::HashMap;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, multipart::MultipartError},
    http::StatusCode,
};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::services::uploads::{MAX_UPLOAD_BYTES, UploadError};
use crate::state::AppState;

/// Request body limit for multipart uploads: the file plus form overhead.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Body of successful writes that have nothing else to return.
#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

pub(crate) const fn success() -> Json<Success> {
    Json(Success { success: true })
}

/// Body limit layer for routes that accept uploads.
pub(crate) fn upload_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)
}

/// A file part of a multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub original_name: String,
    pub bytes: Bytes,
}

/// A multipart body split into text fields and at most one file.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    /// Drain a multipart body. The first non-empty file part wins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upload(TooLarge)` when the body exceeds the limit
    /// and `AppError::BadRequest` for malformed bodies.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if let Some(original_name) = field.file_name().map(str::to_string) {
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if form.file.is_none() && !bytes.is_empty() {
                    form.file = Some(UploadedFile {
                        original_name,
                        bytes,
                    });
                }
            } else {
                let text = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    /// A text field, trimmed; blank counts as missing.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parse a text field.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the field if it does not parse.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.field(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| AppError::BadRequest(format!("{name} is invalid")))
            })
            .transpose()
    }

    /// Checkbox-style boolean: `true`, `on` and `1` are true.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.field(name)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "on" | "1"))
    }

    #[cfg(test)]
    pub(crate) fn with_fields(fields: &[(&str, &str)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            file: None,
        }
    }

    /// Take the file part, rejecting a body without one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upload(Empty)` if no file was sent.
    pub fn require_file(&mut self) -> Result<UploadedFile, AppError> {
        self.file.take().ok_or(AppError::Upload(UploadError::Empty))
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::Upload(UploadError::TooLarge {
            size: UPLOAD_BODY_LIMIT + 1,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    AppError::BadRequest(e.body_text())
}

/// Auth routes, behind the strict rate limiter.
fn auth_routes() -> Router<AppState> {
    auth::router().layer(auth_rate_limiter())
}

/// Everything else under `/api`, behind the general rate limiter.
fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(catalog::router())
        .merge(orders::router())
        .merge(content::router())
        .merge(media::router())
        .merge(bank_accounts::router())
        .merge(stores::router())
        .merge(reviews::router())
        .merge(delivery::router())
        .merge(meal_kits::router())
        .merge(admin::router())
        .layer(api_rate_limiter())
}

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth_routes())
        .merge(api_routes())
        .merge(uploads::router())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_missing() {
        let form = UploadForm::with_fields(&[("nameMn", "  Хонины мах "), ("nameRu", "   ")]);
        assert_eq!(form.field("nameMn"), Some("Хонины мах"));
        assert_eq!(form.field("nameRu"), None);
        assert_eq!(form.field("nameEn"), None);
    }

    #[test]
    fn test_parse_and_flag() {
        let form = UploadForm::with_fields(&[("stock", "12"), ("price", "abc"), ("isFeatured", "on")]);
        assert_eq!(form.parse::<i32>("stock").ok().flatten(), Some(12));
        assert!(form.parse::<i32>("price").is_err());
        assert_eq!(form.parse::<i32>("missing").ok().flatten(), None);
        assert_eq!(form.flag("isFeatured"), Some(true));
        assert_eq!(form.flag("isActive"), None);
    }

    #[test]
    fn test_missing_file_is_empty_upload() {
        let mut form = UploadForm::with_fields(&[]);
        assert!(matches!(
            form.require_file(),
            Err(AppError::Upload(UploadError::Empty))
        ));
    }
}
