//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error body is `{ "success": false, "message": "..." }` with a
//! Mongolian message. Internal details only reach the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::orders::OrderError;
use crate::models::DeliveryRejection;
use crate::services::auth::{AuthError, OAuthError};
use crate::services::backup::BackupError;
use crate::services::image_sync::ImageSyncError;
use crate::services::uploads::UploadError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Order creation or status change failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Google sign-in failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Upload rejected or not stored.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Backup or restore failed.
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Upload reconciliation failed.
    #[error("Image sync error: {0}")]
    ImageSync(#[from] ImageSyncError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const MSG_INTERNAL: &str = "Серверийн алдаа гарлаа. Дахин оролдоно уу";
const MSG_NOT_FOUND: &str = "Олдсонгүй";
const MSG_UNAUTHORIZED: &str = "Нэвтэрч орно уу";
const MSG_FORBIDDEN: &str = "Танд энэ үйлдлийг хийх эрх байхгүй";

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Order(err) => match err {
                OrderError::Repository(err) => repository_status(err),
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                // Duplicate registration is a plain validation failure
                AuthError::UsernameTaken
                | AuthError::EmailTaken
                | AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidUsername(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::OAuth(err) => match err {
                OAuthError::NotConfigured => StatusCode::NOT_FOUND,
                OAuthError::StateMismatch | OAuthError::Denied(_) | OAuthError::UnverifiedEmail => {
                    StatusCode::BAD_REQUEST
                }
                OAuthError::Http(_) | OAuthError::Api { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::Upload(err) => match err {
                UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::ImageSync(ImageSyncError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            Self::Backup(_) | Self::ImageSync(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Client-facing message. Never includes internal error text.
    fn message(&self) -> String {
        match self {
            Self::Database(err) => repository_message(err),
            Self::Order(err) => order_message(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => {
                    "Нэвтрэх нэр эсвэл нууц үг буруу байна".to_string()
                }
                AuthError::UsernameTaken => "Энэ хэрэглэгчийн нэр бүртгэлтэй байна".to_string(),
                AuthError::EmailTaken => "Энэ имэйл хаяг бүртгэлтэй байна".to_string(),
                AuthError::WeakPassword(_) => {
                    "Нууц үг 8-128 тэмдэгтийн урттай байх ёстой".to_string()
                }
                AuthError::InvalidEmail(_) => "Имэйл хаяг буруу байна".to_string(),
                AuthError::InvalidUsername(_) => "Хэрэглэгчийн нэр буруу байна".to_string(),
                AuthError::Repository(err) => repository_message(err),
                AuthError::PasswordHash => MSG_INTERNAL.to_string(),
            },
            Self::OAuth(err) => match err {
                OAuthError::NotConfigured => "Google-ээр нэвтрэх боломжгүй байна".to_string(),
                OAuthError::StateMismatch | OAuthError::Denied(_) => {
                    "Google-ээр нэвтрэх үйлдэл цуцлагдлаа. Дахин оролдоно уу".to_string()
                }
                OAuthError::UnverifiedEmail => {
                    "Google бүртгэлийн имэйл баталгаажаагүй байна".to_string()
                }
                OAuthError::Http(_) | OAuthError::Api { .. } => {
                    "Google-тэй холбогдоход алдаа гарлаа".to_string()
                }
            },
            Self::Upload(err) => match err {
                UploadError::Empty => "Файл хоосон байна".to_string(),
                UploadError::TooLarge { .. } => "Файлын хэмжээ 10MB-аас их байна".to_string(),
                UploadError::UnsupportedType(_) => {
                    "Зөвхөн зураг (jpg, png, gif, webp, avif) оруулна уу".to_string()
                }
                UploadError::InvalidName(_) => "Файлын нэр буруу байна".to_string(),
                UploadError::Io(_) => MSG_INTERNAL.to_string(),
            },
            Self::ImageSync(ImageSyncError::InvalidName(_)) => "Файлын нэр буруу байна".to_string(),
            Self::Backup(_) | Self::ImageSync(_) | Self::Internal(_) => MSG_INTERNAL.to_string(),
            Self::NotFound(_) => MSG_NOT_FOUND.to_string(),
            Self::Unauthorized(_) => MSG_UNAUTHORIZED.to_string(),
            Self::Forbidden(_) => MSG_FORBIDDEN.to_string(),
            Self::BadRequest(detail) => format!("Оруулсан мэдээлэл буруу байна: {detail}"),
            Self::RateLimited => "Хэт олон хүсэлт илгээлээ. Түр хүлээгээд дахин оролдоно уу".to_string(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Rejected(_) => StatusCode::BAD_REQUEST,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => MSG_NOT_FOUND.to_string(),
        RepositoryError::Conflict(_) => "Давхардсан эсвэл холбоотой өгөгдөл байна".to_string(),
        RepositoryError::Rejected(detail) => format!("Хүсэлтийг биелүүлэх боломжгүй: {detail}"),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => MSG_INTERNAL.to_string(),
    }
}

fn order_message(err: &OrderError) -> String {
    match err {
        OrderError::Repository(err) => repository_message(err),
        OrderError::ProductUnavailable(id) => {
            format!("Бүтээгдэхүүн #{id} худалдаанд байхгүй байна")
        }
        OrderError::InsufficientStock {
            product, available, ..
        } => format!("Бүтээгдэхүүн #{product}-ийн үлдэгдэл хүрэлцэхгүй байна (үлдэгдэл: {available})"),
        OrderError::NonDeliveryDay(day) => format!("{day}-нд хүргэлт хийгдэхгүй"),
        OrderError::DeliveryDate(rejection) => match rejection {
            DeliveryRejection::DateInPast => "Хүргэх өдөр өнгөрсөн байна".to_string(),
            DeliveryRejection::PastCutoff => {
                "Өнөөдрийн хүргэлтийн захиалга авах цаг дууссан".to_string()
            }
            DeliveryRejection::BelowMinimum(min) => {
                format!("Захиалгын доод дүн {min}₮")
            }
        },
        OrderError::InvalidTransition { .. } => {
            "Захиалгын төлөвийг ингэж өөрчлөх боломжгүй".to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use gerinmah_core::{OrderStatus, ProductId};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 12".to_string());
        assert_eq!(err.to_string(), "Not found: product 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_duplicate_registration_is_bad_request() {
        assert_eq!(
            get_status(AuthError::EmailTaken.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::UsernameTaken.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_bad_credentials_are_unauthorized() {
        let err: AppError = AuthError::InvalidCredentials.into();
        assert_eq!(err.message(), "Нэвтрэх нэр эсвэл нууц үг буруу байна");
        assert_eq!(get_status(err), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_repository_errors_map_by_kind() {
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("slug already exists".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::Rejected("cycle".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_order_rejections_are_bad_request() {
        let err = OrderError::InsufficientStock {
            product: ProductId::new(3),
            requested: 5,
            available: 2,
        };
        assert_eq!(get_status(err.into()), StatusCode::BAD_REQUEST);

        let err = OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        assert_eq!(get_status(err.into()), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = AppError::Internal("connection refused to 10.0.0.3".to_string());
        assert!(!err.message().contains("10.0.0.3"));

        let err = AppError::Database(RepositoryError::DataCorruption("users.role".to_string()));
        assert!(!err.message().contains("users.role"));
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let response = AppError::Forbidden("order 4".to_string()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], MSG_FORBIDDEN);
    }
}
