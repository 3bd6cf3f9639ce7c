//! Bank account handlers.
//!
//! While any account exists exactly one is the default; the storage layer
//! keeps that true across create, update, delete and "make default".

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use gerinmah_core::BankAccountId;

use crate::db::BankAccountRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{BankAccount, BankAccountInput};
use crate::state::AppState;

use super::{Success, success};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/bank-accounts", get(list_accounts).post(create_account))
        .route("/api/bank-accounts/default", get(default_account))
        .route(
            "/api/bank-accounts/{id}",
            put(update_account).delete(delete_account),
        )
        .route("/api/bank-accounts/{id}/default", post(make_default))
}

/// Default account first.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<BankAccount>>, AppError> {
    Ok(Json(BankAccountRepository::new(state.pool()).list().await?))
}

/// The account shown on checkout.
///
/// # Errors
///
/// Returns 404 when no account exists.
pub async fn default_account(
    State(state): State<AppState>,
) -> Result<Json<BankAccount>, AppError> {
    BankAccountRepository::new(state.pool())
        .get_default()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("default bank account".to_string()))
}

/// # Errors
///
/// Returns 400 for blank fields.
pub async fn create_account(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<BankAccountInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    let account = BankAccountRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// # Errors
///
/// Returns 400 for blank fields and 404 if the account does not exist.
pub async fn update_account(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<BankAccountId>,
    Json(body): Json<BankAccountInput>,
) -> Result<Json<BankAccount>, AppError> {
    let input = body.normalize().map_err(AppError::BadRequest)?;
    Ok(Json(
        BankAccountRepository::new(state.pool())
            .update(id, &input)
            .await?,
    ))
}

/// Delete an account. If it was the default, the oldest remaining one
/// takes over.
///
/// # Errors
///
/// Returns 404 if the account does not exist.
pub async fn delete_account(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<BankAccountId>,
) -> Result<Json<Success>, AppError> {
    BankAccountRepository::new(state.pool()).delete(id).await?;
    Ok(success())
}

/// # Route
///
/// `POST /api/bank-accounts/{id}/default`
///
/// # Errors
///
/// Returns 404 if the account does not exist.
pub async fn make_default(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<BankAccountId>,
) -> Result<Json<BankAccount>, AppError> {
    Ok(Json(
        BankAccountRepository::new(state.pool())
            .set_default(id)
            .await?,
    ))
}
