//! Order handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};

use gerinmah_core::{OrderId, OrderStatus};

use crate::db::{BankAccountRepository, OrderRepository};
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAdmin, RequireAuth};
use crate::models::{NewOrder, Order, OrderWithItems};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/orders/{id}", get(show_order))
        .route("/api/orders/{id}/status", patch(update_status))
        .route("/api/admin/orders/pending-count", get(pending_count))
}

/// Place an order, logged in or as a guest.
///
/// Confirmation emails go out in the background; a failed send is logged
/// and never fails the order.
///
/// # Route
///
/// `POST /api/orders`
///
/// # Errors
///
/// Returns 400 for invalid input, unavailable products, insufficient stock
/// or a closed delivery date.
pub async fn create_order(
    State(state): State<AppState>,
    OptionalAuth(principal): OptionalAuth,
    Json(body): Json<NewOrder>,
) -> Result<impl IntoResponse, AppError> {
    let order = body.normalize().map_err(AppError::BadRequest)?;
    let lang = order.lang;

    let created = OrderRepository::new(state.pool())
        .create(principal.user_id(), &order)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Order rejected"))?;
    state.invalidate_pending_count().await;

    let background = state.clone();
    let placed = created.clone();
    tokio::spawn(async move {
        let bank = match BankAccountRepository::new(background.pool()).get_default().await {
            Ok(bank) => bank,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load bank account for order email");
                None
            }
        };
        if let Err(e) = background
            .email()
            .send_order_emails(&placed, lang, bank.as_ref())
            .await
        {
            tracing::warn!(order_id = %placed.order.id, error = %e, "Failed to send order emails");
        }
    });

    Ok((StatusCode::CREATED, Json(created)))
}

/// Own orders, newest first. Admins get every order.
///
/// # Route
///
/// `GET /api/orders`
///
/// # Errors
///
/// Returns 401 when not logged in.
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Vec<OrderWithItems>>, AppError> {
    let repo = OrderRepository::new(state.pool());
    let orders = if principal.is_admin() {
        repo.list_all().await?
    } else {
        let user_id = principal
            .user_id()
            .ok_or_else(|| AppError::Unauthorized("orders".to_string()))?;
        repo.list_for_user(user_id).await?
    };
    Ok(Json(orders))
}

/// # Route
///
/// `GET /api/orders/{id}`
///
/// # Errors
///
/// Returns 404 for an unknown order and 403 for someone else's order.
pub async fn show_order(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>, AppError> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    principal.ensure_access(order.order.user_id, "order")?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// Move an order to a new status. Cancelling puts the stock back.
///
/// # Route
///
/// `PATCH /api/orders/{id}/status`
///
/// # Errors
///
/// Returns 404 for an unknown order and 400 for a disallowed transition.
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    let order = OrderRepository::new(state.pool())
        .update_status(id, body.status)
        .await?;
    state.invalidate_pending_count().await;

    tracing::info!(order_id = %id, status = %order.status, "Order status changed");
    Ok(Json(order))
}

#[derive(Debug, Serialize)]
pub struct PendingCount {
    pub count: i64,
}

/// Orders waiting for confirmation, for the admin badge.
///
/// # Route
///
/// `GET /api/admin/orders/pending-count`
///
/// # Errors
///
/// Returns 500 if the count query fails.
pub async fn pending_count(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<PendingCount>, AppError> {
    Ok(Json(PendingCount {
        count: state.pending_order_count().await?,
    }))
}
