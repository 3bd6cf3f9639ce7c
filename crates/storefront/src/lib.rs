//! Gerinmah storefront library.
//!
//! JSON API for the Gerinmah meat shop and its admin CMS, plus the
//! background jobs that keep table snapshots and uploaded images safe.
//! The binary in `main.rs` wires it to a listener; the CLI reuses the
//! backup and upload services directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::Request, middleware::from_fn};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tower_sessions::cookie::KeyError;

use crate::state::AppState;

/// Build the full application router with its middleware stack.
///
/// Sentry layers are left to the caller so tests can build the app without
/// a Sentry hub.
///
/// # Errors
///
/// Returns `KeyError` if the session secret cannot be used as a signing key.
pub fn app(state: AppState) -> Result<Router, KeyError> {
    let session_layer = middleware::create_session_layer(state.pool(), state.config())?;

    Ok(routes::routes()
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(RequestBodyLimitLayer::new(routes::UPLOAD_BODY_LIMIT))
        .with_state(state))
}
