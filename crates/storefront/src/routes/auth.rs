//! Authentication route handlers.
//!
//! Password login and registration, Google sign-in, and the admin session.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use gerinmah_core::UserRole;

use crate::db::UserRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    OptionalAuth, RequireUser, clear_admin_session, set_admin_session, set_current_user,
};
use crate::models::session::keys;
use crate::models::{CurrentUser, PublicUser, User};
use crate::services::auth::{
    AuthError, AuthService, OAuthError, Registration, verify_admin_credentials,
};
use crate::state::AppState;

use super::{Success, success};

/// Length of the Google OAuth CSRF state.
const OAUTH_STATE_LENGTH: usize = 32;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/user", get(current_user))
        .route("/api/auth/google", get(google_login))
        .route("/api/auth/google/callback", get(google_callback))
        .route("/api/admin/login", post(admin_login))
        .route("/api/admin/logout", post(admin_logout))
        .route("/api/admin/status", get(admin_status))
}

/// Login payload. `username` also accepts an email address.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub username: String,
    pub password: String,
}

/// Admin session state for the CMS.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub is_admin: bool,
    pub username: Option<String>,
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session: {e}"))
}

/// Put `user` in the session and tag the Sentry scope with it.
async fn log_in(session: &Session, user: &User) -> Result<(), AppError> {
    set_current_user(session, &CurrentUser::from(user))
        .await
        .map_err(session_error)?;
    set_sentry_user(&user.id, Some(&user.username));
    Ok(())
}

/// Register a new customer and log them in.
///
/// # Route
///
/// `POST /api/register`
///
/// # Errors
///
/// Returns 400 for invalid input or a username/email that already exists.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Registration>,
) -> Result<impl IntoResponse, AppError> {
    let user = AuthService::new(state.pool()).register(body).await?;
    log_in(&session, &user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    let email = state.email().clone();
    let to = user.email.to_string();
    let username = user.username.clone();
    tokio::spawn(async move {
        if let Err(e) = email.send_welcome_email(&to, &username).await {
            tracing::warn!(error = %e, "Failed to send welcome email");
        }
    });

    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

/// Log in with username (or email) and password.
///
/// # Route
///
/// `POST /api/login`
///
/// # Errors
///
/// Returns 401 if the credentials are wrong.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let user = AuthService::new(state.pool())
        .login_with_password(&body.username, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(login = %body.username, error = %e, "Login failed"))?;
    log_in(&session, &user).await?;

    Ok(Json(PublicUser::from(&user)))
}

/// Destroy the session, including any admin flag.
///
/// # Route
///
/// `POST /api/logout`
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn logout(session: Session) -> Result<Json<Success>, AppError> {
    session.flush().await.map_err(session_error)?;
    clear_sentry_user();
    Ok(success())
}

/// The logged-in user, read fresh from the database.
///
/// # Route
///
/// `GET /api/user`
///
/// # Errors
///
/// Returns 401 if nobody is logged in or the account no longer exists.
pub async fn current_user(
    State(state): State<AppState>,
    session: Session,
    RequireUser(current): RequireUser,
) -> Result<Json<PublicUser>, AppError> {
    let Some(user) = UserRepository::new(state.pool()).get_by_id(current.id).await? else {
        session.flush().await.map_err(session_error)?;
        return Err(AppError::Unauthorized("account no longer exists".to_string()));
    };
    Ok(Json(PublicUser::from(&user)))
}

/// Generate a random alphanumeric string for OAuth state.
fn generate_state() -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(OAUTH_STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Start Google sign-in.
///
/// # Route
///
/// `GET /api/auth/google`
///
/// # Errors
///
/// Returns 404 if Google sign-in is not configured.
pub async fn google_login(
    State(state): State<AppState>,
    session: Session,
) -> Result<Redirect, AppError> {
    let google = state.google().ok_or(OAuthError::NotConfigured)?;

    let oauth_state = generate_state();
    session
        .insert(keys::GOOGLE_OAUTH_STATE, &oauth_state)
        .await
        .map_err(session_error)?;

    Ok(Redirect::to(&google.authorization_url(&oauth_state)))
}

/// Query parameters from the Google OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Finish Google sign-in and send the browser back to the site.
///
/// Failures redirect to `/login?error=<reason>` so the front end can show
/// a message.
///
/// # Route
///
/// `GET /api/auth/google/callback`
pub async fn google_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let base_url = state.config().base_url.trim_end_matches('/').to_string();
    let fail = |reason: &str| Redirect::to(&format!("{base_url}/login?error={reason}")).into_response();

    match google_sign_in(&state, &session, query).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Google sign-in");
            Redirect::to(&format!("{base_url}/")).into_response()
        }
        Err(AppError::OAuth(OAuthError::Denied(e))) => {
            tracing::warn!(error = %e, "Google sign-in denied");
            fail("google_denied")
        }
        Err(AppError::OAuth(OAuthError::StateMismatch)) => {
            tracing::warn!("Google OAuth state mismatch");
            fail("invalid_state")
        }
        Err(e) => {
            tracing::error!(error = %e, "Google sign-in failed");
            fail("google_failed")
        }
    }
}

async fn google_sign_in(
    state: &AppState,
    session: &Session,
    query: CallbackQuery,
) -> Result<User, AppError> {
    let google = state.google().ok_or(OAuthError::NotConfigured)?;

    if let Some(error) = query.error {
        return Err(OAuthError::Denied(error).into());
    }

    let stored: Option<String> = session
        .remove(keys::GOOGLE_OAUTH_STATE)
        .await
        .map_err(session_error)?;
    match (stored, query.state) {
        (Some(stored), Some(returned)) if stored == returned => {}
        _ => return Err(OAuthError::StateMismatch.into()),
    }

    let code = query
        .code
        .ok_or_else(|| OAuthError::Denied("missing code".to_string()))?;
    let token = google.exchange_code(&code).await?;
    let profile = google.fetch_profile(&token).await?;

    let user = AuthService::new(state.pool())
        .sign_in_with_google(&profile)
        .await?;
    log_in(session, &user).await?;
    Ok(user)
}

/// Open an admin session.
///
/// Accepts the configured admin credentials, which set the admin session
/// flag, or the password of a user with the admin role. That user is
/// logged in normally and keeps admin access only while the role lasts.
///
/// # Route
///
/// `POST /api/admin/login`
///
/// # Errors
///
/// Returns 401 if neither check passes.
pub async fn admin_login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AdminStatus>, AppError> {
    let configured = state
        .config()
        .admin
        .as_ref()
        .is_some_and(|admin| verify_admin_credentials(admin, &body.username, &body.password));

    let username = if configured {
        set_admin_session(&session).await.map_err(session_error)?;
        body.username.trim().to_string()
    } else {
        let user = match AuthService::new(state.pool())
            .login_with_password(&body.username, &body.password)
            .await
        {
            Ok(user) if matches!(user.role, UserRole::Admin) => user,
            Ok(_) | Err(AuthError::InvalidCredentials) => {
                tracing::warn!(login = %body.username, "Admin login rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e.into()),
        };
        log_in(&session, &user).await?;
        user.username
    };

    tracing::info!(username = %username, "Admin session opened");

    Ok(Json(AdminStatus {
        is_admin: true,
        username: Some(username),
    }))
}

/// Close the admin session opened with the configured credentials. A user
/// login, if any, stays.
///
/// # Route
///
/// `POST /api/admin/logout`
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn admin_logout(session: Session) -> Result<Json<Success>, AppError> {
    clear_admin_session(&session).await.map_err(session_error)?;
    Ok(success())
}

/// Whether the caller may use the admin API.
///
/// # Route
///
/// `GET /api/admin/status`
pub async fn admin_status(OptionalAuth(principal): OptionalAuth) -> Json<AdminStatus> {
    Json(AdminStatus {
        is_admin: principal.is_admin(),
        username: principal.user.map(|u| u.username),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_state_is_alphanumeric() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), OAUTH_STATE_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_login_accepts_email_alias() {
        let body: LoginRequest =
            serde_json::from_str(r#"{"email":"bat@example.mn","password":"secret123"}"#)
                .expect("login body");
        assert_eq!(body.username, "bat@example.mn");
    }
}
