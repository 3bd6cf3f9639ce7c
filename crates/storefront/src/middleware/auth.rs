//! Authentication extractors.
//!
//! Every authorization decision goes through [`Principal`], the resolved
//! identity of a request: the logged-in user (if any) plus the admin
//! session flag. The session only pins the user id; role and account
//! existence are read from the database on each request, so a demotion or
//! deleted account takes effect immediately.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use gerinmah_core::UserId;

use crate::db::{RepositoryError, UserRepository};
use crate::error::AppError;
use crate::models::session::keys;
use crate::models::{CurrentUser, User};
use crate::state::AppState;

/// Resolved identity of a request.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    pub user: Option<CurrentUser>,
    /// Set by `POST /api/admin/login`.
    pub admin_session: bool,
}

impl Principal {
    /// Admin session flag, or a logged-in user with the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.admin_session || self.user.as_ref().is_some_and(CurrentUser::is_admin)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Whether this principal owns a row with the given owner.
    #[must_use]
    pub fn owns(&self, owner: Option<UserId>) -> bool {
        matches!((self.user_id(), owner), (Some(me), Some(owner)) if me == owner)
    }

    /// Admins can access everything; others only what they own.
    #[must_use]
    pub fn can_access(&self, owner: Option<UserId>) -> bool {
        self.is_admin() || self.owns(owner)
    }

    /// Reject unless the principal can access a row with this owner.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` for anonymous requests and
    /// `AppError::Forbidden` for someone else's row.
    pub fn ensure_access(&self, owner: Option<UserId>, what: &str) -> Result<(), AppError> {
        if self.can_access(owner) {
            return Ok(());
        }
        if self.user.is_none() && !self.admin_session {
            return Err(AppError::Unauthorized(what.to_string()));
        }
        Err(AppError::Forbidden(what.to_string()))
    }

    async fn resolve(session: &Session, state: &AppState) -> Result<Self, RepositoryError> {
        let admin_session = session
            .get::<bool>(keys::ADMIN_LOGGED_IN)
            .await
            .ok()
            .flatten()
            .unwrap_or(false);
        let user = match session
            .get::<CurrentUser>(keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
        {
            Some(stored) => {
                let account = UserRepository::new(state.pool()).get_by_id(stored.id).await?;
                current_from_account(account.as_ref())
            }
            None => None,
        };
        Ok(Self {
            user,
            admin_session,
        })
    }
}

/// The session user as the database has it now; `None` once the account
/// is gone.
fn current_from_account(account: Option<&User>) -> Option<CurrentUser> {
    account.map(CurrentUser::from)
}

/// Error returned when a request lacks the required identity.
#[derive(Debug)]
pub enum AuthRejection {
    /// Not logged in.
    Unauthorized,
    /// Logged in, but not allowed.
    Forbidden,
    /// The account lookup failed.
    Database(RepositoryError),
}

impl From<RepositoryError> for AuthRejection {
    fn from(e: RepositoryError) -> Self {
        Self::Database(e)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => AppError::Unauthorized("login required".to_string()),
            Self::Forbidden => AppError::Forbidden("admin required".to_string()),
            Self::Database(e) => AppError::Database(e),
        }
        .into_response()
    }
}

fn session(parts: &Parts) -> Option<&Session> {
    parts.extensions.get::<Session>()
}

async fn principal(parts: &Parts, state: &AppState) -> Result<Principal, AuthRejection> {
    match session(parts) {
        Some(session) => Ok(Principal::resolve(session, state).await?),
        None => Ok(Principal::default()),
    }
}

/// Extractor that resolves the principal. Anonymous requests pass; it
/// rejects only when the account lookup fails.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalAuth(principal): OptionalAuth) -> impl IntoResponse {
///     match principal.user {
///         Some(u) => format!("Сайн байна уу, {}!", u.username),
///         None => "Сайн байна уу!".to_string(),
///     }
/// }
/// ```
pub struct OptionalAuth(pub Principal);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(principal(parts, state).await?))
    }
}

/// Extractor that requires a logged-in user.
pub struct RequireUser(pub CurrentUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = principal(parts, state)
            .await?
            .user
            .ok_or(AuthRejection::Unauthorized)?;
        Ok(Self(user))
    }
}

/// Extractor that requires a user or an admin session.
pub struct RequireAuth(pub Principal);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal(parts, state).await?;
        if principal.user.is_none() && !principal.admin_session {
            return Err(AuthRejection::Unauthorized);
        }
        Ok(Self(principal))
    }
}

/// Extractor that requires admin access.
pub struct RequireAdmin(pub Principal);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal(parts, state).await?;
        if principal.is_admin() {
            return Ok(Self(principal));
        }
        if principal.user.is_some() {
            return Err(AuthRejection::Forbidden);
        }
        Err(AuthRejection::Unauthorized)
    }
}

/// Store the logged-in user, rotating the session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Set the admin session flag, rotating the session id.
///
/// Only for the configured admin credentials. Admin-role users get their
/// access from the role, which is re-read on every request.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_admin_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::ADMIN_LOGGED_IN, true).await
}

/// Clear the admin session flag. The user login, if any, stays.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_admin_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<bool>(keys::ADMIN_LOGGED_IN).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gerinmah_core::{Email, UserRole};

    use super::*;

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            username: format!("user{id}"),
            email: Email::parse(&format!("user{id}@gerinmah.mn")).expect("valid email"),
            role,
        }
    }

    #[test]
    fn test_anonymous_principal() {
        let p = Principal::default();
        assert!(!p.is_admin());
        assert!(!p.can_access(Some(UserId::new(1))));
        // Guest orders have no owner and are still private
        assert!(!p.can_access(None));
        assert!(matches!(
            p.ensure_access(Some(UserId::new(1)), "order"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_customer_sees_only_own_rows() {
        let p = Principal {
            user: Some(user(1, UserRole::Customer)),
            admin_session: false,
        };
        assert!(p.can_access(Some(UserId::new(1))));
        assert!(!p.can_access(Some(UserId::new(2))));
        assert!(!p.can_access(None));
        assert!(matches!(
            p.ensure_access(Some(UserId::new(2)), "order"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_role_and_admin_session() {
        let by_role = Principal {
            user: Some(user(5, UserRole::Admin)),
            admin_session: false,
        };
        assert!(by_role.is_admin());
        assert!(by_role.can_access(Some(UserId::new(2))));

        let by_flag = Principal {
            user: None,
            admin_session: true,
        };
        assert!(by_flag.is_admin());
        assert!(by_flag.can_access(None));
        assert!(by_flag.ensure_access(Some(UserId::new(9)), "order").is_ok());
    }

    fn account(id: i32, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(id),
            username: format!("user{id}"),
            email: Email::parse(&format!("user{id}@gerinmah.mn")).expect("valid email"),
            password_hash: None,
            google_id: None,
            role,
            full_name: None,
            phone: None,
            address: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_demoted_account_loses_admin_access() {
        // Logged in as admin, demoted since
        let refreshed = current_from_account(Some(&account(5, UserRole::Customer)));
        let p = Principal {
            user: refreshed,
            admin_session: false,
        };
        assert!(!p.is_admin());
        assert!(p.can_access(Some(UserId::new(5))));
        assert!(matches!(
            p.ensure_access(Some(UserId::new(2)), "order"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_deleted_account_is_anonymous() {
        let p = Principal {
            user: current_from_account(None),
            admin_session: false,
        };
        assert!(p.user.is_none());
        assert!(matches!(
            p.ensure_access(Some(UserId::new(5)), "order"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_promoted_account_gains_admin_access() {
        let p = Principal {
            user: current_from_account(Some(&account(7, UserRole::Admin))),
            admin_session: false,
        };
        assert!(p.is_admin());
    }
}
