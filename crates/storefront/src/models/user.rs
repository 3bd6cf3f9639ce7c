//! User types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gerinmah_core::{Email, UserId, UserRole, Username};

/// A user row.
///
/// Holds the password hash, so it is never serialized directly; handlers
/// return [`PublicUser`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user fields safe to send to the browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub has_password: bool,
    pub google_linked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            full_name: user.full_name.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
            has_password: user.password_hash.is_some(),
            google_linked: user.google_id.is_some(),
            created_at: user.created_at,
        }
    }
}

/// Data for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}
