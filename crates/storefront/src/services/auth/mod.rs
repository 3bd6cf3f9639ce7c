//! Authentication service.
//!
//! Provides password authentication, Google sign-in account resolution and
//! the built-in admin credential check.

mod error;
pub mod google;

pub use error::AuthError;
pub use google::{GoogleOAuthClient, GoogleProfile, OAuthError};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;

use gerinmah_core::{Email, Username};

use crate::config::AdminCredentials;
use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::{NewUser, User, non_blank};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (argon2 input is bounded to keep hashing cheap).
const MAX_PASSWORD_LENGTH: usize = 128;

/// Attempts at finding a free username for a Google sign-up.
const GOOGLE_USERNAME_ATTEMPTS: usize = 5;

/// Registration payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new customer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` / `InvalidEmail` / `WeakPassword`
    /// for bad input and `AuthError::UsernameTaken` / `EmailTaken` when the
    /// account already exists. Existing accounts are never modified.
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let username = Username::parse(&registration.username)?;
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;

        if self.users.get_by_username(username.as_str()).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&registration.password)?;
        let new = NewUser {
            username,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            full_name: non_blank(registration.full_name),
            phone: non_blank(registration.phone),
            address: non_blank(registration.address),
        };

        // A concurrent registration can still win the race between the
        // checks above and the insert.
        self.users.create(&new).await.map_err(|e| match e {
            RepositoryError::Conflict(msg) if msg.starts_with("email") => AuthError::EmailTaken,
            RepositoryError::Conflict(_) => AuthError::UsernameTaken,
            other => AuthError::Repository(other),
        })
    }

    /// Log in with a username or email and a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the account does not exist,
    /// has no password (Google-only), or the password is wrong.
    pub async fn login_with_password(
        &self,
        login: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let login = login.trim();
        let user = if login.contains('@') {
            let email = Email::parse(login).map_err(|_| AuthError::InvalidCredentials)?;
            self.users.get_by_email(&email).await?
        } else {
            self.users.get_by_username(login).await?
        };

        let user = user.ok_or(AuthError::InvalidCredentials)?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, hash)?;

        Ok(user)
    }

    // =========================================================================
    // Google Sign-in
    // =========================================================================

    /// Resolve a Google profile to a local user.
    ///
    /// Looks up by Google id first, then links an existing account with the
    /// same email, and otherwise creates a new customer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if Google sent an unusable address.
    pub async fn sign_in_with_google(&self, profile: &GoogleProfile) -> Result<User, AuthError> {
        if let Some(user) = self.users.get_by_google_id(&profile.sub).await? {
            return Ok(user);
        }

        let email = Email::parse(&profile.email)?;
        if let Some(existing) = self.users.get_by_email(&email).await? {
            tracing::info!(user_id = %existing.id, "Linking Google account to existing user");
            return Ok(self.users.link_google(existing.id, &profile.sub).await?);
        }

        let base = Username::sanitized(email.local_part());
        for attempt in 0..GOOGLE_USERNAME_ATTEMPTS {
            let username = if attempt == 0 {
                base.clone()
            } else {
                username_with_suffix(&base, rand::rng().random_range(1000..10000))
            };
            let new = NewUser {
                username,
                email: email.clone(),
                password_hash: None,
                google_id: Some(profile.sub.clone()),
                full_name: non_blank(profile.name.clone()),
                phone: None,
                address: None,
            };
            match self.users.create(&new).await {
                Ok(user) => return Ok(user),
                Err(RepositoryError::Conflict(msg)) if msg.starts_with("username") => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::UsernameTaken)
    }
}

/// Check the configured admin login in constant time.
#[must_use]
pub fn verify_admin_credentials(admin: &AdminCredentials, username: &str, password: &str) -> bool {
    let user_ok = constant_time_eq(admin.username.as_bytes(), username.trim().as_bytes());
    let pass_ok = constant_time_eq(admin.password.expose_secret().as_bytes(), password.as_bytes());
    user_ok & pass_ok
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Append a numeric suffix, trimming the base so the result stays valid.
fn username_with_suffix(base: &Username, suffix: u32) -> Username {
    let suffix = suffix.to_string();
    let keep = Username::MAX_LENGTH.saturating_sub(suffix.len() + 1);
    let stem: String = base.as_str().chars().take(keep).collect();
    Username::sanitized(&format!("{stem}_{suffix}"))
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("tal-hee-2026").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("tal-hee-2026", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong-password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
        // Counted in characters, not bytes
        assert!(validate_password("нууцүгс").is_err());
        assert!(validate_password("нууцүгс1").is_ok());
    }

    #[test]
    fn test_verify_admin_credentials() {
        let admin = AdminCredentials {
            username: "admin".to_string(),
            password: SecretString::from("Gerin-Mah-42"),
        };
        assert!(verify_admin_credentials(&admin, "admin", "Gerin-Mah-42"));
        assert!(verify_admin_credentials(&admin, " admin ", "Gerin-Mah-42"));
        assert!(!verify_admin_credentials(&admin, "admin", "gerin-mah-42"));
        assert!(!verify_admin_credentials(&admin, "root", "Gerin-Mah-42"));
        assert!(!verify_admin_credentials(&admin, "admin", ""));
    }

    #[test]
    fn test_username_with_suffix_stays_valid() {
        let base = Username::sanitized(&"b".repeat(60));
        let name = username_with_suffix(&base, 4821);
        assert!(name.as_str().ends_with("_4821"));
        assert!(name.as_str().len() <= Username::MAX_LENGTH);
        assert!(Username::parse(name.as_str()).is_ok());
    }
}
