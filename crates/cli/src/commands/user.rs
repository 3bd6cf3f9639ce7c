//! User role management.
//!
//! Promoting a user lets them reach the CMS by logging in to
//! `/api/admin/login` with their own password.

use gerinmah_core::UserRole;
use gerinmah_storefront::db::{RepositoryError, UserRepository};
use thiserror::Error;

use super::{CliError, connect};

#[derive(Debug, Error)]
pub enum UserCommandError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Set the role of the user with `username`.
pub async fn set_role(username: &str, role: UserRole) -> Result<(), UserCommandError> {
    let pool = connect().await?;
    let repo = UserRepository::new(&pool);

    let user = repo
        .get_by_username(username)
        .await?
        .ok_or_else(|| UserCommandError::NotFound(username.to_owned()))?;

    if user.role == role {
        tracing::info!(username, %role, "User already has this role");
        return Ok(());
    }

    repo.set_role(user.id, role).await?;
    tracing::info!(username, user_id = %user.id, %role, "Role updated");
    Ok(())
}
