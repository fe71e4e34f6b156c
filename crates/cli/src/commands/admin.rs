//! User role management.
//!
//! # Usage
//!
//! ```bash
//! rv-cli admin promote -e admin@example.com
//! ```
//!
//! The account must already exist (register through the API first).

use retro_vault_core::{Email, Role};
use retro_vault_storefront::db::{RepositoryError, UserRepository};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] retro_vault_core::EmailError),

    /// No account with this email.
    #[error("No user with email: {0}")]
    UserNotFound(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Grant the admin role to an existing user.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if no account has this email.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    if user.role == Role::Admin {
        tracing::info!("{} is already an admin", email);
        return Ok(());
    }

    users.set_role(user.id, Role::Admin).await?;
    tracing::info!(user_id = %user.id, "Promoted {} to admin", email);

    Ok(())
}
