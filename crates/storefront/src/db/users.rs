//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use retro_vault_core::{Email, Role, ShippingAddress, UserId};

use super::RepositoryError;
use crate::models::user::{ProfileUpdate, User, UserSettings};

macro_rules! user_select {
    () => {
        r"
        SELECT u.id, r.name AS role_name, u.email, u.name, u.phone, u.avatar_url, u.bio,
               u.default_shipping_address, u.email_notifications, u.order_updates,
               u.marketing_emails, u.profile_public, u.show_wishlist,
               u.created_at, u.updated_at
        FROM users u
        JOIN roles r ON r.id = u.role_id
        "
    };
}

#[derive(sqlx::FromRow)]
#[allow(clippy::struct_excessive_bools)]
struct UserRow {
    id: UserId,
    role_name: String,
    email: Email,
    name: String,
    phone: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    default_shipping_address: Option<Json<ShippingAddress>>,
    email_notifications: bool,
    order_updates: bool,
    marketing_emails: bool,
    profile_public: bool,
    show_wishlist: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = r
            .role_name
            .parse::<Role>()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid role in database: {e}")))?;

        Ok(Self {
            id: r.id,
            role,
            email: r.email,
            name: r.name,
            phone: r.phone,
            avatar_url: r.avatar_url,
            bio: r.bio,
            default_shipping_address: r.default_shipping_address.map(|Json(a)| a),
            settings: UserSettings {
                email_notifications: r.email_notifications,
                order_updates: r.order_updates,
                marketing_emails: r.marketing_emails,
                profile_public: r.profile_public,
                show_wishlist: r.show_wishlist,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored role is unknown.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(concat!(user_select!(), "WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(concat!(user_select!(), "WHERE u.email = $1"))
            .bind(email)
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let Some(user) = self.get_by_email(email).await? else {
            return Ok(None);
        };

        let hash = self.get_password_hash(user.id).await?;
        Ok(hash.map(|hash| (user, hash)))
    }

    /// Get a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(hash)
    }

    /// Create a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        name: &str,
    ) -> Result<User, RepositoryError> {
        let id = sqlx::query_scalar::<_, UserId>(
            r"
            INSERT INTO users (role_id, email, password_hash, name)
            VALUES ((SELECT id FROM roles WHERE name = $1), $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(Role::Customer.as_str())
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email already exists"))?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update profile fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        profile: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET name = $2, phone = $3, avatar_url = $4, bio = $5,
                default_shipping_address = $6, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&profile.name)
        .bind(&profile.phone)
        .bind(&profile.avatar_url)
        .bind(&profile.bio)
        .bind(profile.default_shipping_address.as_ref().map(Json))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace notification and privacy flags.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_settings(
        &self,
        id: UserId,
        settings: UserSettings,
    ) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET email_notifications = $2, order_updates = $3, marketing_emails = $4,
                profile_public = $5, show_wishlist = $6, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(settings.email_notifications)
        .bind(settings.order_updates)
        .bind(settings.marketing_emails)
        .bind(settings.profile_public)
        .bind(settings.show_wishlist)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_password(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(hash)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET role_id = (SELECT id FROM roles WHERE name = $2), updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(role.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a user. Their orders are kept with a `NULL` owner.
    ///
    /// # Returns
    ///
    /// Returns `true` if the user was deleted, `false` if they didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
