//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retro_vault_core::{Email, Role, ShippingAddress, UserId};

/// A storefront user (domain type). The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub role: Role,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub default_shipping_address: Option<ShippingAddress>,
    pub settings: UserSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Notification and privacy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct UserSettings {
    pub email_notifications: bool,
    pub order_updates: bool,
    pub marketing_emails: bool,
    pub profile_public: bool,
    pub show_wishlist: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            order_updates: true,
            marketing_emails: false,
            profile_public: false,
            show_wishlist: false,
        }
    }
}

/// Partial update of [`UserSettings`]; absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UserSettingsPatch {
    pub email_notifications: Option<bool>,
    pub order_updates: Option<bool>,
    pub marketing_emails: Option<bool>,
    pub profile_public: Option<bool>,
    pub show_wishlist: Option<bool>,
}

impl UserSettings {
    /// Apply a patch, returning the merged settings.
    #[must_use]
    pub fn apply(self, patch: UserSettingsPatch) -> Self {
        Self {
            email_notifications: patch.email_notifications.unwrap_or(self.email_notifications),
            order_updates: patch.order_updates.unwrap_or(self.order_updates),
            marketing_emails: patch.marketing_emails.unwrap_or(self.marketing_emails),
            profile_public: patch.profile_public.unwrap_or(self.profile_public),
            show_wishlist: patch.show_wishlist.unwrap_or(self.show_wishlist),
        }
    }
}

/// Validated profile fields written by `PATCH /api/account/profile`.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub default_shipping_address: Option<ShippingAddress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_patch_only_touches_given_fields() {
        let settings = UserSettings::default().apply(UserSettingsPatch {
            marketing_emails: Some(true),
            order_updates: Some(false),
            ..UserSettingsPatch::default()
        });

        assert!(settings.email_notifications);
        assert!(!settings.order_updates);
        assert!(settings.marketing_emails);
        assert!(!settings.profile_public);
    }
}
