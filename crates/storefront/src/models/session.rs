//! Session-related types.
//!
//! Types stored in the session for authentication and checkout state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use retro_vault_core::{Email, PaymentMethod, Role, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Role at login time.
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A provider payment created for this session but not yet turned into an order.
///
/// Confirmation requests must name the same provider handle, so a client
/// cannot attach somebody else's payment to its cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub method: PaymentMethod,
    /// Stripe `PaymentIntent` id or `PayPal` order id.
    pub provider_id: String,
    /// Amount quoted when the payment was created.
    pub amount: Decimal,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the payment awaiting confirmation.
    pub const PENDING_PAYMENT: &str = "pending_payment";
}
