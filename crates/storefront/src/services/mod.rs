//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password accounts (register, login, password change, deletion)
//! - `cart` - Stock-checked cart mutations
//! - `checkout` - Quotes, provider payments and order placement
//! - `email` - Order confirmation and shipping notices over SMTP
//! - `payments` - Stripe and `PayPal` clients with a simulation mode

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod email;
pub mod payments;
