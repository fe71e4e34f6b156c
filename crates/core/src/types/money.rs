//! Decimal money helpers.
//!
//! Prices are stored as `NUMERIC(10, 2)` and handled as [`Decimal`] in the
//! shop's single configured currency. Payment providers want either integer
//! minor units (Stripe) or a two-decimal string (PayPal); both conversions
//! live here so every caller rounds the same way.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Errors converting a [`Decimal`] amount for a payment provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// Amount is below zero.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Amount carries more than two decimal places.
    #[error("amount has sub-cent precision: {0}")]
    SubCent(Decimal),
    /// Amount does not fit in the provider's integer range.
    #[error("amount out of range: {0}")]
    Overflow(Decimal),
}

/// Price a customer actually pays for a game.
///
/// A sale price only applies when it is set and strictly below the list price.
///
/// ```
/// use retro_vault_core::money::effective_price;
/// use rust_decimal::Decimal;
///
/// let list = Decimal::new(4999, 2);
/// assert_eq!(effective_price(list, Some(Decimal::new(3999, 2))), Decimal::new(3999, 2));
/// assert_eq!(effective_price(list, Some(Decimal::new(5999, 2))), list);
/// assert_eq!(effective_price(list, None), list);
/// ```
#[must_use]
pub fn effective_price(price: Decimal, sale_price: Option<Decimal>) -> Decimal {
    match sale_price {
        Some(sale) if sale < price => sale,
        _ => price,
    }
}

/// Total for a line of `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Convert an amount to integer minor units (cents).
///
/// # Errors
///
/// Returns [`MoneyError`] if the amount is negative, has more than two
/// decimal places, or does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }

    let cents = amount * Decimal::ONE_HUNDRED;
    if cents.fract() != Decimal::ZERO {
        return Err(MoneyError::SubCent(amount));
    }

    cents.to_i64().ok_or(MoneyError::Overflow(amount))
}

/// Convert integer minor units (cents) back to a decimal amount.
#[must_use]
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Format an amount with exactly two decimal places, e.g. `"12.50"`.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}
