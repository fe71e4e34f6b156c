//! Back-office types.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use retro_vault_core::{GameId, OrderStatus};

/// A game running low on stock.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockGame {
    pub id: GameId,
    pub title: String,
    pub slug: String,
    pub stock: i32,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Order count per status; every status is present, zero if unused.
    pub orders_by_status: BTreeMap<OrderStatus, i64>,
    /// Sum of totals of paid orders.
    pub revenue: Decimal,
    pub user_count: i64,
    pub game_count: i64,
    pub low_stock: Vec<LowStockGame>,
}

impl Dashboard {
    /// Fill in zero counts for statuses with no orders.
    #[must_use]
    pub fn status_counts(counts: Vec<(OrderStatus, i64)>) -> BTreeMap<OrderStatus, i64> {
        let mut map: BTreeMap<OrderStatus, i64> =
            OrderStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        map.extend(counts);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_counts_fill_missing() {
        let counts = Dashboard::status_counts(vec![(OrderStatus::Shipped, 4)]);
        assert_eq!(counts.len(), OrderStatus::ALL.len());
        assert_eq!(counts[&OrderStatus::Shipped], 4);
        assert_eq!(counts[&OrderStatus::Pending], 0);
    }
}
