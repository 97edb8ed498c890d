//! Live orders and position/cash accounting.

use crate::book::Direction;
use std::collections::HashMap;

/// A live resting order. `remaining_qty` is reduced by fills and the order
/// is removed from `Positions::orders` once it reaches zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOrder {
    pub order_id: String,
    pub direction: Direction,
    pub px: i64,
    pub remaining_qty: i64,
}

/// Inventory, cash, and the live-orders map. Mutated only by the user
/// connector; the strategy and market connector only ever read it.
#[derive(Debug, Clone, Default)]
pub struct Positions {
    pub qty: i64,
    pub money: i64,
    pub orders: HashMap<String, LimitOrder>,
}

impl Positions {
    pub fn new(qty: i64, money: i64) -> Self {
        Self {
            qty,
            money,
            orders: HashMap::new(),
        }
    }

    /// Apply the fill-accounting invariant:
    /// `money_after = money_before - signed_qty * px`,
    /// `qty_after = qty_before + signed_qty`,
    /// where `signed_qty = executed_qty * direction.sign()`.
    ///
    /// `executed_qty` must be positive; this is the caller's
    /// responsibility (the user connector validates it against the
    /// order's remaining quantity before calling this).
    pub fn apply_fill(&mut self, direction: Direction, px: i64, executed_qty: i64) {
        assert!(executed_qty > 0, "executed_qty must be positive, got {executed_qty}");
        let signed_qty = executed_qty * direction.sign();
        self.money -= signed_qty * px;
        self.qty += signed_qty;
    }

    /// Sum of resting quantity on the given side of the live-orders map.
    pub fn resting_qty_by_px(&self, side: crate::book::Side) -> HashMap<i64, i64> {
        let mut out = HashMap::new();
        for order in self.orders.values() {
            if order.direction.side() == side {
                *out.entry(order.px).or_insert(0) += order.remaining_qty;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_fill_decreases_money_increases_qty() {
        let mut pos = Positions::new(0, 100);
        pos.apply_fill(Direction::Buy, 10, 2);
        assert_eq!(pos.qty, 2);
        assert_eq!(pos.money, 80);
    }

    #[test]
    fn sell_fill_increases_money_decreases_qty() {
        let mut pos = Positions::new(5, 0);
        pos.apply_fill(Direction::Sell, 10, 2);
        assert_eq!(pos.qty, 3);
        assert_eq!(pos.money, 20);
    }

    #[test]
    fn resting_qty_by_px_groups_by_side() {
        let mut pos = Positions::new(0, 100);
        pos.orders.insert(
            "a".into(),
            LimitOrder { order_id: "a".into(), direction: Direction::Buy, px: 10, remaining_qty: 3 },
        );
        pos.orders.insert(
            "b".into(),
            LimitOrder { order_id: "b".into(), direction: Direction::Buy, px: 10, remaining_qty: 2 },
        );
        pos.orders.insert(
            "c".into(),
            LimitOrder { order_id: "c".into(), direction: Direction::Sell, px: 12, remaining_qty: 1 },
        );
        let bids = pos.resting_qty_by_px(crate::book::Side::Bid);
        assert_eq!(bids.get(&10), Some(&5));
        let asks = pos.resting_qty_by_px(crate::book::Side::Ask);
        assert_eq!(asks.get(&12), Some(&1));
    }

    // For every fill, `money_after - money_before == -sign(dir) *
    // executed_qty * px` and `qty_after - qty_before == sign(dir) * executed_qty`,
    // over arbitrary starting positions and fill parameters.
    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_fill_accounting_invariant(
                starting_qty in -1_000_i64..1_000,
                starting_money in -1_000_000_i64..1_000_000,
                px in 1_i64..10_000,
                executed_qty in 1_i64..1_000,
                buy in any::<bool>(),
            ) {
                let direction = if buy { Direction::Buy } else { Direction::Sell };
                let mut pos = Positions::new(starting_qty, starting_money);
                pos.apply_fill(direction, px, executed_qty);

                let sign = direction.sign();
                prop_assert_eq!(pos.qty - starting_qty, sign * executed_qty);
                prop_assert_eq!(pos.money - starting_money, -sign * executed_qty * px);
            }
        }
    }
}
