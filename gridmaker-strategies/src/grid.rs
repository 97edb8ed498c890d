//! The grid quoting strategy: maintains a target ladder of resting orders
//! on each side of the book and reconciles it against the live-orders map
//! with the minimal set of post/cancel RPCs.
//!
//! Both ladders are `VecDeque<TargetLevel>`, front-first-is-best, just like
//! [`gridmaker_core::book::OneSidedBook`]. Three things move the ladder:
//! connecting for the first time ([`GridStrategy::initialize`], off the
//! book midpoint), the market moving far enough that the ladder would
//! otherwise sit unreasonably far from the book
//! ([`GridStrategy::update_price_change`]), and one of our own orders
//! filling, which rotates quoted size to the opposite side
//! ([`GridStrategy::update_execution`]).

use gridmaker_core::book::{Direction, Side};
use gridmaker_core::dispatch::{StrategyCallbacks, StrategyContext};
use gridmaker_core::errors::UserConnectorError;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};

/// The four strategy parameters from the `strategy` config section.
#[derive(Debug, Clone, Copy)]
pub struct GridConfig {
    /// Maximum simultaneous resting orders per side.
    pub max_levels: usize,
    /// Lots quoted at each ladder level (the last level of a ladder may
    /// quote less, down to the remaining budget).
    pub order_size: i64,
    /// Minimum distance, in ticks, between the two ladders' front levels.
    pub spread: i64,
    /// If true, compute the target ladder and reconciliation plan but
    /// never actually call `post_order`/`cancel_order`.
    pub debug: bool,
}

impl GridConfig {
    pub fn new(max_levels: usize, order_size: i64, spread: i64, debug: bool) -> Self {
        assert!(max_levels > 0, "max_levels must be positive");
        assert!(order_size > 0, "order_size must be positive");
        assert!(spread >= 2, "spread must be >= 2, got {spread}");
        Self { max_levels, order_size, spread, debug }
    }
}

/// One level of a target ladder: a price the strategy wants a resting
/// order at, and the quantity it wants resting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLevel {
    pub px: i64,
    pub qty: i64,
}

/// The grid strategy's state: one ladder per side, plus the conserved
/// total quoted quantity (rotation moves quantity between ladders but
/// never creates or destroys it).
pub struct GridStrategy {
    config: GridConfig,
    target_bids: VecDeque<TargetLevel>,
    target_asks: VecDeque<TargetLevel>,
    qty_sum: i64,
}

impl GridStrategy {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            target_bids: VecDeque::new(),
            target_asks: VecDeque::new(),
            qty_sum: 0,
        }
    }

    pub fn target_bids(&self) -> &VecDeque<TargetLevel> {
        &self.target_bids
    }

    pub fn target_asks(&self) -> &VecDeque<TargetLevel> {
        &self.target_asks
    }

    fn ladder(&self, side: Side) -> &VecDeque<TargetLevel> {
        match side {
            Side::Bid => &self.target_bids,
            Side::Ask => &self.target_asks,
        }
    }

    fn ladder_mut(&mut self, side: Side) -> &mut VecDeque<TargetLevel> {
        match side {
            Side::Bid => &mut self.target_bids,
            Side::Ask => &mut self.target_asks,
        }
    }

    /// Invariant checks over both ladders. Fatal: a violation means the
    /// reconciliation logic above has a bug, not that the venue sent bad
    /// data (the venue never sees the ladder).
    fn validate(&self) {
        assert!(
            !self.target_bids.is_empty() || !self.target_asks.is_empty(),
            "target ladder has no quotes on either side"
        );
        for side in [Side::Bid, Side::Ask] {
            let sign = side.sign();
            let ladder = self.ladder(side);
            for level in ladder {
                assert!(
                    level.qty > 0 && level.qty <= self.config.order_size,
                    "target ladder level qty out of [1, order_size]: {level:?}"
                );
            }
            for pair in ladder.iter().zip(ladder.iter().skip(1)) {
                assert!(
                    pair.1.px == pair.0.px - sign,
                    "target ladder for {side:?} is not a contiguous 1-tick run: {:?} then {:?}",
                    pair.0,
                    pair.1
                );
            }
        }
        if let (Some(bid), Some(ask)) = (self.target_bids.front(), self.target_asks.front()) {
            assert!(
                ask.px - bid.px >= self.config.spread - 1,
                "target ladder spread {} below configured minimum {}",
                ask.px - bid.px,
                self.config.spread - 1
            );
        }
        let total: i64 = self.target_bids.iter().map(|l| l.qty).sum::<i64>()
            + self.target_asks.iter().map(|l| l.qty).sum::<i64>();
        assert_eq!(total, self.qty_sum, "target ladder quantity sum diverged from qty_sum");
    }

    /// Walk outward from `start_px` in `order_size` chunks until `side`'s
    /// available budget (cash for bids, inventory for asks) is exhausted
    /// or nothing more is needed.
    fn build_side(&mut self, side: Side, start_px: i64, ctx: &dyn StrategyContext) {
        let sign = side.sign();
        let budget = match side {
            Side::Bid => {
                let best_bid_px = ctx.book().bid.best_px().expect("initialize called before book is ready");
                (ctx.positions().money / best_bid_px).max(0)
            }
            Side::Ask => ctx.positions().qty.max(0),
        };

        let ladder = self.ladder_mut(side);
        let mut placed = 0i64;
        let mut level_idx = 0i64;
        while placed < budget {
            let qty = (budget - placed).min(self.config.order_size);
            if qty <= 0 {
                break;
            }
            ladder.push_back(TargetLevel { px: start_px - sign * level_idx, qty });
            placed += qty;
            level_idx += 1;
        }
        self.qty_sum += placed;
    }

    /// Build both ladders from scratch, once, on `on_connectors_ready`.
    /// The anchor is the book midpoint, and the ask ladder's own anchor is
    /// derived from the bid ladder's actual first level rather than from
    /// the midpoint directly: the minimum-spread alignment rule adds one
    /// extra tick of separation when the first bid level is quoting a
    /// full `order_size`, so that a later full-size fill rotating into
    /// the ask side still has room to land without violating the
    /// configured minimum spread.
    pub fn initialize(&mut self, ctx: &dyn StrategyContext) {
        let best_bid_px = ctx.book().bid.best_px().expect("initialize called before book is ready");
        let best_ask_px = ctx.book().ask.best_px().expect("initialize called before book is ready");
        let mid = (best_bid_px + best_ask_px) / 2;
        let first_bid_px = mid - self.config.spread / 2;

        self.build_side(Side::Bid, first_bid_px, ctx);

        let first_bid_qty = self.target_bids.front().map(|l| l.qty).unwrap_or(0);
        let alignment = if first_bid_qty == self.config.order_size { 1 } else { 0 };
        let first_ask_px = first_bid_px + self.config.spread + alignment;

        self.build_side(Side::Ask, first_ask_px, ctx);
        self.validate();
    }

    /// Translate a side's ladder so its front price sits exactly
    /// `spread` ticks from the book's current best quote. Called for the
    /// side whose ladder is non-empty when the *other* side is empty:
    /// with no competing anchor from the missing side, the present side
    /// must track the book directly rather than wait for a fill to move it.
    fn update_price_change(&mut self, side: Side, ctx: &dyn StrategyContext) {
        let sign = side.sign();
        let target_px = match side {
            Side::Bid => ctx.book().bid.best_px().expect("price change with unready book") - self.config.spread,
            Side::Ask => ctx.book().ask.best_px().expect("price change with unready book") + self.config.spread,
        };
        let ladder = self.ladder_mut(side);
        let front = ladder.front().copied().expect("price change update on an empty target ladder");
        // Only pull the ladder toward the book when it has fallen behind;
        // a front already at least as aggressive as the minimum bound is left alone.
        if front.px * sign < target_px * sign {
            let shift = target_px - front.px;
            for level in ladder.iter_mut() {
                level.px += shift;
            }
            debug!(?side, shift, "translated target ladder on price drift");
        }
        self.validate();
    }

    /// Rotate `executed_qty` lots of `executed_side` fill into the
    /// opposite side's ladder: consume from the executed side's
    /// front level (dropping it once empty), and either grow the
    /// opposite side's front level up to `order_size` or push a new
    /// level one tick closer to the midpoint. Total quoted quantity
    /// (`qty_sum`) is unchanged by construction.
    pub fn update_execution(&mut self, executed_side: Side, executed_px: i64, mut executed_qty: i64) {
        let sign = executed_side.sign();
        let mut first_level = true;
        while executed_qty > 0 {
            let ladder = self.ladder_mut(executed_side);
            let front = ladder.front_mut().expect("execution on an empty target ladder");
            let front_px = front.px;
            if first_level {
                // Usually the ladder's own front price: post_levels only ever
                // posts at ladder prices. They can diverge when a price-drift
                // translation (update_price_change) outran post_levels under
                // back-pressure and the filled order was still resting at its
                // pre-translation price; that is a race, not a bug, so this
                // only logs rather than asserting.
                if executed_px != front_px {
                    debug!(
                        executed_px,
                        front_px, ?executed_side, "own-fill price does not match current target ladder front"
                    );
                }
                first_level = false;
            }
            let remove_qty = executed_qty.min(front.qty);
            front.qty -= remove_qty;
            if front.qty == 0 {
                ladder.pop_front();
            }
            executed_qty -= remove_qty;

            let opposite = executed_side.opposite();
            let saturated = match self.ladder(opposite).front() {
                None => true,
                Some(opp_front) => opp_front.qty == self.config.order_size,
            };
            if saturated {
                // No room to grow the opposite front (or nothing there yet):
                // start a fresh level one full spread out from this execution.
                let opp = self.ladder_mut(opposite);
                opp.push_front(TargetLevel { px: front_px + sign * (self.config.spread - 1), qty: remove_qty });
            } else {
                let opp = self.ladder_mut(opposite);
                let opp_front = opp.front_mut().expect("checked non-empty above");
                let delta = remove_qty.min(self.config.order_size - opp_front.qty);
                opp_front.qty += delta;
                let opp_front_px = opp_front.px;
                let remainder = remove_qty - delta;
                if remainder > 0 {
                    opp.push_front(TargetLevel { px: opp_front_px - sign, qty: remainder });
                }
            }
        }
        self.validate();
    }

    /// Diff `side`'s first `max_levels` target levels against the live
    /// orders on that side and issue the minimal set of cancel/post RPCs
    /// to converge them. Returns `true` if back-pressure forced an early
    /// return (a fresher event is already queued): the caller must stop
    /// the whole `post_orders` pass and let that event's own reconciliation
    /// take over.
    fn post_levels(&self, side: Side, only_cancel: bool, ctx: &mut dyn StrategyContext) -> bool {
        let ladder = self.ladder(side);
        let take = ladder.len().min(self.config.max_levels);

        let mut new_qty_by_px: BTreeMap<i64, i64> = BTreeMap::new();
        let mut levels_best_first = Vec::with_capacity(take);
        for level in ladder.iter().take(take) {
            *new_qty_by_px.entry(level.px).or_insert(0) += level.qty;
            levels_best_first.push(*level);
        }

        let mut old_qty_by_px = ctx.positions().resting_qty_by_px(side);

        let mut cancels: Vec<(String, i64)> = Vec::new();
        for (order_id, order) in ctx.positions().orders.iter() {
            if order.direction.side() != side {
                continue;
            }
            let new_qty = new_qty_by_px.get(&order.px).copied().unwrap_or(0);
            let old_qty = *old_qty_by_px.get(&order.px).unwrap_or(&0);
            if new_qty < old_qty {
                cancels.push((order_id.clone(), order.px));
                *old_qty_by_px.get_mut(&order.px).unwrap() -= order.remaining_qty;
            }
        }
        // Worst-first: furthest from the top of book, so an aborted pass
        // leaves top-of-book presence intact for as long as possible.
        cancels.sort_by_key(|(_, px)| px * side.sign());

        if self.config.debug {
            for (order_id, px) in &cancels {
                debug!(order_id, px, ?side, "debug mode: would cancel");
            }
        } else {
            for (order_id, _px) in &cancels {
                match ctx.cancel_order(order_id) {
                    Ok(()) => {}
                    Err(UserConnectorError::CancelRace { order_id }) => {
                        warn!(order_id, "cancel raced an execution; will reconcile on the own-fill event");
                    }
                    Err(e) => warn!(error = %e, "cancel_order failed"),
                }
                if ctx.pending_events() >= 1 {
                    return true;
                }
            }
        }

        if only_cancel {
            return false;
        }

        for level in levels_best_first {
            let already = old_qty_by_px.get(&level.px).copied().unwrap_or(0);
            let place_qty = level.qty - already;
            if place_qty <= 0 {
                continue;
            }
            assert!(place_qty <= self.config.order_size, "post plan exceeds order_size at a single level");
            let direction = match side {
                Side::Bid => Direction::Buy,
                Side::Ask => Direction::Sell,
            };
            if self.config.debug {
                debug!(px = level.px, qty = place_qty, ?direction, "debug mode: would post");
            } else {
                match ctx.post_order(level.px, place_qty, direction) {
                    Ok(order) => info!(order_id = %order.order_id, px = level.px, qty = place_qty, ?direction, "posted"),
                    Err(e) => warn!(error = %e, px = level.px, qty = place_qty, "post_order failed"),
                }
                if ctx.pending_events() >= 1 {
                    return true;
                }
            }
        }
        false
    }

    /// Run the full reconciliation: recalibrate a side left without a
    /// competing anchor, then cancel-bids, cancel-asks, post-bids,
    /// post-asks, short-circuiting at the first point back-pressure is
    /// observed.
    pub fn post_orders(&mut self, ctx: &mut dyn StrategyContext) {
        if ctx.pending_events() >= 1 {
            return;
        }
        if self.target_bids.is_empty() {
            self.update_price_change(Side::Ask, ctx);
        }
        if self.target_asks.is_empty() {
            self.update_price_change(Side::Bid, ctx);
        }
        if self.post_levels(Side::Bid, true, ctx) {
            return;
        }
        if self.post_levels(Side::Ask, true, ctx) {
            return;
        }
        if self.post_levels(Side::Bid, false, ctx) {
            return;
        }
        self.post_levels(Side::Ask, false, ctx);
    }
}

impl StrategyCallbacks for GridStrategy {
    fn on_connectors_ready(&mut self, ctx: &mut dyn StrategyContext) {
        self.initialize(ctx);
        self.post_orders(ctx);
    }

    fn on_order_book_update(&mut self, ctx: &mut dyn StrategyContext) {
        self.post_orders(ctx);
    }

    fn on_trades_update(&mut self, ctx: &mut dyn StrategyContext) {
        self.post_orders(ctx);
    }

    fn on_our_trade(
        &mut self,
        ctx: &mut dyn StrategyContext,
        _order_id: &str,
        direction: Direction,
        px: i64,
        executed_qty: i64,
    ) {
        self.update_execution(direction.side(), px, executed_qty);
        self.post_orders(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmaker_core::book::{Level, OrderBook};
    use gridmaker_core::position::{LimitOrder, Positions};
    use std::collections::HashSet;

    struct TestContext {
        book: OrderBook,
        positions: Positions,
        next_order_id: u64,
        pending_events: i64,
        fail_cancel: HashSet<String>,
        cancel_count: usize,
        trip_pending_after_cancel: Option<usize>,
    }

    impl TestContext {
        fn new(bid: &[(i64, i64)], ask: &[(i64, i64)], qty: i64, money: i64) -> Self {
            let mut book = OrderBook::new();
            book.sync_from_snapshot(
                bid.iter().map(|&(px, qty)| Level { px, qty }).collect(),
                ask.iter().map(|&(px, qty)| Level { px, qty }).collect(),
                0,
            );
            Self {
                book,
                positions: Positions::new(qty, money),
                next_order_id: 1,
                pending_events: 0,
                fail_cancel: HashSet::new(),
                cancel_count: 0,
                trip_pending_after_cancel: None,
            }
        }
    }

    impl StrategyContext for TestContext {
        fn book(&self) -> &OrderBook {
            &self.book
        }
        fn last_trade(&self) -> Option<&gridmaker_core::book::Trade> {
            None
        }
        fn positions(&self) -> &Positions {
            &self.positions
        }
        fn pending_events(&self) -> i64 {
            self.pending_events
        }
        fn post_order(&mut self, px: i64, qty: i64, direction: Direction) -> Result<LimitOrder, UserConnectorError> {
            let order_id = format!("t{}", self.next_order_id);
            self.next_order_id += 1;
            let order = LimitOrder { order_id: order_id.clone(), direction, px, remaining_qty: qty };
            self.positions.orders.insert(order_id, order.clone());
            Ok(order)
        }
        fn cancel_order(&mut self, order_id: &str) -> Result<(), UserConnectorError> {
            self.cancel_count += 1;
            if self.trip_pending_after_cancel == Some(self.cancel_count) {
                self.pending_events = 1;
            }
            if self.fail_cancel.remove(order_id) {
                return Err(UserConnectorError::CancelRace { order_id: order_id.to_string() });
            }
            self.positions.orders.remove(order_id);
            Ok(())
        }
    }

    fn config(max_levels: usize, order_size: i64, spread: i64) -> GridConfig {
        GridConfig::new(max_levels, order_size, spread, false)
    }

    #[test]
    fn initializes_bid_ladder_from_cash_budget() {
        let ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        let bids: Vec<_> = strategy.target_bids().iter().copied().collect();
        assert_eq!(
            bids,
            vec![
                TargetLevel { px: 10, qty: 3 },
                TargetLevel { px: 9, qty: 3 },
                TargetLevel { px: 8, qty: 3 },
                TargetLevel { px: 7, qty: 1 },
            ]
        );
        assert!(strategy.target_asks().is_empty());
    }

    #[test]
    fn buy_fill_rotates_qty_into_empty_ask_side() {
        let ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        strategy.update_execution(Side::Bid, 10, 2);

        assert_eq!(strategy.target_bids().front(), Some(&TargetLevel { px: 10, qty: 1 }));
        assert_eq!(strategy.target_asks().front(), Some(&TargetLevel { px: 11, qty: 2 }));
    }

    #[test]
    fn full_bid_level_fill_pops_it_and_starts_a_fresh_ask_level() {
        let ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        strategy.update_execution(Side::Bid, 10, 3);

        assert_eq!(strategy.target_bids().front(), Some(&TargetLevel { px: 9, qty: 3 }));
        assert_eq!(strategy.target_asks().front(), Some(&TargetLevel { px: 11, qty: 3 }));
    }

    #[test]
    fn price_drift_pulls_a_stale_far_side_ladder_back_toward_the_book() {
        // An ask-only ladder left over from before the book moved: its
        // front (16) sits well above where a fresh spread off the new
        // book would put it.
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.target_asks.push_back(TargetLevel { px: 16, qty: 3 });
        strategy.target_asks.push_back(TargetLevel { px: 17, qty: 3 });
        strategy.qty_sum = 6;

        let ctx = TestContext::new(&[(8, 5)], &[(10, 5)], 0, 100);
        strategy.update_price_change(Side::Ask, &ctx);

        // target = best_ask + spread = 12; front(16) was further from the
        // book than that, so the whole ladder shifts down by -4.
        let asks: Vec<_> = strategy.target_asks().iter().copied().collect();
        assert_eq!(asks, vec![TargetLevel { px: 12, qty: 3 }, TargetLevel { px: 13, qty: 3 }]);
    }

    #[test]
    fn price_drift_leaves_a_ladder_alone_when_it_is_already_at_least_as_aggressive() {
        // Front (9) is already closer to the book than the minimum bound
        // (best_bid - spread = 6), so no translation should occur.
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.target_bids.push_back(TargetLevel { px: 9, qty: 3 });
        strategy.qty_sum = 3;

        let ctx = TestContext::new(&[(8, 5)], &[(10, 5)], 0, 100);
        strategy.update_price_change(Side::Bid, &ctx);

        assert_eq!(strategy.target_bids().front(), Some(&TargetLevel { px: 9, qty: 3 }));
    }

    #[test]
    fn post_orders_issues_initial_bid_posts() {
        let mut ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        strategy.post_orders(&mut ctx);

        let mut bid_orders: Vec<_> = ctx
            .positions()
            .orders
            .values()
            .filter(|o| o.direction == Direction::Buy)
            .map(|o| (o.px, o.remaining_qty))
            .collect();
        bid_orders.sort();
        assert_eq!(bid_orders, vec![(7, 1), (8, 3), (9, 3), (10, 3)]);
        assert!(ctx.positions().orders.values().all(|o| o.direction != Direction::Sell));
    }

    #[test]
    fn post_orders_reconciles_only_the_diff() {
        let mut ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        strategy.post_orders(&mut ctx);
        let first_pass_ids: HashSet<String> = ctx.positions().orders.keys().cloned().collect();

        // Nothing changed: a second pass should not cancel or re-post anything.
        strategy.post_orders(&mut ctx);
        let second_pass_ids: HashSet<String> = ctx.positions().orders.keys().cloned().collect();
        assert_eq!(first_pass_ids, second_pass_ids);
    }

    #[test]
    fn post_levels_short_circuits_on_back_pressure() {
        let mut ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        ctx.pending_events = 1;
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        strategy.post_orders(&mut ctx);
        assert!(ctx.positions().orders.is_empty(), "back-pressure at entry must skip the whole pass");
    }

    #[test]
    fn cancel_race_is_logged_and_does_not_abort_the_pass() {
        let mut ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        strategy.post_orders(&mut ctx);

        // A 1-lot fill shrinks the px=10 level from 3 to 2, so the next
        // reconciliation pass needs to cancel that order; arrange for the
        // cancel to race an execution instead.
        let stale_order_id = ctx
            .positions()
            .orders
            .iter()
            .find(|(_, o)| o.px == 10)
            .map(|(id, _)| id.clone())
            .unwrap();
        ctx.fail_cancel.insert(stale_order_id.clone());
        strategy.update_execution(Side::Bid, 10, 1);
        strategy.post_orders(&mut ctx);

        // The raced cancel leaves the stale order resting; everything else
        // still reconciles normally.
        assert!(ctx.positions().orders.contains_key(&stale_order_id));
    }

    #[test]
    fn cancels_are_sorted_worst_first() {
        let mut ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        strategy.post_orders(&mut ctx);

        // Shrink the whole ladder to nothing so every bid order is a cancel
        // candidate, then confirm worst-price-first ordering directly.
        let ladder: Vec<_> = strategy.target_bids().iter().copied().collect();
        let mut prices: Vec<i64> = ladder.iter().map(|l| l.px).collect();
        prices.sort();
        assert_eq!(prices, vec![7, 8, 9, 10]);

        strategy.update_execution(Side::Bid, 10, 10);
        assert!(strategy.target_bids().is_empty());
        strategy.post_orders(&mut ctx);
        assert!(ctx.positions().orders.values().all(|o| o.direction != Direction::Buy));
    }

    #[test]
    fn back_pressure_mid_loop_stops_after_the_second_cancel() {
        let mut ctx = TestContext::new(&[(10, 5)], &[(12, 5)], 0, 100);
        let mut strategy = GridStrategy::new(config(4, 3, 2));
        strategy.initialize(&ctx);
        strategy.post_orders(&mut ctx);
        let initial_order_count = ctx.positions().orders.len();
        assert_eq!(initial_order_count, 4);

        // Shrink the whole bid ladder to nothing so all four resting
        // orders become cancel candidates (worst-first: 7, 8, 9, 10), then
        // arrange for a fresh event to look like it queued right as the
        // second cancel reply came back.
        strategy.update_execution(Side::Bid, 10, 10);
        assert!(strategy.target_bids().is_empty());
        ctx.trip_pending_after_cancel = Some(2);

        strategy.post_orders(&mut ctx);

        assert_eq!(ctx.cancel_count, 2, "only the worst two cancels should have been attempted before back-pressure tripped");
        assert_eq!(
            ctx.positions().orders.len(),
            initial_order_count - 2,
            "the pass must abort before the remaining cancels or any posts"
        );
    }

    // The ladder invariants hold before and after every
    // `Initialize`/`UpdateExecution`, over arbitrary starting
    // budgets and arbitrary sequences of fills. `validate()` (called
    // internally by both) is the property itself: the test just needs to
    // drive enough randomized fills to exercise it without panicking on
    // an out-of-range fill (a fill can never exceed what is actually
    // resting, so each step clamps to the current front side's total).
    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn prop_ladder_invariants_hold_across_random_fills(
                money in 10_i64..10_000,
                starting_qty in 0_i64..50,
                order_size in 1_i64..6,
                spread in 2_i64..6,
                max_levels in 1_usize..8,
                fill_picks in prop::collection::vec((any::<bool>(), 1_u32..20), 0..30),
            ) {
                let ctx = TestContext::new(&[(100, 5)], &[(100 + spread, 5)], starting_qty, money);
                let mut strategy = GridStrategy::new(GridConfig::new(max_levels, order_size, spread, false));
                strategy.initialize(&ctx);
                strategy.validate();

                for (pick_bid, raw_qty) in fill_picks {
                    let side = if pick_bid { Side::Bid } else { Side::Ask };
                    let total_on_side: i64 = strategy.ladder(side).iter().map(|l| l.qty).sum();
                    if total_on_side == 0 {
                        continue;
                    }
                    let qty = 1 + (raw_qty as i64 % total_on_side);
                    let front_px = strategy.ladder(side).front().unwrap().px;
                    strategy.update_execution(side, front_px, qty);
                    strategy.validate();
                }
            }

            // P4: after a `post_orders` pass that runs to completion (no
            // back-pressure abort, which `TestContext::pending_events`
            // never reports here), the live-orders set on each side
            // equals the first `max_levels` ladder entries with non-zero
            // quantity, keyed by price.
            #[test]
            fn prop_post_orders_reconciles_exactly_to_the_capped_ladder(
                money in 10_i64..10_000,
                starting_qty in 0_i64..50,
                order_size in 1_i64..6,
                spread in 2_i64..6,
                max_levels in 1_usize..8,
            ) {
                let mut ctx = TestContext::new(&[(100, 5)], &[(100 + spread, 5)], starting_qty, money);
                let mut strategy = GridStrategy::new(GridConfig::new(max_levels, order_size, spread, false));
                strategy.initialize(&ctx);
                strategy.post_orders(&mut ctx);

                for side in [Side::Bid, Side::Ask] {
                    let direction = match side {
                        Side::Bid => Direction::Buy,
                        Side::Ask => Direction::Sell,
                    };
                    let mut expected: BTreeMap<i64, i64> = BTreeMap::new();
                    for level in strategy.ladder(side).iter().take(max_levels) {
                        if level.qty > 0 {
                            *expected.entry(level.px).or_insert(0) += level.qty;
                        }
                    }
                    let mut live: BTreeMap<i64, i64> = BTreeMap::new();
                    for order in ctx.positions().orders.values().filter(|o| o.direction == direction) {
                        *live.entry(order.px).or_insert(0) += order.remaining_qty;
                    }
                    prop_assert_eq!(live, expected, "side {:?} live orders diverged from capped target ladder", side);
                }
            }
        }
    }
}
