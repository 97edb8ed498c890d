//! Dispatch core (C4): the single point of serialisation between the
//! market stream, the user stream, and synchronous RPC replies on one
//! side, and the strategy's callbacks on the other.
//!
//! `Dispatch` owns the event lock and the readiness state machine;
//! connectors call its `on_*` methods from whatever thread delivered the
//! underlying frame, and those methods serialise entry (mutual exclusion),
//! track back-pressure (`pending_events`), and fan out to a
//! `StrategyCallbacks` implementation. The bidirectional connector /
//! runner / strategy friendships this replaces collapse here into one
//! narrow, one-way interface: connectors call into `Dispatch`, `Dispatch`
//! calls into the strategy through `StrategyCallbacks`, and the strategy
//! reaches back out only through the `StrategyContext` handed to it.

use crate::book::{Direction, OrderBook, Trade};
use crate::errors::UserConnectorError;
use crate::position::{LimitOrder, Positions};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// Readiness state machine gating `StrategyCallbacks::on_connectors_ready`,
/// which fires exactly once, on the transition into `BothReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Init,
    MarketReady,
    UserReady,
    BothReady,
}

impl Readiness {
    fn advance_market(self) -> Self {
        match self {
            Readiness::Init => Readiness::MarketReady,
            Readiness::UserReady => Readiness::BothReady,
            ready => ready,
        }
    }

    fn advance_user(self) -> Self {
        match self {
            Readiness::Init => Readiness::UserReady,
            Readiness::MarketReady => Readiness::BothReady,
            ready => ready,
        }
    }
}

/// Read-only views of the state a strategy callback may consult, plus the
/// two RPCs it may issue. The "readable book", "readable positions",
/// "order submitter" triad a strategy is allowed to touch, nothing more.
pub trait StrategyContext {
    fn book(&self) -> &OrderBook;
    fn last_trade(&self) -> Option<&Trade>;
    fn positions(&self) -> &Positions;

    /// Back-pressure accessor for use inside a reconciliation loop.
    fn pending_events(&self) -> i64;

    fn post_order(
        &mut self,
        px: i64,
        qty: i64,
        direction: Direction,
    ) -> Result<LimitOrder, UserConnectorError>;

    fn cancel_order(&mut self, order_id: &str) -> Result<(), UserConnectorError>;
}

/// The strategy side of the dispatch boundary. Every method runs under the
/// event lock: implementations never see two calls overlap.
pub trait StrategyCallbacks {
    fn on_connectors_ready(&mut self, ctx: &mut dyn StrategyContext);
    fn on_order_book_update(&mut self, ctx: &mut dyn StrategyContext);
    fn on_trades_update(&mut self, ctx: &mut dyn StrategyContext);
    fn on_our_trade(
        &mut self,
        ctx: &mut dyn StrategyContext,
        order_id: &str,
        direction: Direction,
        px: i64,
        executed_qty: i64,
    );
}

/// Scoped guard held for the duration of one dispatched callback.
/// Constructing it increments `pending_events`; dropping it decrements.
/// The mutex guard it carries is what makes callbacks mutually exclusive.
pub struct EventLock<'a> {
    dispatch: &'a Dispatch,
    _guard: parking_lot::MutexGuard<'a, ()>,
}

impl EventLock<'_> {
    /// True iff this is the only event currently pending: the caller
    /// should go ahead and notify the strategy. False means a fresher
    /// event is already queued behind this one, so the caller must still
    /// update book/position state but must skip the strategy callback.
    pub fn notify_now(&self) -> bool {
        self.dispatch.pending_events.load(Ordering::Acquire) == 1
    }

    /// Events queued behind this one, not counting this one itself.
    pub fn pending_events(&self) -> i64 {
        self.dispatch.pending_events.load(Ordering::Acquire) - 1
    }
}

impl Drop for EventLock<'_> {
    fn drop(&mut self) {
        self.dispatch.pending_events.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The dispatch core itself. Shared (by reference) across the market
/// connector, the user connector, and the strategy; it owns only the
/// serialisation machinery, not the connectors or strategy state
/// themselves (those are owned by the `Engine` that wires everything
/// together, per component construction).
pub struct Dispatch {
    pending_events: AtomicI64,
    mutex: Mutex<()>,
    readiness: Mutex<Readiness>,
}

impl Dispatch {
    pub fn new() -> Self {
        Self {
            pending_events: AtomicI64::new(0),
            mutex: Mutex::new(()),
            readiness: Mutex::new(Readiness::Init),
        }
    }

    pub fn readiness(&self) -> Readiness {
        *self.readiness.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::BothReady
    }

    /// Acquire the event lock for one incoming frame. The increment
    /// happens before the mutex is taken, so a frame arriving while
    /// another callback is in flight is already visible to that
    /// callback's `pending_events()`/`notify_now()` before it is itself
    /// scheduled.
    pub fn enter(&self) -> EventLock<'_> {
        self.pending_events.fetch_add(1, Ordering::AcqRel);
        let guard = self.mutex.lock();
        EventLock {
            dispatch: self,
            _guard: guard,
        }
    }

    /// Back-pressure accessor for use outside the lock, or from within a
    /// strategy callback's own reconciliation loop (which already holds
    /// the event lock it was dispatched under). Safe to read without
    /// holding the lock: the counter is atomic.
    pub fn pending_events(&self) -> i64 {
        (self.pending_events.load(Ordering::Acquire) - 1).max(0)
    }

    /// Called by the market connector once both its internal streams
    /// (order book + trades) are subscribed.
    pub fn on_market_connector_ready(
        &self,
        strategy: &mut impl StrategyCallbacks,
        ctx: &mut dyn StrategyContext,
    ) {
        let lock = self.enter();
        let became_ready = self.advance_readiness(Readiness::advance_market);
        if became_ready {
            strategy.on_connectors_ready(ctx);
        }
        drop(lock);
    }

    /// Called by the user connector once it has seeded positions and
    /// subscribed the own-trades stream.
    pub fn on_user_connector_ready(
        &self,
        strategy: &mut impl StrategyCallbacks,
        ctx: &mut dyn StrategyContext,
    ) {
        let lock = self.enter();
        let became_ready = self.advance_readiness(Readiness::advance_user);
        if became_ready {
            strategy.on_connectors_ready(ctx);
        }
        drop(lock);
    }

    fn advance_readiness(&self, advance: impl FnOnce(Readiness) -> Readiness) -> bool {
        let mut readiness = self.readiness.lock();
        let before = *readiness;
        *readiness = advance(before);
        before != Readiness::BothReady && *readiness == Readiness::BothReady
    }

    /// Forward a book update, coalescing it away if a fresher event is
    /// already queued. Book/trade callbacks before `BothReady` are
    /// withheld entirely, matching the market connector's own readiness
    /// gate.
    pub fn on_order_book_update(
        &self,
        strategy: &mut impl StrategyCallbacks,
        ctx: &mut dyn StrategyContext,
    ) {
        let lock = self.enter();
        if self.is_ready() && lock.notify_now() {
            strategy.on_order_book_update(ctx);
        }
        drop(lock);
    }

    pub fn on_trades_update(
        &self,
        strategy: &mut impl StrategyCallbacks,
        ctx: &mut dyn StrategyContext,
    ) {
        let lock = self.enter();
        if self.is_ready() && lock.notify_now() {
            strategy.on_trades_update(ctx);
        }
        drop(lock);
    }

    /// Forward an own-fill notification. Never coalesced: positions are
    /// monotonic and every fill must be observed. Delivering this before
    /// `BothReady` is a protocol violation by the user connector, not a
    /// recoverable condition.
    pub fn on_our_trade(
        &self,
        strategy: &mut impl StrategyCallbacks,
        ctx: &mut dyn StrategyContext,
        order_id: &str,
        direction: Direction,
        px: i64,
        executed_qty: i64,
    ) {
        let lock = self.enter();
        assert!(
            self.is_ready(),
            "protocol violation: own-fill callback delivered before connectors reached BothReady"
        );
        strategy.on_our_trade(ctx, order_id, direction, px, executed_qty);
        drop(lock);
    }
}

impl Default for Dispatch {
    fn default() -> Self {
        Self::new()
    }
}
