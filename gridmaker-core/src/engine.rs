//! Wiring between the two connectors, the dispatch core, and a strategy.
//! It is the thing that owns them all and drives one poll of each venue
//! stream per [`Engine::step`]: the strategy is single-threaded
//! cooperative from its own perspective without requiring the venue
//! client to be thread-based, because the abstract [`crate::venue`]
//! traits are poll-based, so a plain loop calling `step` repeatedly is
//! the idiomatic Rust expression of that model.
//!
//! `Engine` is also where the self-referential-context problem gets
//! solved: [`crate::dispatch::StrategyContext`] must read the market
//! connector's book and reach into the user connector's post/cancel
//! RPCs, including *from inside* the own-fill callback a `pump()` on the
//! user connector triggers. Building that context only after each `pump`
//! call has returned (see [`connectors::market`] and
//! [`connectors::user`]'s module docs) means `EngineCtx` below just
//! borrows disjoint fields of `Engine` (no interior mutability or
//! unsafe aliasing required).

use crate::book::{Direction, OrderBook, Trade};
use crate::connectors::{MarketConnector, MarketEvent, UserConnector};
use crate::dispatch::{Dispatch, StrategyCallbacks, StrategyContext};
use crate::errors::{GridError, UserConnectorError};
use crate::position::{LimitOrder, Positions};
use crate::venue::{MarketDataStream, OperationsService, OrdersService, UserDataStream};
use std::time::Duration;

pub struct Engine<S, U> {
    dispatch: Dispatch,
    market: MarketConnector<S>,
    user: UserConnector<U>,
}

impl<S, U> Engine<S, U>
where
    S: MarketDataStream,
    U: UserDataStream + OrdersService + OperationsService,
{
    pub fn new(market: MarketConnector<S>, user: UserConnector<U>) -> Self {
        Self { dispatch: Dispatch::new(), market, user }
    }

    pub fn book(&self) -> &OrderBook {
        self.market.book()
    }

    pub fn positions(&self) -> &Positions {
        self.user.positions()
    }

    /// Direct access to the market connector, for feeding a mock/simulated
    /// venue's underlying stream from outside the engine.
    pub fn market_mut(&mut self) -> &mut MarketConnector<S> {
        &mut self.market
    }

    /// Direct access to the user connector, for feeding a mock/simulated
    /// venue's underlying stream from outside the engine, or issuing a
    /// manual post/cancel outside of a strategy callback.
    pub fn user_mut(&mut self) -> &mut UserConnector<U> {
        &mut self.user
    }

    pub fn is_ready(&self) -> bool {
        self.dispatch.is_ready()
    }

    /// Subscribe the market streams, seed positions and subscribe the
    /// own-trades stream, and fire `on_connectors_ready` for whichever
    /// side becomes ready here. In the ordinary case the user connector
    /// (one synchronous RPC) comes up before the market connector has
    /// delivered its first snapshot, so `step` is what actually fires
    /// readiness; `start` still checks in case a test double returns the
    /// market connector's ready transition from `start` directly.
    pub fn start(&mut self, strategy: &mut impl StrategyCallbacks) -> Result<(), GridError> {
        self.market.start()?;
        self.user.start()?;
        let mut ctx = self.context();
        self.dispatch.on_user_connector_ready(strategy, &mut ctx);
        Ok(())
    }

    fn context(&mut self) -> EngineCtx<'_, S, U> {
        EngineCtx {
            market: &self.market,
            user: &mut self.user,
            dispatch: &self.dispatch,
        }
    }

    /// Drain every currently-available frame on both streams once, in
    /// market-then-user order, dispatching each event to `strategy` as
    /// it is observed. Returns the number of events processed (0 means
    /// nothing was waiting on either stream).
    pub fn step(&mut self, strategy: &mut impl StrategyCallbacks) -> Result<usize, GridError> {
        let mut processed = 0;

        for event in self.market.pump()? {
            let mut ctx = self.context();
            match event {
                MarketEvent::ConnectorReady => self.dispatch.on_market_connector_ready(strategy, &mut ctx),
                MarketEvent::BookUpdate => self.dispatch.on_order_book_update(strategy, &mut ctx),
                MarketEvent::TradeUpdate => self.dispatch.on_trades_update(strategy, &mut ctx),
            }
            processed += 1;
        }

        for event in self.user.pump() {
            let mut ctx = self.context();
            self.dispatch.on_our_trade(strategy, &mut ctx, &event.order_id, event.direction, event.px, event.executed_qty);
            processed += 1;
        }

        Ok(processed)
    }

    /// Call `step` until `should_continue` returns false, sleeping
    /// `idle_sleep` whenever a step drained nothing. Intended for the
    /// poll-based mock/live venues this crate ships; a push-based venue
    /// client would instead call `step` from its own callback.
    pub fn run_while(
        &mut self,
        strategy: &mut impl StrategyCallbacks,
        idle_sleep: Duration,
        mut should_continue: impl FnMut() -> bool,
    ) -> Result<(), GridError> {
        while should_continue() {
            if self.step(strategy)? == 0 {
                std::thread::sleep(idle_sleep);
            }
        }
        Ok(())
    }
}

/// The concrete [`StrategyContext`] the engine hands the strategy:
/// disjoint borrows of the market connector's book, the user connector
/// (mutable, for post/cancel), and the dispatch core's back-pressure
/// counter.
struct EngineCtx<'a, S, U> {
    market: &'a MarketConnector<S>,
    user: &'a mut UserConnector<U>,
    dispatch: &'a Dispatch,
}

impl<S: MarketDataStream, U: UserDataStream + OrdersService + OperationsService> StrategyContext for EngineCtx<'_, S, U> {
    fn book(&self) -> &OrderBook {
        self.market.book()
    }

    fn last_trade(&self) -> Option<&Trade> {
        self.market.last_trade()
    }

    fn positions(&self) -> &Positions {
        self.user.positions()
    }

    fn pending_events(&self) -> i64 {
        self.dispatch.pending_events()
    }

    fn post_order(&mut self, px: i64, qty: i64, direction: Direction) -> Result<LimitOrder, UserConnectorError> {
        self.user.post_order(px, qty, direction)
    }

    fn cancel_order(&mut self, order_id: &str) -> Result<(), UserConnectorError> {
        self.user.cancel_order(order_id)
    }
}
