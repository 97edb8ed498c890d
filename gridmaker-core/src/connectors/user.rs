//! User connector. Seeds cash/inventory via one synchronous RPC,
//! subscribes to the own-trades stream, issues post/cancel RPCs, and
//! maintains the live-orders map and position accounting.
//!
//! Like the market connector, `pump` reports own-fill events instead of
//! driving the dispatch core itself: a strategy's `on_our_trade` callback
//! may turn around and call `post_order`/`cancel_order` on this very
//! connector (that is exactly what grid rotation does), which cannot
//! happen while `pump` already holds `&mut self` for the frame that
//! triggered it. The caller (`Engine`) drives `Dispatch` once `pump` has
//! returned, by which point `self` is free to be borrowed again.

use crate::book::Direction;
use crate::errors::{RpcError, UserConnectorError};
use crate::instrument::Instrument;
use crate::position::{LimitOrder, Positions};
use crate::venue::{
    OperationsService, OrderStatus, OrderType, OrdersService, PostOrderRequest, UserDataStream, UserFrame,
};
use tracing::{info, warn};

/// One own-fill notification observed while draining frames. Never
/// coalesced upstream: every frame produces exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnTradeEvent {
    pub order_id: String,
    pub direction: Direction,
    pub px: i64,
    pub executed_qty: i64,
}

pub struct UserConnector<U> {
    stream: U,
    instrument: Instrument,
    account_id: String,
    order_stream_ready: bool,
    positions: Positions,
}

impl<U: UserDataStream + OrdersService + OperationsService> UserConnector<U> {
    pub fn new(stream: U, instrument: Instrument, account_id: impl Into<String>) -> Self {
        Self {
            stream,
            instrument,
            account_id: account_id.into(),
            order_stream_ready: false,
            positions: Positions::default(),
        }
    }

    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    /// Direct access to the underlying stream, for feeding a mock venue
    /// from outside the connector (tests, the simulated binary).
    pub fn stream_mut(&mut self) -> &mut U {
        &mut self.stream
    }

    pub fn is_ready(&self) -> bool {
        self.order_stream_ready
    }

    /// Seed cash/inventory from one synchronous `get_positions` RPC, then
    /// subscribe the own-trades stream. Non-empty blocked balances are a
    /// fatal assertion: they indicate orphan orders surviving from a
    /// previous process. The caller is responsible for firing
    /// `Dispatch::on_user_connector_ready` once this returns `Ok`.
    pub fn start(&mut self) -> Result<(), UserConnectorError> {
        info!(account_id = %self.account_id, "starting user connector");
        let snapshot = self.stream.get_positions(&self.account_id)?;

        assert_eq!(snapshot.money.len(), 1, "expected exactly one currency money position, got {}", snapshot.money.len());
        assert!(
            snapshot.blocked_money.is_empty(),
            "blocked money balances at startup: orphan orders from a previous run must be cancelled first"
        );
        let money = &snapshot.money[0];
        self.positions.money = self.instrument.money_to_int(
            rust_decimal::Decimal::from(money.units) + rust_decimal::Decimal::new(money.nano as i64, 9),
        );

        assert!(
            snapshot.securities.len() <= 1,
            "expected at most one securities position, got {}",
            snapshot.securities.len()
        );
        if let Some(security) = snapshot.securities.first() {
            assert_eq!(security.instrument_id, self.instrument.id(), "securities position for unexpected instrument");
            assert_eq!(security.blocked, 0, "blocked securities balance at startup: orphan sell orders must be cancelled first");
            self.positions.qty = security.balance;
        }

        self.stream.subscribe_own_trades(&self.account_id)?;
        self.order_stream_ready = true;
        Ok(())
    }

    /// Submit a new limit order. `NEW` inserts and returns the tracked
    /// order; `PartiallyFilled`/`Rejected` surface as a recoverable
    /// `PostRejected`, since real venues can return either at post time.
    pub fn post_order(&mut self, px: i64, qty: i64, direction: Direction) -> Result<LimitOrder, UserConnectorError> {
        let (units, nano) = self.instrument.px_to_quotation(px);
        info!(%direction, qty, px, "post_order");
        let reply = self.stream.post_order(PostOrderRequest {
            instrument_id: self.instrument.id().to_string(),
            lots: qty,
            price: crate::venue::DecimalPrice { units, nano },
            direction,
            account_id: self.account_id.clone(),
            idempotency_key: String::new(),
        })?;

        assert_eq!(reply.lots_requested, qty, "post_order reply qty mismatch");
        assert_eq!(reply.direction, direction, "post_order reply direction mismatch");
        assert_eq!(reply.price, crate::venue::DecimalPrice { units, nano }, "post_order reply price mismatch");
        assert_eq!(reply.order_type, OrderType::Limit, "post_order reply order type mismatch");
        assert_eq!(reply.instrument_id, self.instrument.id(), "post_order reply instrument mismatch");

        match reply.status {
            OrderStatus::New => {
                let order = LimitOrder {
                    order_id: reply.order_id.clone(),
                    direction,
                    px,
                    remaining_qty: qty,
                };
                self.positions.orders.insert(reply.order_id, order.clone());
                info!(order_id = %order.order_id, "order placed");
                Ok(order)
            }
            OrderStatus::PartiallyFilled => Err(UserConnectorError::PostRejected {
                px,
                qty,
                reason: "partially filled on post (unsupported: market-order execution is out of scope)".to_string(),
            }),
            OrderStatus::Rejected => Err(UserConnectorError::PostRejected {
                px,
                qty,
                reason: "rejected by venue".to_string(),
            }),
        }
    }

    /// Cancel a live order. On RPC failure (most commonly a concurrent
    /// execution) the order is left in the live-orders map: the caller
    /// must treat it as potentially filled and wait for the subsequent
    /// own-fill event to clean it up.
    pub fn cancel_order(&mut self, order_id: &str) -> Result<(), UserConnectorError> {
        assert!(self.positions.orders.contains_key(order_id), "cancel_order for unknown order {order_id}");
        info!(order_id, "cancel_order");
        match self.stream.cancel_order(&self.account_id, order_id) {
            Ok(_reply) => {
                self.positions.orders.remove(order_id);
                Ok(())
            }
            Err(_rpc_error) => Err(UserConnectorError::CancelRace { order_id: order_id.to_string() }),
        }
    }

    /// Drain and process every currently-available own-trades frame,
    /// returning one `OwnTradeEvent` per frame, in order.
    pub fn pump(&mut self) -> Vec<OwnTradeEvent> {
        let mut events = Vec::new();
        while let Some(frame) = self.stream.poll_frame() {
            if let Some(event) = self.process_frame(frame) {
                events.push(event);
            }
        }
        events
    }

    fn process_frame(&mut self, frame: UserFrame) -> Option<OwnTradeEvent> {
        match frame {
            UserFrame::OrderTrades { order_id, direction, instrument_id, account_id, trades } => {
                assert_eq!(instrument_id, self.instrument.id(), "own-trade for unexpected instrument");
                assert_eq!(account_id, self.account_id, "own-trade for unexpected account");
                assert!(!trades.is_empty(), "own-trade frame with no trade prints");

                let px = self
                    .instrument
                    .quotation_to_px(trades[0].price.units, trades[0].price.nano)
                    .unwrap_or_else(|e| panic!("non-lattice price in own-trade print: {e}"));
                let executed_qty: i64 = trades
                    .iter()
                    .map(|t| {
                        let trade_px = self
                            .instrument
                            .quotation_to_px(t.price.units, t.price.nano)
                            .unwrap_or_else(|e| panic!("non-lattice price in own-trade print: {e}"));
                        assert_eq!(trade_px, px, "own-trade frame mixes prices across its trade prints");
                        self.instrument
                            .qty_to_lots(t.raw_qty)
                            .unwrap_or_else(|e| panic!("non-lot-aligned quantity in own-trade print: {e}"))
                    })
                    .sum();

                Some(self.process_own_trade(order_id, direction, px, executed_qty))
            }
            UserFrame::Ping => None,
        }
    }

    fn process_own_trade(&mut self, order_id: String, direction: Direction, px: i64, executed_qty: i64) -> OwnTradeEvent {
        match self.positions.orders.get_mut(&order_id) {
            Some(order) => {
                assert_eq!(order.px, px, "own-trade price mismatch against stored order {order_id}");
                assert_eq!(order.direction, direction, "own-trade direction mismatch against stored order {order_id}");
                assert!(
                    executed_qty <= order.remaining_qty,
                    "own-trade executed_qty {executed_qty} exceeds order {order_id}'s remaining_qty {}",
                    order.remaining_qty
                );
                order.remaining_qty -= executed_qty;
                if order.remaining_qty == 0 {
                    self.positions.orders.remove(&order_id);
                }
            }
            None => {
                warn!(order_id, "execution of a cancelled order");
            }
        }
        self.positions.apply_fill(direction, px, executed_qty);
        OwnTradeEvent { order_id, direction, px, executed_qty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::{CancelReply, DecimalPrice, MoneyBalance, PositionsSnapshot, PostOrderReply, SecurityBalance, TradePrint};
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;

    struct FakeStream {
        positions: PositionsSnapshot,
        post_replies: VecDeque<Result<PostOrderReply, RpcError>>,
        cancel_replies: VecDeque<Result<CancelReply, RpcError>>,
        frames: VecDeque<UserFrame>,
    }

    impl UserDataStream for FakeStream {
        fn subscribe_own_trades(&mut self, _account_id: &str) -> Result<(), RpcError> {
            Ok(())
        }
        fn poll_frame(&mut self) -> Option<UserFrame> {
            self.frames.pop_front()
        }
    }

    impl OrdersService for FakeStream {
        fn post_order(&mut self, request: PostOrderRequest) -> Result<PostOrderReply, RpcError> {
            self.post_replies.pop_front().unwrap_or_else(|| {
                Ok(PostOrderReply {
                    order_id: "order-1".to_string(),
                    status: OrderStatus::New,
                    direction: request.direction,
                    price: request.price,
                    order_type: OrderType::Limit,
                    instrument_id: request.instrument_id,
                    lots_requested: request.lots,
                })
            })
        }
        fn cancel_order(&mut self, _account_id: &str, _order_id: &str) -> Result<CancelReply, RpcError> {
            self.cancel_replies.pop_front().unwrap_or(Ok(CancelReply { timestamp_ns: 0 }))
        }
    }

    impl OperationsService for FakeStream {
        fn get_positions(&mut self, _account_id: &str) -> Result<PositionsSnapshot, RpcError> {
            Ok(self.positions.clone())
        }
    }

    fn instrument() -> Instrument {
        Instrument::new("TEST-INSTR", 1, dec!(1))
    }

    fn fresh_positions(qty: i64, units: i64) -> PositionsSnapshot {
        PositionsSnapshot {
            money: vec![MoneyBalance { units, nano: 0 }],
            blocked_money: vec![],
            securities: if qty != 0 {
                vec![SecurityBalance { instrument_id: "TEST-INSTR".to_string(), balance: qty, blocked: 0 }]
            } else {
                vec![]
            },
        }
    }

    fn make_connector(positions: PositionsSnapshot) -> UserConnector<FakeStream> {
        UserConnector::new(
            FakeStream { positions, post_replies: VecDeque::new(), cancel_replies: VecDeque::new(), frames: VecDeque::new() },
            instrument(),
            "acc-1",
        )
    }

    #[test]
    fn start_seeds_positions_and_marks_ready() {
        let mut connector = make_connector(fresh_positions(5, 100));
        connector.start().unwrap();
        assert_eq!(connector.positions().qty, 5);
        assert_eq!(connector.positions().money, 100);
        assert!(connector.is_ready());
    }

    #[test]
    #[should_panic(expected = "blocked money balances")]
    fn start_panics_on_blocked_money() {
        let mut snapshot = fresh_positions(0, 100);
        snapshot.blocked_money.push(MoneyBalance { units: 1, nano: 0 });
        let mut connector = make_connector(snapshot);
        let _ = connector.start();
    }

    #[test]
    fn post_order_inserts_new_order() {
        let mut connector = make_connector(fresh_positions(0, 100));
        let order = connector.post_order(10, 3, Direction::Buy).unwrap();
        assert_eq!(order.remaining_qty, 3);
        assert!(connector.positions().orders.contains_key(&order.order_id));
    }

    #[test]
    fn post_order_rejected_surfaces_as_post_rejected() {
        let mut connector = make_connector(fresh_positions(0, 100));
        connector.stream.post_replies.push_back(Ok(PostOrderReply {
            order_id: "order-1".to_string(),
            status: OrderStatus::Rejected,
            direction: Direction::Buy,
            price: DecimalPrice { units: 10, nano: 0 },
            order_type: OrderType::Limit,
            instrument_id: "TEST-INSTR".to_string(),
            lots_requested: 3,
        }));
        let err = connector.post_order(10, 3, Direction::Buy).unwrap_err();
        assert!(matches!(err, UserConnectorError::PostRejected { .. }));
    }

    #[test]
    fn cancel_failure_raises_cancel_race_and_keeps_order() {
        let mut connector = make_connector(fresh_positions(0, 100));
        let order = connector.post_order(10, 3, Direction::Buy).unwrap();
        connector.stream.cancel_replies.push_back(Err(RpcError::CancelOrderError));
        let err = connector.cancel_order(&order.order_id).unwrap_err();
        assert!(matches!(err, UserConnectorError::CancelRace { .. }));
        assert!(connector.positions().orders.contains_key(&order.order_id));
    }

    #[test]
    fn cancel_success_removes_order() {
        let mut connector = make_connector(fresh_positions(0, 100));
        let order = connector.post_order(10, 3, Direction::Buy).unwrap();
        connector.cancel_order(&order.order_id).unwrap();
        assert!(!connector.positions().orders.contains_key(&order.order_id));
    }

    #[test]
    fn own_trade_reduces_order_and_updates_positions() {
        let mut connector = make_connector(fresh_positions(0, 100));
        let order = connector.post_order(10, 3, Direction::Buy).unwrap();
        connector.stream.frames.push_back(UserFrame::OrderTrades {
            order_id: order.order_id.clone(),
            direction: Direction::Buy,
            instrument_id: "TEST-INSTR".to_string(),
            account_id: "acc-1".to_string(),
            trades: vec![TradePrint { price: DecimalPrice { units: 10, nano: 0 }, raw_qty: 2, timestamp_ns: 0, trade_id: "t1".to_string() }],
        });
        let events = connector.pump();

        assert_eq!(connector.positions().qty, 2);
        assert_eq!(connector.positions().money, 80);
        assert_eq!(connector.positions().orders.get(&order.order_id).unwrap().remaining_qty, 1);
        assert_eq!(
            events,
            vec![OwnTradeEvent { order_id: order.order_id.clone(), direction: Direction::Buy, px: 10, executed_qty: 2 }]
        );
    }

    #[test]
    fn own_trade_for_unknown_order_is_logged_and_applied() {
        let mut connector = make_connector(fresh_positions(0, 100));
        connector.stream.frames.push_back(UserFrame::OrderTrades {
            order_id: "ghost".to_string(),
            direction: Direction::Sell,
            instrument_id: "TEST-INSTR".to_string(),
            account_id: "acc-1".to_string(),
            trades: vec![TradePrint { price: DecimalPrice { units: 10, nano: 0 }, raw_qty: 1, timestamp_ns: 0, trade_id: "t1".to_string() }],
        });
        let events = connector.pump();

        assert_eq!(connector.positions().qty, -1);
        assert_eq!(
            events,
            vec![OwnTradeEvent { order_id: "ghost".to_string(), direction: Direction::Sell, px: 10, executed_qty: 1 }]
        );
    }

    #[test]
    fn multiple_fills_in_one_frame_sum_executed_qty() {
        let mut connector = make_connector(fresh_positions(0, 100));
        let order = connector.post_order(10, 5, Direction::Buy).unwrap();
        connector.stream.frames.push_back(UserFrame::OrderTrades {
            order_id: order.order_id.clone(),
            direction: Direction::Buy,
            instrument_id: "TEST-INSTR".to_string(),
            account_id: "acc-1".to_string(),
            trades: vec![
                TradePrint { price: DecimalPrice { units: 10, nano: 0 }, raw_qty: 2, timestamp_ns: 0, trade_id: "t1".to_string() },
                TradePrint { price: DecimalPrice { units: 10, nano: 0 }, raw_qty: 3, timestamp_ns: 1, trade_id: "t2".to_string() },
            ],
        });
        let events = connector.pump();
        assert_eq!(events[0].executed_qty, 5);
        assert!(!connector.positions().orders.contains_key(&order.order_id));
    }
}
