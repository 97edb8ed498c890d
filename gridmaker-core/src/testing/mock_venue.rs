//! Programmable mock implementations of the four venue traits, for
//! integration tests and the `*-simulated` binary.
//!
//! Split into a market-side and a user-side mock because that is how the
//! real venue connects: the market connector and the user connector each
//! own an independent stream handle (`MarketConnector<S>`, `UserConnector<U>`)
//! and never share one. Canned-frame-queue shape follows `MockHuginnFeed`;
//! post/cancel reply queuing with an auto-generated default follows
//! `SimulatedExecutor`'s "immediately acknowledge unless the test wired a
//! specific response" pattern.

use crate::book::Direction;
use crate::errors::RpcError;
use crate::venue::{
    CancelReply, DecimalPrice, MarketDataStream, MarketFrame, MoneyBalance, OperationsService,
    OrderStatus, OrderType, OrdersService, PositionsSnapshot, PostOrderReply, PostOrderRequest,
    SecurityBalance, SnapshotLevel, UserDataStream, UserFrame,
};
use std::collections::VecDeque;

/// Build a `SnapshotLevel` from an already-converted tick price and lot
/// quantity, assuming `px_step = 1` / `lot_size = 1` (the convention every
/// test and benchmark in this crate uses unless it says otherwise).
pub fn level(px: i64, qty: i64) -> SnapshotLevel {
    SnapshotLevel { price: DecimalPrice { units: px, nano: 0 }, raw_qty: qty }
}

/// A `MarketFrame::Snapshot` from `(px, qty)` pairs, best-first.
pub fn snapshot_frame(bid: &[(i64, i64)], ask: &[(i64, i64)], timestamp_ns: i64) -> MarketFrame {
    MarketFrame::Snapshot {
        bid: bid.iter().map(|&(px, qty)| level(px, qty)).collect(),
        ask: ask.iter().map(|&(px, qty)| level(px, qty)).collect(),
        timestamp_ns,
    }
}

/// A `MarketFrame::Trade` at `px_step = 1` / `lot_size = 1`.
pub fn trade_frame(timestamp_ns: i64, direction: Direction, px: i64, qty: i64) -> MarketFrame {
    MarketFrame::Trade {
        timestamp_ns,
        direction,
        price: DecimalPrice { units: px, nano: 0 },
        raw_qty: qty,
    }
}

/// Programmable market-data stream: a queue of canned frames drained
/// in order by [`MarketDataStream::poll_frame`]. Subscriptions always
/// succeed; the first frame consumers usually queue is a
/// `SubscribeAck`, but nothing here enforces that: callers control the
/// exact frame sequence so they can exercise connector edge cases.
#[derive(Debug, Default)]
pub struct MockMarketStream {
    frames: VecDeque<MarketFrame>,
    subscribed_order_book: bool,
    subscribed_trades: bool,
}

impl MockMarketStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, frame: MarketFrame) -> &mut Self {
        self.frames.push_back(frame);
        self
    }

    pub fn push_frames(&mut self, frames: impl IntoIterator<Item = MarketFrame>) -> &mut Self {
        self.frames.extend(frames);
        self
    }

    pub fn pending_count(&self) -> usize {
        self.frames.len()
    }
}

impl MarketDataStream for MockMarketStream {
    fn subscribe_order_book(&mut self, _instrument_id: &str, _depth: usize) -> Result<(), RpcError> {
        self.subscribed_order_book = true;
        Ok(())
    }

    fn subscribe_trades(&mut self, _instrument_id: &str) -> Result<(), RpcError> {
        self.subscribed_trades = true;
        Ok(())
    }

    fn poll_frame(&mut self) -> Option<MarketFrame> {
        self.frames.pop_front()
    }
}

/// Programmable own-trades stream plus order-entry and account-state
/// RPCs. `post_order`/`cancel_order` return a queued canned reply if one
/// is waiting, otherwise synthesize a successful acknowledgement (tests
/// that don't care about the reply shape don't have to build one).
#[derive(Debug)]
pub struct MockUserStream {
    positions: PositionsSnapshot,
    frames: VecDeque<UserFrame>,
    post_replies: VecDeque<Result<PostOrderReply, RpcError>>,
    cancel_replies: VecDeque<Result<CancelReply, RpcError>>,
    next_order_id: u64,
}

impl MockUserStream {
    pub fn new(positions: PositionsSnapshot) -> Self {
        Self {
            positions,
            frames: VecDeque::new(),
            post_replies: VecDeque::new(),
            cancel_replies: VecDeque::new(),
            next_order_id: 1,
        }
    }

    /// A mock user stream seeded with `qty` lots of inventory and `money`
    /// units of cash, and nothing blocked.
    pub fn with_seed(instrument_id: &str, qty: i64, money_units: i64) -> Self {
        Self::new(PositionsSnapshot {
            money: vec![MoneyBalance { units: money_units, nano: 0 }],
            blocked_money: vec![],
            securities: if qty != 0 {
                vec![SecurityBalance { instrument_id: instrument_id.to_string(), balance: qty, blocked: 0 }]
            } else {
                vec![]
            },
        })
    }

    pub fn push_user_frame(&mut self, frame: UserFrame) -> &mut Self {
        self.frames.push_back(frame);
        self
    }

    /// Queue an `order_trades` frame for `order_id` at `px` for `qty`
    /// lots, single trade print, assuming `px_step = 1` / `lot_size = 1`.
    pub fn queue_fill(
        &mut self,
        order_id: impl Into<String>,
        direction: Direction,
        instrument_id: impl Into<String>,
        account_id: impl Into<String>,
        px: i64,
        qty: i64,
        timestamp_ns: i64,
    ) -> &mut Self {
        let order_id = order_id.into();
        self.push_user_frame(UserFrame::OrderTrades {
            order_id,
            direction,
            instrument_id: instrument_id.into(),
            account_id: account_id.into(),
            trades: vec![crate::venue::TradePrint {
                price: DecimalPrice { units: px, nano: 0 },
                raw_qty: qty,
                timestamp_ns,
                trade_id: format!("t{}", self.next_order_id),
            }],
        })
    }

    pub fn push_post_reply(&mut self, reply: Result<PostOrderReply, RpcError>) -> &mut Self {
        self.post_replies.push_back(reply);
        self
    }

    pub fn push_cancel_reply(&mut self, reply: Result<CancelReply, RpcError>) -> &mut Self {
        self.cancel_replies.push_back(reply);
        self
    }
}

impl UserDataStream for MockUserStream {
    fn subscribe_own_trades(&mut self, _account_id: &str) -> Result<(), RpcError> {
        Ok(())
    }

    fn poll_frame(&mut self) -> Option<UserFrame> {
        self.frames.pop_front()
    }
}

impl OrdersService for MockUserStream {
    fn post_order(&mut self, request: PostOrderRequest) -> Result<PostOrderReply, RpcError> {
        if let Some(reply) = self.post_replies.pop_front() {
            return reply;
        }
        let order_id = format!("mock-order-{}", self.next_order_id);
        self.next_order_id += 1;
        Ok(PostOrderReply {
            order_id,
            status: OrderStatus::New,
            direction: request.direction,
            price: request.price,
            order_type: OrderType::Limit,
            instrument_id: request.instrument_id,
            lots_requested: request.lots,
        })
    }

    fn cancel_order(&mut self, _account_id: &str, _order_id: &str) -> Result<CancelReply, RpcError> {
        self.cancel_replies.pop_front().unwrap_or(Ok(CancelReply { timestamp_ns: 0 }))
    }
}

impl OperationsService for MockUserStream {
    fn get_positions(&mut self, _account_id: &str) -> Result<PositionsSnapshot, RpcError> {
        Ok(self.positions.clone())
    }
}
