//! The abstract venue protocol. Four narrow traits stand in for the venue
//! gRPC client, treated as an external collaborator: a real implementation
//! speaks whatever wire protocol the venue exposes and converts frames
//! to/from these shapes at its own boundary; `testing::MockVenue` is the
//! in-process stand-in used by every test in this crate and by the
//! `*-simulated` binary.

use crate::book::Direction;
use crate::errors::RpcError;

/// A venue decimal quotation: `units + nano * 1e-9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalPrice {
    pub units: i64,
    pub nano: i32,
}

/// One level of a snapshot side, still in venue units (not yet converted
/// to tick space: that happens in the market connector).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLevel {
    pub price: DecimalPrice,
    pub raw_qty: i64,
}

/// Frames delivered on the market-data stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketFrame {
    SubscribeAck { order_book_ok: bool, trades_ok: bool },
    Snapshot {
        bid: Vec<SnapshotLevel>,
        ask: Vec<SnapshotLevel>,
        timestamp_ns: i64,
    },
    Trade {
        timestamp_ns: i64,
        direction: Direction,
        price: DecimalPrice,
        raw_qty: i64,
    },
    Ping,
}

/// A single trade print within an `order_trades` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradePrint {
    pub price: DecimalPrice,
    pub raw_qty: i64,
    pub timestamp_ns: i64,
    pub trade_id: String,
}

/// Frames delivered on the own-trades stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFrame {
    OrderTrades {
        order_id: String,
        direction: Direction,
        instrument_id: String,
        account_id: String,
        trades: Vec<TradePrint>,
    },
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOrderRequest {
    pub instrument_id: String,
    pub lots: i64,
    pub price: DecimalPrice,
    pub direction: Direction,
    pub account_id: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOrderReply {
    pub order_id: String,
    pub status: OrderStatus,
    pub direction: Direction,
    pub price: DecimalPrice,
    pub order_type: OrderType,
    pub instrument_id: String,
    pub lots_requested: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelReply {
    pub timestamp_ns: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyBalance {
    pub units: i64,
    pub nano: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityBalance {
    pub instrument_id: String,
    pub balance: i64,
    pub blocked: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionsSnapshot {
    pub money: Vec<MoneyBalance>,
    pub blocked_money: Vec<MoneyBalance>,
    pub securities: Vec<SecurityBalance>,
}

/// Market-data stream subscription + polling.
pub trait MarketDataStream {
    fn subscribe_order_book(&mut self, instrument_id: &str, depth: usize) -> Result<(), RpcError>;
    fn subscribe_trades(&mut self, instrument_id: &str) -> Result<(), RpcError>;
    /// Non-blocking poll; `None` means no frame is currently available.
    fn poll_frame(&mut self) -> Option<MarketFrame>;
}

/// Own-trades stream subscription + polling.
pub trait UserDataStream {
    fn subscribe_own_trades(&mut self, account_id: &str) -> Result<(), RpcError>;
    fn poll_frame(&mut self) -> Option<UserFrame>;
}

/// Synchronous order entry RPCs.
pub trait OrdersService {
    fn post_order(&mut self, request: PostOrderRequest) -> Result<PostOrderReply, RpcError>;
    fn cancel_order(&mut self, account_id: &str, order_id: &str) -> Result<CancelReply, RpcError>;
}

/// Synchronous account-state RPCs.
pub trait OperationsService {
    fn get_positions(&mut self, account_id: &str) -> Result<PositionsSnapshot, RpcError>;
}
