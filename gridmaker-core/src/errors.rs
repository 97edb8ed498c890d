//! Error taxonomy.
//!
//! Fatal contract breaches (depth mismatch, instrument mismatch, negative
//! inventory overdraw, non-lattice prices, blocked balances at startup) are
//! not represented as error variants here: they are hard assertions raised
//! at the point of detection, matching the "never retried, process exits
//! with a diagnostic" treatment in the error handling design. The variants
//! below are the recoverable half of the taxonomy: conditions a caller logs
//! and continues past.

use thiserror::Error;

/// Price/quantity conversion failures at the instrument boundary (C1).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstrumentError {
    #[error("quotation does not lie on the price lattice: residual {residual_nano} nano exceeds tolerance {tolerance_nano} nano")]
    Precision {
        residual_nano: i64,
        tolerance_nano: i64,
    },
    #[error("raw quantity {raw_qty} is not a multiple of lot size {lot_size}")]
    Lot { raw_qty: i64, lot_size: i64 },
}

/// Failures surfaced by the market connector (C2) that are not fatal
/// contract breaches.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketConnectorError {
    #[error("market closed: empty order book at subscription time")]
    MarketClosed,
}

/// Failures surfaced by the user connector (C3) while issuing RPCs.
#[derive(Debug, Error)]
pub enum UserConnectorError {
    #[error("cancel for order {order_id} raced with execution; order may have filled")]
    CancelRace { order_id: String },

    #[error("post_order for {px} x {qty} was rejected: {reason}")]
    PostRejected { px: i64, qty: i64, reason: String },

    #[error("venue RPC failed: {0}")]
    Rpc(#[from] RpcError),
}

/// A failure reported by (or in communicating with) the venue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("insufficient assets for margin (code 30042)")]
    InsufficientAssets,
    #[error("cancel order error (code 30059)")]
    CancelOrderError,
    #[error("instrument not available (code 30079)")]
    InstrumentNotAvailable,
    #[error("unknown venue error code {code}: {message}")]
    Unknown { code: i64, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl RpcError {
    /// Map a raw venue error code to a known variant, falling back to
    /// `Unknown` with the message preserved for the log line.
    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        match code {
            30042 => Self::InsufficientAssets,
            30059 => Self::CancelOrderError,
            30079 => Self::InstrumentNotAvailable,
            _ => Self::Unknown {
                code,
                message: message.into(),
            },
        }
    }
}

/// Crate-wide error composing every component's recoverable error.
#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
    #[error(transparent)]
    MarketConnector(#[from] MarketConnectorError),
    #[error(transparent)]
    UserConnector(#[from] UserConnectorError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("configuration error: {0}")]
    Config(String),
}
