//! gridmaker-core: data model, venue trait boundary, dispatch core, and
//! connectors for a single-instrument grid market-making engine.
//!
//! ## Modules
//! - [`instrument`]: exact venue-decimal <-> tick-space conversion.
//! - [`book`]: order book, trade record, `Side`/`Direction` data model.
//! - [`position`]: live orders and cash/inventory accounting.
//! - [`venue`]: the abstract venue protocol four narrow traits stand in
//!   for (a real implementation adapts a concrete gRPC client to these
//!   shapes); [`testing::MockVenue`] is the in-process stand-in used here.
//! - [`dispatch`]: the event lock, readiness state machine, and strategy
//!   fan-out that serialises the three venue streams.
//! - [`connectors`]: the market connector and user connector.
//! - [`engine`]: wires the dispatch core and both connectors together and
//!   drives one poll of each per `step`.
//! - [`config`]: runtime YAML configuration.
//! - [`logging`]: process-wide structured logging setup.
//! - [`errors`]: the recoverable half of the error taxonomy; fatal
//!   contract breaches are hard assertions raised at the point of
//!   detection, not represented as variants.
//! - [`testing`]: an in-process mock venue for tests and the simulated
//!   binary.

pub mod book;
pub mod config;
pub mod connectors;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod instrument;
pub mod logging;
pub mod position;
pub mod testing;
pub mod venue;

pub use book::{Direction, Level, OneSidedBook, OrderBook, Side, Trade, MAX_DEPTH};
pub use config::Config;
pub use connectors::{MarketConnector, MarketEvent, OwnTradeEvent, UserConnector};
pub use dispatch::{Dispatch, EventLock, Readiness, StrategyCallbacks, StrategyContext};
pub use engine::Engine;
pub use errors::{GridError, InstrumentError, MarketConnectorError, RpcError, UserConnectorError};
pub use instrument::Instrument;
pub use position::{LimitOrder, Positions};
