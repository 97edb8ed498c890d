//! The two venue connectors. Each owns one half of the venue protocol;
//! neither connector knows about the other, about the strategy, or about
//! the dispatch core: they report readiness/update events from `pump`,
//! and [`crate::engine::Engine`] drives `Dispatch` from those events once
//! each `pump` call returns.

pub mod market;
pub mod user;

pub use market::{MarketConnector, MarketEvent};
pub use user::{OwnTradeEvent, UserConnector};
