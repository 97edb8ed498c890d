//! gridmaker-strategies: the grid quoting strategy (C5), the only
//! component in this workspace that implements
//! [`gridmaker_core::StrategyCallbacks`].
//!
//! ## Modules
//! - [`grid`]: target-ladder construction, price-drift translation,
//!   execution-driven rotation, and cancel/post reconciliation.

pub mod grid;

pub use grid::{GridConfig, GridStrategy, TargetLevel};
