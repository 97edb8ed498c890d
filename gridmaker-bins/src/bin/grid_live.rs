//! Grid strategy against a real venue.
//!
//! The venue gRPC client is an external collaborator this crate does not
//! implement: a real deployment adapts it to the four traits in
//! [`gridmaker_core::venue`] and passes the result to
//! [`gridmaker_core::MarketConnector`]/[`gridmaker_core::UserConnector`]
//! exactly as `grid_simulated` passes its mock streams. This binary does
//! the CLI/config/logging wiring a live run needs and stops there.

use anyhow::{Context, Result};
use clap::Parser;
use gridmaker_bins::common::{init_logging, setup_performance, CommonArgs};
use gridmaker_core::Config;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> Result<()> {
    let args = CommonArgs::parse();
    init_logging(&args);
    setup_performance(args.cpu_core)?;

    let config = Config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    tracing::warn!("=== gridmaker-live: LIVE TRADING MODE - REAL FUNDS AT RISK ===");
    tracing::info!(instrument = %config.runner.figi, account = %config.user.account_id, "configuration loaded");
    tracing::error!(
        "no venue gRPC client is wired into this crate; implement \
         MarketDataStream/UserDataStream/OrdersService/OperationsService against the real \
         venue and wire them the way gridmaker-simulated wires its mock streams"
    );
    tracing::info!("use gridmaker-simulated to exercise the grid strategy against an in-process venue");

    Ok(())
}

// A real deployment's `main` would look like:
//
// let market_stream = RealMarketDataStream::connect(&config.runner.token)?;
// let user_stream = RealUserStream::connect(&config.runner.token)?;
// let instrument = Instrument::new(config.runner.figi.clone(), config.runner.lot_size, config.runner.px_step);
// let market = MarketConnector::new(market_stream, instrument.clone(), config.market.depth);
// let user = UserConnector::new(user_stream, instrument, config.user.account_id.clone());
// let mut engine = Engine::new(market, user);
// let mut strategy = GridStrategy::new(GridConfig::new(
//     config.strategy.max_levels, config.strategy.order_size, config.strategy.spread, config.strategy.debug,
// ));
// engine.start(&mut strategy)?;
// engine.run_while(&mut strategy, Duration::from_millis(10), || running.load(Ordering::SeqCst))?;
