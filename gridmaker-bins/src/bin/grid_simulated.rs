//! Drives the grid strategy against an in-process simulated venue
//! instead of a real gRPC client (the real client is an external
//! collaborator, out of this crate's scope).
//!
//! The simulated venue is a random walk around a starting mid price: each
//! tick nudges the mid by at most one tick, republishes a snapshot, and
//! occasionally prints a public trade. Any resting order of ours the walk
//! crosses is filled in full, feeding back through the same own-trades
//! stream a real venue would use.

use anyhow::{Context, Result};
use clap::Parser;
use gridmaker_bins::common::{init_logging, print_summary, setup_performance, CommonArgs};
use gridmaker_core::testing::mock_venue::{snapshot_frame, trade_frame, MockMarketStream, MockUserStream};
use gridmaker_core::venue::MarketFrame;
use gridmaker_core::{Config, Direction, Engine, Instrument, LimitOrder, MarketConnector, UserConnector};
use gridmaker_strategies::{GridConfig, GridStrategy};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const MAX_TICKS: u64 = 20_000;
const STARTING_PX: i64 = 10_000;
const STARTING_MONEY: i64 = 10_000_000;

fn main() -> Result<()> {
    let args = CommonArgs::parse();
    init_logging(&args);
    setup_performance(args.cpu_core)?;

    let config = Config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutdown requested");
            running.store(false, Ordering::SeqCst);
        })
        .context("installing ctrlc handler")?;
    }

    let instrument = Instrument::new(config.runner.figi.clone(), config.runner.lot_size, config.runner.px_step);
    let synthetic_spread = config.strategy.spread.max(2);

    let mut market_stream = MockMarketStream::new();
    market_stream.push_frame(MarketFrame::SubscribeAck { order_book_ok: true, trades_ok: true });
    market_stream.push_frame(snapshot_frame(
        &[(STARTING_PX, config.strategy.order_size)],
        &[(STARTING_PX + synthetic_spread, config.strategy.order_size)],
        0,
    ));
    let market_connector = MarketConnector::new(market_stream, instrument.clone(), config.market.depth);

    let user_stream = MockUserStream::with_seed(&config.runner.figi, 0, STARTING_MONEY);
    let user_connector = UserConnector::new(user_stream, instrument, config.user.account_id.clone());

    let mut engine = Engine::new(market_connector, user_connector);
    let mut strategy = GridStrategy::new(GridConfig::new(
        config.strategy.max_levels,
        config.strategy.order_size,
        config.strategy.spread,
        config.strategy.debug,
    ));

    engine.start(&mut strategy)?;
    engine.step(&mut strategy)?;

    tracing::info!("=== gridmaker simulated: starting tick loop ===");
    let mut rng = rand::thread_rng();
    let mut mid = STARTING_PX;
    let mut tick: u64 = 0;
    while running.load(Ordering::SeqCst) && tick < MAX_TICKS {
        tick += 1;
        mid += rng.gen_range(-1_i64..=1);

        let bid_px = mid;
        let ask_px = mid + synthetic_spread;

        fill_crossed_orders(&mut engine, bid_px, ask_px, &config.user.account_id, &config.runner.figi, tick as i64);

        engine
            .market_mut()
            .stream_mut()
            .push_frame(snapshot_frame(&[(bid_px, config.strategy.order_size)], &[(ask_px, config.strategy.order_size)], tick as i64));
        if rng.gen_bool(0.1) {
            let direction = if rng.gen_bool(0.5) { Direction::Buy } else { Direction::Sell };
            engine.market_mut().stream_mut().push_frame(trade_frame(tick as i64, direction, mid, 1));
        }

        engine.step(&mut strategy)?;
    }

    tracing::info!(ticks = tick, "=== gridmaker simulated: stopped ===");
    print_summary(engine.book(), engine.positions());
    Ok(())
}

/// Simulate the venue filling any of our resting orders the synthetic
/// walk has just crossed: a resting bid fills once the synthetic ask
/// drops to or below it, a resting ask once the synthetic bid rises to
/// or above it.
fn fill_crossed_orders(
    engine: &mut Engine<MockMarketStream, MockUserStream>,
    bid_px: i64,
    ask_px: i64,
    account_id: &str,
    instrument_id: &str,
    timestamp_ns: i64,
) {
    let crossed: Vec<LimitOrder> = engine
        .positions()
        .orders
        .values()
        .filter(|order| match order.direction {
            Direction::Buy => ask_px <= order.px,
            Direction::Sell => bid_px >= order.px,
        })
        .cloned()
        .collect();

    for order in crossed {
        engine.user_mut().stream_mut().queue_fill(
            order.order_id,
            order.direction,
            instrument_id,
            account_id,
            order.px,
            order.remaining_qty,
            timestamp_ns,
        );
    }
}
