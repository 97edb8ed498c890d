//! Shared CLI parsing, logging init, and performance setup for every
//! `gridmaker-*` binary.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// CLI arguments common to both binaries: everything venue/instrument
/// specific lives in the YAML config file they both load.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// CPU core to pin the main loop to.
    #[arg(short = 'c', long)]
    pub cpu_core: Option<usize>,

    /// Log level (overridden by `RUST_LOG` if set).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long)]
    pub json_logs: bool,
}

/// Initialize the global tracing subscriber per `args`.
pub fn init_logging(args: &CommonArgs) {
    gridmaker_core::logging::init_logging(&args.log_level, args.json_logs);
}

/// Pin the current (main) thread to `cpu_core`, if given.
pub fn setup_performance(cpu_core: Option<usize>) -> Result<()> {
    if let Some(core) = cpu_core {
        let core_id = core_affinity::CoreId { id: core };
        if core_affinity::set_for_current(core_id) {
            tracing::info!(core, "pinned main loop to CPU core");
        } else {
            anyhow::bail!("failed to pin main loop to CPU core {core}");
        }
    }
    Ok(())
}

/// Log a final summary of book/position state at shutdown.
pub fn print_summary(book: &gridmaker_core::OrderBook, positions: &gridmaker_core::Positions) {
    tracing::info!(
        bid = ?book.bid.best_px(),
        ask = ?book.ask.best_px(),
        qty = positions.qty,
        money = positions.money,
        live_orders = positions.orders.len(),
        "=== final state ==="
    );
}
