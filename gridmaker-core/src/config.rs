//! Runtime configuration. Every key is required: this is a thin, literal
//! mapping of the five config sections onto structs, loaded once at
//! startup from a single YAML file.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, one section per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub runner: RunnerConfig,
    pub user: UserConfig,
    pub market: MarketConfig,
    pub strategy: StrategyConfig,
}

/// `runner` section: venue auth, instrument identity, and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Venue auth token. Never logged.
    pub token: String,
    /// Instrument identifier (figi in the reference venue).
    pub figi: String,
    /// Lots-per-unit; must be positive.
    pub lot_size: i64,
    /// Tick size; must be positive.
    pub px_step: Decimal,
    /// Destination directory for per-logger text files.
    pub log_directory: PathBuf,
}

/// `user` section: the venue account to trade under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub account_id: String,
}

/// `market` section: market-data subscription depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Subscription depth, `1..=50`.
    pub depth: usize,
}

/// `strategy` section: the grid quoting strategy's four parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Maximum simultaneous resting orders per side.
    pub max_levels: usize,
    /// Lots per ladder level.
    pub order_size: i64,
    /// Minimum target spread in ticks, `>= 2`.
    pub spread: i64,
    /// If true, plan orders but do not send them.
    pub debug: bool,
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check the loaded values: positive lot size, spread >= 2,
    /// depth in range, and so on.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.runner.lot_size <= 0 {
            anyhow::bail!("runner.lot_size must be positive, got {}", self.runner.lot_size);
        }
        if self.runner.px_step <= Decimal::ZERO {
            anyhow::bail!("runner.px_step must be positive, got {}", self.runner.px_step);
        }
        if self.runner.figi.is_empty() {
            anyhow::bail!("runner.figi must not be empty");
        }
        if self.runner.token.is_empty() {
            anyhow::bail!("runner.token must not be empty");
        }
        if self.user.account_id.is_empty() {
            anyhow::bail!("user.account_id must not be empty");
        }
        if !(1..=crate::book::MAX_DEPTH).contains(&self.market.depth) {
            anyhow::bail!(
                "market.depth {} out of range 1..={}",
                self.market.depth,
                crate::book::MAX_DEPTH
            );
        }
        if self.strategy.max_levels == 0 {
            anyhow::bail!("strategy.max_levels must be positive");
        }
        if self.strategy.order_size <= 0 {
            anyhow::bail!("strategy.order_size must be positive, got {}", self.strategy.order_size);
        }
        if self.strategy.spread < 2 {
            anyhow::bail!("strategy.spread must be >= 2, got {}", self.strategy.spread);
        }
        Ok(())
    }
}
