//! Process-wide structured logging. The `Config`/`log_directory` boundary
//! is an external collaborator; this module is the one piece of that
//! wiring this crate owns.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber. `RUST_LOG` takes precedence
/// over the configured level when set.
pub fn init_logging(log_level: &str, json_logs: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}
