//! Logging setup for reelcast
//!
//! Diagnostics go to stderr so `--json` output on stdout stays machine
//! readable. The level can be controlled via the `RUST_LOG` environment
//! variable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset, by verbosity
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "reelcast=warn,warn",
        1 => "reelcast=info,warn",
        2 => "reelcast=debug,warn",
        _ => "reelcast=trace,info",
    }
}

/// Initialize the logging system.
///
/// Default log levels:
/// - no flag: warnings only, so regular command output is not interleaved
/// - `-v`: `reelcast` INFO
/// - `-vv`: `reelcast` DEBUG
/// - Other crates: WARN
pub fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .with_thread_ids(false)
        .with_thread_names(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(verbosity, "Logging initialized");
    Ok(())
}

/// Log the outcome of a catalog or cast operation
#[macro_export]
macro_rules! log_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "operation succeeded"),
            Err(e) => tracing::warn!(operation = $operation, error = %e, "operation failed"),
        }
    };
}
