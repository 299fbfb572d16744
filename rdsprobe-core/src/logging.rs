//! Logging setup for the rdsprobe binary.
//!
//! Logs go to stderr; stdout is reserved for the probe report.

use crate::Result;

/// Maps the CLI verbosity flags to a log level.
///
/// `quiet` wins over any verbosity count.
pub const fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
///
/// # Errors
/// Returns a configuration error if a global subscriber is already set.
///
/// # Example
/// ```rust,no_run
/// use rdsprobe_core::logging::init_logging;
///
/// init_logging(1, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level_for(verbose, quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            crate::error::ProbeError::configuration(format!("Failed to initialize logging: {e}"))
        })?;

    Ok(())
}
