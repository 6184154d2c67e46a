//! Logging initialization.
//!
//! Verbosity maps to a default filter which `RUST_LOG` always overrides.
//! Output goes to stderr so embedders keep stdout for their own surface.

use tracing_subscriber::EnvFilter;

/// Initialize global logging for an application embedding the engine.
///
/// `verbose` raises the default level (0=warn, 1=info, 2=debug, 3+=trace);
/// `quiet` silences everything except errors.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("issuesync={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;
    Ok(())
}

/// Initialize logging for tests: best effort, never panics when a
/// subscriber is already installed.
pub fn init_test_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("issuesync=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
