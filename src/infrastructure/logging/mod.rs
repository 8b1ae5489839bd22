use std::io;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::domain::error::{DeviceError, DeviceResult};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the given level applies to this crate
/// and `warn` to everything else. Output goes to stderr so command output on
/// stdout stays clean.
pub fn init_logging(level: &str) -> DeviceResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("boardlink={},warn", level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .try_init()
        .map_err(|e| DeviceError::Config {
            message: format!("failed to initialize logging: {}", e),
        })?;
    Ok(())
}

/// Pick the effective log level from CLI flags and configuration.
pub fn resolve_level(verbose: bool, quiet: bool, configured: &str) -> String {
    if verbose {
        "debug".to_string()
    } else if quiet {
        "error".to_string()
    } else {
        configured.to_string()
    }
}
