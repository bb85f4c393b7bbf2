//! Logging configuration.
//!
//! Progress and diagnostics go to stderr so piped stdout stays clean. On
//! Linux a journald layer is attached as well when the journal is
//! reachable, which covers scheduled runs.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system.
///
/// Log level is controlled via the `PHOTOLOG_LOG` environment variable:
/// - `PHOTOLOG_LOG=debug` for verbose output
/// - `PHOTOLOG_LOG=info` for standard output (default)
/// - `PHOTOLOG_LOG=warn` for warnings and errors only
pub fn init() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("PHOTOLOG_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(journald_layer)
                .init();
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();

    Ok(())
}
