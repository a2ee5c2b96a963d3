//! Diagnostic logging setup.
//!
//! Logs go to stderr through `tracing-subscriber`. `RUST_LOG` wins over the
//! level implied by `-v`/`-q`; JSON summaries get JSON log lines.

use crate::config::{CliConfig, Verbosity};
use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter from `RUST_LOG`, falling back to the verbosity level
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()))
}

/// Install the global subscriber
pub fn init_logging(config: &CliConfig) -> CliResult<()> {
    let filter = env_filter(config.verbosity);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        OutputFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        OutputFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(config.verbosity.is_debug())
                    .with_ansi(config.color.should_color()),
            )
            .try_init(),
    };
    installed.map_err(|e| CliError::runtime(format!("Failed to install logger: {e}")))
}
