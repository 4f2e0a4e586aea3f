//! Logging initialization.
//!
//! Log output goes to stderr; stdout is reserved for command output. The
//! `RUST_LOG` environment variable overrides the level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber at `level`, pretty-printed or as JSON.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` config section, letting
/// `--verbose` and `--json-logs` win.
pub fn init_from_config(
    config: &rawlab_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let level = if verbose_override {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let json_format = json_logs_override || config.logging.format == "json";
    init(level, json_format);
}
