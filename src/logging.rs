//! Diagnostic logging on stderr via `tracing`.
//!
//! Progress lines for humans are printed by [`output`](crate::output) on
//! stdout; everything here is for diagnosing a run. `RUST_LOG` overrides the
//! level chosen from `--verbose`.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
///
/// `verbose` selects DEBUG instead of WARN. Clamp notices log at WARN, so
/// they show by default; state transitions and per-artifact failure details
/// need `--verbose`. `json_format` switches to one JSON object per line.
///
/// Calling this twice is harmless: the second install is ignored.
pub fn init(verbose: bool, json_format: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    installed.ok();
}
