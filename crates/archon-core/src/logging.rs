//! `tracing` subscriber setup.
//!
//! Library crates only emit events; binaries call [`init_subscriber`] (or
//! [`init_json_subscriber`]) once at startup. `RUST_LOG` takes precedence over
//! the level passed in.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_LEVEL: &str = "warn";

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global subscriber with compact, human-readable stderr output.
///
/// Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already installed
    let _ = subscriber.try_init();
}

/// Initialize the global subscriber with one JSON object per event on stderr.
///
/// Subsequent calls are no-ops.
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_does_not_panic() {
        init_subscriber("debug");
        init_subscriber("warn");
    }

    #[test]
    fn init_json_after_compact_is_noop() {
        init_subscriber(DEFAULT_LEVEL);
        init_json_subscriber("info");
    }

    #[test]
    fn garbage_level_falls_back_without_panicking() {
        let _ = filter_for("not-a-level=???");
    }
}
