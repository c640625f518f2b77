//! Tracing/logging initialization.
//!
//! Filtering comes from `RUST_LOG` and falls back to `info`, e.g.
//! `RUST_LOG=stockledger_infra=debug` shows lock and movement details.

use tracing_subscriber::EnvFilter;

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize JSON logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default("info");
}

/// JSON logging with `default_directive` used when `RUST_LOG` is unset.
pub fn init_with_default(default_directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init();
}

/// Initialize compact text logging (local development).
pub fn init_pretty() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .compact()
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init();
        super::init();
        super::init_with_default("warn");
        super::init_pretty();
        ::tracing::info!(movement = "sale:test", "logging initialised");
    }
}
