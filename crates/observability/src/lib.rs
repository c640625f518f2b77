//! Tracing and logging setup shared by every binary embedding the
//! inventory core.
//!
//! The core crates only emit `tracing` events; installing a subscriber is
//! left to the process entry point. Call [`init`] once at the top of `main`
//! (the infra benchmarks do so through [`init_with_default`]).

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Like [`init`], with `default_directive` applied when `RUST_LOG` is unset.
pub fn init_with_default(default_directive: &str) {
    tracing::init_with_default(default_directive);
}

/// Human-readable logs for local runs and tests.
pub fn init_pretty() {
    tracing::init_pretty();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
