//! Logging setup.
//!
//! Widgets, views and navigation emit `tracing` events with a `widget` field
//! carrying the widget path; navigation events carry `destination`, `entity` and
//! a `trace_id`. Installing a subscriber is left to the caller; these helpers are
//! the usual one-liners.

use tracing_subscriber::EnvFilter;

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install a human-readable subscriber; `RUST_LOG` wins over `fallback`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(fallback: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Install a JSON subscriber for machine-readable logs.
pub fn init_json_tracing(fallback: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(fallback))
        .with_current_span(true)
        .try_init()
        .is_ok()
}
