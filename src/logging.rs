//! Optional tracing subscriber setup.
//!
//! websess only emits `tracing` events: session saves, loads and deletes
//! at debug level, reclaim sweeps that removed something at info, corrupt
//! records and failed sweeps at warn. Web frameworks usually install their
//! own subscriber, and those events flow into it unchanged. The helpers
//! below are for tests, examples and small hosts that have none.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "websess=info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a compact stderr subscriber filtered by `RUST_LOG`.
///
/// # Panics
///
/// Panics if the host already installed a global subscriber. Use
/// [`try_init`] when that is possible.
pub fn init() {
    tracing_subscriber::registry()
        .with(filter())
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

/// Like [`init`], but leaves an existing subscriber in place.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter())
        .with(tracing_subscriber::fmt::layer().compact())
        .try_init()
}
