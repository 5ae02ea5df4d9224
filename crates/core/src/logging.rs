//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,instancing=debug";

/// Installs the global tracing subscriber.
///
/// Filtering comes from `RUST_LOG` when present, otherwise [`DEFAULT_FILTER`].
/// Events are printed with their target and the emitting thread id.
///
/// # Example
/// ```
/// instancing_core::init_logging();
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
