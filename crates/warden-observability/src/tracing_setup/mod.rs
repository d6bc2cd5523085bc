//! Tracing setup: structured logging with event helpers.

pub mod events;

use tracing_subscriber::EnvFilter;
use warden_core::config::ObservabilityConfig;
use warden_core::constants::LOG_ENV_VAR;

/// Initialize the tracing subscriber.
///
/// Respects the `WARDEN_LOG` environment variable for filtering and falls
/// back to the configured level. Safe to call more than once; later calls
/// are no-ops.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let result = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Initialize tracing with a custom filter string (for testing or embedding).
pub fn init_tracing_with_filter(filter: &str) {
    let filter = EnvFilter::new(filter);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .try_init();
}
