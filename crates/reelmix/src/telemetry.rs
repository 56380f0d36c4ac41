//! Process-wide tracing setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Returns false if a subscriber was already installed, in which case
/// nothing changes.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let (human, json) = if config.json {
        (None, Some(fmt::layer().json().with_target(true)))
    } else {
        (Some(fmt::layer().with_target(true).with_thread_ids(false)), None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(human)
        .with(json);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge already installed: {}", e);
    }
    true
}
