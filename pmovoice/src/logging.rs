//! Tracing setup driven by the configuration
//!
//! Reads `host.logger.min_level` and `host.logger.enable_console`.

use pmoconfig::Config;
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, prelude::*, Registry};

/// Installs the global subscriber
///
/// Returns false when a subscriber was already installed (tests, embedding
/// applications), in which case the existing one is kept.
pub fn init_logging(config: &Config) -> bool {
    let log_level = match config.get_log_min_level() {
        Ok(l) => match string_to_level(&l) {
            Some(level) => LevelFilter::from_level(level),
            None => LevelFilter::TRACE,
        },
        Err(_) => LevelFilter::TRACE,
    };

    let enable_console = config.get_log_enable_console().unwrap_or(true);
    let console = enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
    });

    Registry::default()
        .with(log_level)
        .with(console)
        .try_init()
        .is_ok()
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}
