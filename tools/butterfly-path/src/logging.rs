//! Structured logging
//!
//! The filter comes from `BUTTERFLY_LOG` (e.g. `debug`,
//! `butterfly_path::search=trace`), falling back to the configured level.
//! Output goes to stderr so stdout stays free for command results.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

pub const LOG_ENV: &str = "BUTTERFLY_LOG";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the global subscriber; later calls are ignored
pub fn init(config: &LoggingConfig) {
    if config.json {
        init_json(&config.level);
    } else {
        init_with_default(&config.level);
    }
}

pub fn init_with_default(default_level: &str) {
    let subscriber = fmt()
        .with_env_filter(filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();
    let _ = subscriber.try_init();
}

/// One JSON object per event, for log shippers
pub fn init_json(default_level: &str) {
    let subscriber = fmt()
        .with_env_filter(filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .json();
    let _ = subscriber.try_init();
}
