//! Tracing setup for the worker process.
//!
//! Logs go to stderr; stdout is left alone so nothing the worker prints can
//! be mistaken for channel traffic.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LogLevel};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: LogLevel) -> String {
    format!(
        "relay_worker={level},relay_worker::channel::codec=off",
        level = level.as_str()
    )
}

/// Initialize tracing with RUST_LOG, RELAY_LOG and LOG_FORMAT support.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(level: LogLevel, format: LogFormat) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_filter(level))
    };

    match format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr));
            let _ = subscriber.try_init();
        }
        LogFormat::Text => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr));
            let _ = subscriber.try_init();
        }
    }
}
