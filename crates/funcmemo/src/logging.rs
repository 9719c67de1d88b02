use std::env;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::fmt;
use tracing_subscriber::fmt::time::UtcTime;

use crate::config::{LogFormat, MemoConfig};

fn get_rust_log(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "",
        LevelFilter::ERROR => "ERROR",
        LevelFilter::WARN => "WARN",
        LevelFilter::INFO => "INFO",
        LevelFilter::DEBUG => "INFO,funcmemo=DEBUG",
        LevelFilter::TRACE => "INFO,funcmemo=TRACE",
    }
}

/// Installs a global `tracing` subscriber according to the logging config.
///
/// The `RUST_LOG` environment variable takes precedence over the configured level. Returns `false`
/// if a global subscriber was already installed, in which case the existing one stays in place.
pub fn init_logging(config: &MemoConfig) -> bool {
    let rust_log =
        env::var("RUST_LOG").unwrap_or_else(|_| get_rust_log(config.logging.level).to_string());

    let builder = fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true)
        .with_env_filter(EnvFilter::new(&rust_log));

    let result = match (config.logging.format, console::user_attended()) {
        (LogFormat::Auto, true) | (LogFormat::Pretty, _) => builder.pretty().try_init(),
        (LogFormat::Auto, false) | (LogFormat::Simplified, _) => {
            builder.compact().with_ansi(false).try_init()
        }
        (LogFormat::Json, _) => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
    };

    result.is_ok()
}
