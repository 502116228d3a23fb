//! Process-wide tracing setup: an `EnvFilter` driven by `RUST_LOG`
//! (falling back to the configured default level) and a choice between
//! human-readable and JSON output for ingestion by a log pipeline.

use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

pub fn init(default_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => {
            let _ = subscriber.json().try_init();
        }
        LogFormat::Pretty => {
            let _ = subscriber.try_init();
        }
    }
}
