// Logging setup for the operator CLI
//
// Logs go to stderr so that stdout carries only the rendered JSON or YAML.

use hyperpod_config::{LogFormat, LoggingConfig};

/// Initialize tracing from the logging configuration
pub(crate) fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match logging.format {
        LogFormat::Json => {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            registry.with(fmt::layer().with_writer(std::io::stderr)).init();
        }
    }
}
