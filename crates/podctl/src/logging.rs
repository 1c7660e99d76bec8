use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cli::TracingFormat;
use crate::config::Config;

/// Configure and initialize logging for the application
pub fn setup_logging(config: &Config, format: &TracingFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,podctl={}", config.log_level)));

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_env_filter(filter);

    let result = match format {
        TracingFormat::Pretty => {
            tracing::subscriber::set_global_default(builder.finish())
        }
        TracingFormat::Json => {
            tracing::subscriber::set_global_default(builder.json().finish())
        }
    };

    result.expect("setting default subscriber failed");
}
