//! Tracing subscriber set-up.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::error::ClientError;

/// Install the global subscriber. Filtering follows `RUST_LOG`, defaulting to
/// `info`. Logs go to stderr so command output stays clean.
pub fn init_logging(format: LogFormat) -> Result<(), ClientError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| ClientError::Logging(e.to_string()))
}
