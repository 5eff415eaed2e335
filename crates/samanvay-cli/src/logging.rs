use std::io;

use samanvay_config::{LogFormat, LoggingConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber on stderr. `RUST_LOG` overrides the
/// configured level. Later calls keep the first subscriber.
pub fn init_logging(logging: Option<&LoggingConfig>) {
    let defaults = LoggingConfig::default();
    let logging = logging.unwrap_or(&defaults);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    let installed = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    if installed.is_err() {
        debug!("tracing subscriber already installed");
    }
}
