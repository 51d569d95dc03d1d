//! Logging configuration and initialization

use crate::app::config::AppConfig;
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

/// Initialize tracing for the application
///
/// `RUST_LOG` wins over the `-v` count when it is set.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.verbose >= 2) // Show target module for -vv and above
        .with_line_number(config.verbose >= 3)
        .with_writer(std::io::stderr)
        .init();

    debug!("bidscoiner started with verbosity level: {}", config.verbose);
    if let Some(converter) = &config.converter_override {
        debug!("Converter overridden from environment: {}", converter);
    }
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}
