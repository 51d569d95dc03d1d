//! Application configuration

use crate::bidsmap::loader::CONVERTER_ENV;

/// Settings that come from the command line and the environment rather
/// than from the bidsmap
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Converter executable from `BIDSCOINER_DCM2NIIX`, if set
    pub converter_override: Option<String>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            converter_override: std::env::var(CONVERTER_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty()),
        }
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
