//! Application module
//!
//! Command-line level concerns: verbosity and converter settings, logging
//! setup and the exit path for fatal errors.

pub mod config;
pub mod error_handling;
pub mod logging;

pub use config::AppConfig;
pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
