use crate::error::{CoinError, ErrorCode};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("Process exited with code {0}")]
    ExitCode(i32),

    #[error("Process terminated by signal {0}")]
    Signal(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid command line: {0}")]
    InvalidArguments(String),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    /// Convert into a per-series conversion error
    pub fn into_conversion_error(self, series: &Path) -> CoinError {
        let (code, exit_code) = match &self {
            ProcessError::CommandNotFound(_) => (ErrorCode::EXEC_COMMAND_NOT_FOUND, None),
            ProcessError::Timeout(_) => (ErrorCode::EXEC_TIMEOUT, None),
            ProcessError::ExitCode(code) => (ErrorCode::EXEC_SUBPROCESS_FAILED, Some(*code)),
            ProcessError::Signal(sig) => (ErrorCode::EXEC_SIGNAL_RECEIVED, Some(*sig)),
            ProcessError::Io(_) => (ErrorCode::EXEC_SPAWN_FAILED, None),
            ProcessError::InvalidArguments(_) => (ErrorCode::CONFIG_VALIDATION_FAILED, None),
            ProcessError::MockExpectationNotMet(_) => (ErrorCode::EXEC_GENERIC, None),
        };

        CoinError::conversion(code, self.to_string(), series, exit_code).with_source(self)
    }
}
