use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for the coining engine
///
/// Every variant except `Config` and `Storage` is recoverable: the
/// orchestrator catches it at the series or session boundary, writes it to
/// the transcript and moves on.
#[derive(Error, Debug)]
pub enum CoinError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Identity error: {message}")]
    Identity {
        code: u16,
        message: String,
        session: PathBuf,
    },

    #[error("[E{code:04}] No matching series: {message}")]
    NoMatch {
        code: u16,
        message: String,
        series: PathBuf,
    },

    #[error("[E{code:04}] Conversion error: {message}")]
    Conversion {
        code: u16,
        message: String,
        series: PathBuf,
        exit_code: Option<i32>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Normalization error: {message}")]
    Normalization {
        code: u16,
        message: String,
        path: PathBuf,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Not yet supported: {message}")]
    Unsupported { code: u16, message: String },

    #[error("[E{code:04}] Storage error: {message}")]
    Storage {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl CoinError {
    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create an identity error for a session folder
    pub fn identity(code: u16, message: impl Into<String>, session: &Path) -> Self {
        Self::Identity {
            code,
            message: message.into(),
            session: session.to_path_buf(),
        }
    }

    /// Create a no-match error for a series folder
    pub fn no_match(series: &Path) -> Self {
        Self::NoMatch {
            code: ErrorCode::CLASSIFY_NO_MATCH,
            message: format!("no bidsmap rule matches {}", series.display()),
            series: series.to_path_buf(),
        }
    }

    /// Create a conversion error for a series folder
    pub fn conversion(
        code: u16,
        message: impl Into<String>,
        series: &Path,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Conversion {
            code,
            message: message.into(),
            series: series.to_path_buf(),
            exit_code,
            source: None,
        }
    }

    /// Create a normalization error for an emitted file
    pub fn normalization(code: u16, message: impl Into<String>, path: &Path) -> Self {
        Self::Normalization {
            code,
            message: message.into(),
            path: path.to_path_buf(),
            source: None,
        }
    }

    /// Create an error for an acquisition kind without a handler
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            code: ErrorCode::CONFIG_UNSUPPORTED_SOURCE,
            message: message.into(),
        }
    }

    /// Create a storage error with specific code and path
    pub fn storage_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Conversion { source: src, .. }
            | Self::Normalization { source: src, .. }
            | Self::Storage { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::Identity { .. } | Self::NoMatch { .. } | Self::Unsupported { .. } => {}
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Identity { message, .. }
            | Self::NoMatch { message, .. }
            | Self::Conversion { message, .. }
            | Self::Normalization { message, .. }
            | Self::Unsupported { message, .. }
            | Self::Storage { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Identity { code, .. }
            | Self::NoMatch { code, .. }
            | Self::Conversion { code, .. }
            | Self::Normalization { code, .. }
            | Self::Unsupported { code, .. }
            | Self::Storage { code, .. } => *code,
        }
    }

    /// Get the process exit code for this error when it ends the run
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Identity { .. } => 3,
            Self::Storage { .. } => 4,
            Self::Conversion { .. } => 5,
            Self::NoMatch { .. } => 6,
            Self::Normalization { .. } => 7,
            Self::Unsupported { .. } => 1,
        }
    }

    /// Whether the run can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::Storage { .. })
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Bidsmap problem: {}", message),
            Self::Identity {
                message, session, ..
            } => format!("Skipping {}: {}", session.display(), message),
            Self::NoMatch { series, .. } => format!(
                "Series {} does not match any bidsmap rule",
                series.display()
            ),
            Self::Conversion {
                message,
                series,
                exit_code,
                ..
            } => match exit_code {
                Some(code) => format!(
                    "Failed to process {} (errorcode {}): {}",
                    series.display(),
                    code,
                    message
                ),
                None => format!("Failed to process {}: {}", series.display(), message),
            },
            Self::Normalization { message, path, .. } => {
                format!("Left {} as-is: {}", path.display(), message)
            }
            Self::Unsupported { message, .. } => format!("Not yet supported: {}", message),
            Self::Storage { message, path, .. } => match path {
                Some(p) => format!("Storage error at {}: {}", p.display(), message),
                None => format!("Storage error: {}", message),
            },
        }
    }

    /// Get a detailed message including the source chain
    pub fn developer_message(&self) -> String {
        let mut message = format!("{} ({})", self, describe_error_code(self.code()));
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            message.push_str(&format!("\n  caused by: {}", err));
            source = err.source();
        }
        message
    }
}

impl From<serde_yaml::Error> for CoinError {
    fn from(err: serde_yaml::Error) -> Self {
        CoinError::config_with_code(ErrorCode::CONFIG_INVALID_YAML, err.to_string())
            .with_source(err)
    }
}

impl From<csv::Error> for CoinError {
    fn from(err: csv::Error) -> Self {
        CoinError::storage_with_code(ErrorCode::STORAGE_CORRUPTED, err.to_string(), None)
            .with_source(err)
    }
}

impl From<std::io::Error> for CoinError {
    fn from(err: std::io::Error) -> Self {
        CoinError::storage_with_code(ErrorCode::STORAGE_IO_ERROR, err.to_string(), None)
            .with_source(err)
    }
}

/// Type alias for Results using CoinError
pub type Result<T> = std::result::Result<T, CoinError>;
