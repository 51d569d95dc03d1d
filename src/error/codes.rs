/// Error code registry for bidscoiner
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors (bidsmap, plugins, arguments)
/// - 2000-2999: Identity errors
/// - 3000-3999: Storage errors (registry, transcript, output tree)
/// - 4000-4999: Conversion errors
/// - 5000-5999: Classification errors
/// - 6000-6999: Normalization errors
/// - 9000-9999: Other errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_YAML: u16 = 1002;
    pub const CONFIG_VALIDATION_FAILED: u16 = 1008;
    pub const CONFIG_UNKNOWN_PLUGIN: u16 = 1010;
    pub const CONFIG_UNSUPPORTED_SOURCE: u16 = 1011;

    // Identity errors (2000-2999)
    pub const IDENTITY_GENERIC: u16 = 2000;
    pub const IDENTITY_NO_SUBJECT: u16 = 2001;
    pub const IDENTITY_NO_SERIES: u16 = 2002;

    // Storage errors (3000-3999)
    pub const STORAGE_GENERIC: u16 = 3000;
    pub const STORAGE_IO_ERROR: u16 = 3001;
    pub const STORAGE_CORRUPTED: u16 = 3006;
    pub const STORAGE_SERIALIZATION_ERROR: u16 = 3011;

    // Conversion errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4001;
    pub const EXEC_TIMEOUT: u16 = 4002;
    pub const EXEC_SUBPROCESS_FAILED: u16 = 4003;
    pub const EXEC_SIGNAL_RECEIVED: u16 = 4005;
    pub const EXEC_SPAWN_FAILED: u16 = 4007;

    // Classification errors (5000-5999)
    pub const CLASSIFY_NO_MATCH: u16 = 5001;

    // Normalization errors (6000-6999)
    pub const NORMALIZE_GENERIC: u16 = 6000;
    pub const NORMALIZE_MISSING_SIDECAR: u16 = 6001;
    pub const NORMALIZE_INVALID_SIDECAR: u16 = 6002;
    pub const NORMALIZE_MISSING_TASK_LABEL: u16 = 6003;
    pub const NORMALIZE_RENAME_FAILED: u16 = 6004;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Bidsmap file not found",
        ErrorCode::CONFIG_INVALID_YAML => "Invalid YAML syntax in bidsmap",
        ErrorCode::CONFIG_VALIDATION_FAILED => "Bidsmap validation failed",
        ErrorCode::CONFIG_UNKNOWN_PLUGIN => "Plugin is not registered",
        ErrorCode::CONFIG_UNSUPPORTED_SOURCE => "Acquisition kind is not yet supported",

        ErrorCode::IDENTITY_GENERIC => "General identity error",
        ErrorCode::IDENTITY_NO_SUBJECT => "No valid subject identifier found",
        ErrorCode::IDENTITY_NO_SERIES => "Session has no series to probe",

        ErrorCode::STORAGE_GENERIC => "General storage error",
        ErrorCode::STORAGE_IO_ERROR => "I/O error during storage operation",
        ErrorCode::STORAGE_CORRUPTED => "Stored data is corrupted",
        ErrorCode::STORAGE_SERIALIZATION_ERROR => "Failed to serialize data",

        ErrorCode::EXEC_GENERIC => "General conversion error",
        ErrorCode::EXEC_COMMAND_NOT_FOUND => "Converter not found",
        ErrorCode::EXEC_TIMEOUT => "Converter timed out",
        ErrorCode::EXEC_SUBPROCESS_FAILED => "Converter exited with a non-zero status",
        ErrorCode::EXEC_SIGNAL_RECEIVED => "Converter terminated by signal",
        ErrorCode::EXEC_SPAWN_FAILED => "Failed to spawn converter",

        ErrorCode::CLASSIFY_NO_MATCH => "No bidsmap rule matches the series",

        ErrorCode::NORMALIZE_GENERIC => "General normalization error",
        ErrorCode::NORMALIZE_MISSING_SIDECAR => "Expected sidecar file is missing",
        ErrorCode::NORMALIZE_INVALID_SIDECAR => "Sidecar file is not a JSON object",
        ErrorCode::NORMALIZE_MISSING_TASK_LABEL => "Functional name carries no task label",
        ErrorCode::NORMALIZE_RENAME_FAILED => "Failed to rename converter output",

        ErrorCode::OTHER_GENERIC => "General error",
        _ => "Unknown error",
    }
}
