/// Shared error classification for the bet client
///
/// Design Philosophy:
/// - Every failure maps to one category that decides whether the run survives it
/// - Standardized error codes so log lines can be grepped and aggregated
///
/// Usage:
/// - Crate-specific error enums expose `category()` and `code()`
/// - Error codes follow pattern: <CATEGORY>_<SPECIFIC>
use std::fmt;

/// Error categories that decide fatality and logging severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed input (bad date/number, bad configuration)
    /// Raised before any network activity
    Config,

    /// Dial failure or dial timeout
    Connection,

    /// Write or flush failure, including short writes
    Send,

    /// Read failure other than a tolerated end-of-stream
    Receive,

    /// Acknowledgment text did not match what was expected
    /// Delivery already succeeded at the transport level
    Protocol,

    /// Orderly abort requested from outside
    Cancelled,
}

impl ErrorCategory {
    /// Map error category to log level
    pub fn log_level(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "error",
            ErrorCategory::Connection => "error",
            ErrorCategory::Send => "error",
            ErrorCategory::Receive => "error",
            ErrorCategory::Protocol => "warn",
            ErrorCategory::Cancelled => "info",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Connection => "CONNECTION",
            ErrorCategory::Send => "SEND",
            ErrorCategory::Receive => "RECEIVE",
            ErrorCategory::Protocol => "PROTOCOL",
            ErrorCategory::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard error codes used across the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    // Configuration / input errors
    pub const CONFIG_INVALID_RECORD: ErrorCode = ErrorCode("CONFIG_INVALID_RECORD");
    pub const CONFIG_RECORD_SOURCE: ErrorCode = ErrorCode("CONFIG_RECORD_SOURCE");

    // Connection errors
    pub const CONNECTION_DIAL_FAILED: ErrorCode = ErrorCode("CONNECTION_DIAL_FAILED");
    pub const CONNECTION_DIAL_TIMEOUT: ErrorCode = ErrorCode("CONNECTION_DIAL_TIMEOUT");

    // Send errors
    pub const SEND_WRITE_FAILED: ErrorCode = ErrorCode("SEND_WRITE_FAILED");
    pub const SEND_SHORT_WRITE: ErrorCode = ErrorCode("SEND_SHORT_WRITE");
    pub const SEND_FRAME_TOO_LARGE: ErrorCode = ErrorCode("SEND_FRAME_TOO_LARGE");

    // Receive errors
    pub const RECEIVE_READ_FAILED: ErrorCode = ErrorCode("RECEIVE_READ_FAILED");
    pub const RECEIVE_NOT_CONNECTED: ErrorCode = ErrorCode("RECEIVE_NOT_CONNECTED");
    pub const RECEIVE_POLL_EXHAUSTED: ErrorCode = ErrorCode("RECEIVE_POLL_EXHAUSTED");

    // Protocol anomalies
    pub const PROTOCOL_ACK_MISMATCH: ErrorCode = ErrorCode("PROTOCOL_ACK_MISMATCH");

    pub const CANCELLED: ErrorCode = ErrorCode("CANCELLED");
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
