use std::io;
use std::time::Duration;

use shared::{ErrorCategory, ErrorCode, ValidationError};

use crate::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid bet record: {0}")]
    InvalidRecord(#[from] ValidationError),

    #[error("Invalid bet record on line {line}: {source}")]
    InvalidRow {
        line: u64,
        #[source]
        source: ValidationError,
    },

    #[error("Failed to read records from {path}: {source}")]
    RecordSource {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Timed out connecting to {address} after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] CodecError),

    #[error("Failed to send frame: {0}")]
    Send(#[source] io::Error),

    #[error("Short write detected: {written} of {expected} bytes accepted")]
    ShortWrite { written: usize, expected: usize },

    #[error("Failed to receive response: {0}")]
    Receive(#[source] io::Error),

    #[error("Session is not connected")]
    NotConnected,

    #[error("No final answer after {attempts} winner queries")]
    PollAttemptsExhausted { attempts: u32 },

    #[error("Run cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::InvalidRecord(_)
            | ClientError::InvalidRow { .. }
            | ClientError::RecordSource { .. } => ErrorCategory::Config,
            ClientError::Connect { .. } | ClientError::ConnectTimeout { .. } => {
                ErrorCategory::Connection
            }
            ClientError::Encode(_) | ClientError::Send(_) | ClientError::ShortWrite { .. } => {
                ErrorCategory::Send
            }
            ClientError::Receive(_)
            | ClientError::NotConnected
            | ClientError::PollAttemptsExhausted { .. } => ErrorCategory::Receive,
            ClientError::Cancelled => ErrorCategory::Cancelled,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::InvalidRecord(_) | ClientError::InvalidRow { .. } => {
                ErrorCode::CONFIG_INVALID_RECORD
            }
            ClientError::RecordSource { .. } => ErrorCode::CONFIG_RECORD_SOURCE,
            ClientError::Connect { .. } => ErrorCode::CONNECTION_DIAL_FAILED,
            ClientError::ConnectTimeout { .. } => ErrorCode::CONNECTION_DIAL_TIMEOUT,
            ClientError::Encode(_) => ErrorCode::SEND_FRAME_TOO_LARGE,
            ClientError::Send(_) => ErrorCode::SEND_WRITE_FAILED,
            ClientError::ShortWrite { .. } => ErrorCode::SEND_SHORT_WRITE,
            ClientError::Receive(_) => ErrorCode::RECEIVE_READ_FAILED,
            ClientError::NotConnected => ErrorCode::RECEIVE_NOT_CONNECTED,
            ClientError::PollAttemptsExhausted { .. } => ErrorCode::RECEIVE_POLL_EXHAUSTED,
            ClientError::Cancelled => ErrorCode::CANCELLED,
        }
    }

    /// Log the error once, at the level its category calls for
    pub fn log(&self) {
        let category = self.category();
        match category.log_level() {
            "info" => tracing::info!(
                error_category = %category,
                "Closing client connection due to received signal"
            ),
            "warn" => tracing::warn!(
                error_category = %category,
                error_code = %self.code(),
                error = %self,
                "Protocol anomaly"
            ),
            _ => tracing::error!(
                error_category = %category,
                error_code = %self.code(),
                error = %self,
                "Client run failed"
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
