use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boardlink unified error type
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Connection error: {message}")]
    Connect { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Device not connected")]
    NotConnected,

    #[error("Write error: {message}")]
    Write { message: String },

    #[error("Read error: {message}")]
    Read { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::Connect { .. } => ErrorKind::Connect,
            DeviceError::Config { .. } => ErrorKind::Config,
            DeviceError::NotConnected => ErrorKind::NotConnected,
            DeviceError::Write { .. } => ErrorKind::Write,
            DeviceError::Read { .. } => ErrorKind::Read,
            DeviceError::Cancelled => ErrorKind::Cancelled,
            DeviceError::Storage { .. } => ErrorKind::Storage,
            DeviceError::InvalidInput(_) => ErrorKind::Input,
            DeviceError::Output(_) => ErrorKind::Output,
        }
    }

    /// True for errors that signal expected teardown rather than failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DeviceError::Cancelled)
    }
}

/// Error classification carried in session snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connect,
    Config,
    NotConnected,
    Write,
    Read,
    Cancelled,
    Storage,
    Input,
    Output,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Connect => "connect",
            ErrorKind::Config => "config",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::Write => "write",
            ErrorKind::Read => "read",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Storage => "storage",
            ErrorKind::Input => "input",
            ErrorKind::Output => "output",
        };
        write!(f, "{}", name)
    }
}

/// Last failure recorded in the session state store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&DeviceError> for LastError {
    fn from(err: &DeviceError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<LastError> for DeviceError {
    fn from(record: LastError) -> Self {
        match record.kind {
            ErrorKind::Connect => DeviceError::Connect {
                message: record.message,
            },
            ErrorKind::Config => DeviceError::Config {
                message: record.message,
            },
            ErrorKind::NotConnected => DeviceError::NotConnected,
            ErrorKind::Write => DeviceError::Write {
                message: record.message,
            },
            ErrorKind::Read => DeviceError::Read {
                message: record.message,
            },
            ErrorKind::Cancelled => DeviceError::Cancelled,
            ErrorKind::Storage => DeviceError::Storage {
                message: record.message,
            },
            ErrorKind::Input => DeviceError::InvalidInput(record.message),
            ErrorKind::Output => DeviceError::Output(record.message),
        }
    }
}
