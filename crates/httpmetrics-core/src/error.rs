//! Shared error type across httpmetrics crates.

use std::fmt;
use std::io;

use thiserror::Error;

/// Stable error codes, independent of the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Construction-time misconfiguration.
    InvalidConfig,
    /// Optional response writer capability missing.
    Unsupported,
    /// Underlying I/O failure.
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::Unsupported => "UNSUPPORTED",
            ErrorKind::Io => "IO",
        }
    }
}

/// Optional capabilities a response writer may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Flush,
    Hijack,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Flush => f.write_str("flush"),
            Capability::Hijack => f.write_str("hijack"),
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HttpMetricsError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum HttpMetricsError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("response writer does not support {0}")]
    Unsupported(Capability),
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl HttpMetricsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HttpMetricsError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            HttpMetricsError::Unsupported(_) => ErrorKind::Unsupported,
            HttpMetricsError::Io(_) => ErrorKind::Io,
        }
    }
}
