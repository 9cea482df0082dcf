//! Unified error handling for fanhal
//!
//! Every driver operation returns [`FanhalError`]. The variants fall into the
//! three kinds the scheduler cares about (see [`ErrorKind`]):
//!
//! - **Io**: an OS-level failure on a control or data file, carrying the raw
//!   errno so callers can discriminate (e.g. `EINVAL` after resume).
//! - **System**: the hardware, kernel module or vendor library does not behave
//!   as expected. Retrying will not help.
//! - **Config**: the calibration or driver description is invalid.

use std::io;

/// Result type alias using FanhalError
pub type Result<T> = std::result::Result<T, FanhalError>;

/// Coarse classification of a [`FanhalError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    System,
    Config,
}

/// Unified error type for all fanhal operations
#[derive(thiserror::Error, Debug)]
pub enum FanhalError {
    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: io::Error,
    },

    // ============================================================================
    // System Errors (hardware, kernel module, vendor library)
    // ============================================================================
    #[error("{0}")]
    System(String),

    #[error("{call} failed. Error code (cf. nvml.h): {code}")]
    Vendor {
        call: String,
        code: u32,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl FanhalError {
    /// Wrap an I/O error with a description of what was being attempted
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a system error from a string
    pub fn system(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a vendor library error carrying the library's return code
    pub fn vendor(call: impl Into<String>, code: u32) -> Self {
        Self::Vendor {
            call: call.into(),
            code,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::System(_) | Self::Vendor { .. } => ErrorKind::System,
            Self::Config(_) | Self::JsonParse(_) => ErrorKind::Config,
        }
    }

    /// Raw OS error code of an I/O error, if there is one
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
