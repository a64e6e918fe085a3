//! Error types for socket inventory.

use std::io;

/// Result type for socket inventory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while taking a socket inventory.
///
/// Only failures that stop the whole snapshot show up here. A process that
/// exits mid-scan or a descriptor whose metadata cannot be read is skipped,
/// not reported.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The process table could not be read at all.
    #[error("process enumeration failed: {message} (errno {errno})")]
    EnumerationFailed {
        /// The errno value reported by the OS.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// The running platform has no libproc.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// A socket layout description is unusable.
    #[error("invalid socket layout: {0}")]
    Layout(String),

    /// I/O error (reading a layout file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON error (parsing a layout file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A scan worker panicked or was cancelled.
    #[error("scan worker failed: {0}")]
    Join(String),
}

impl Error {
    /// Create an enumeration error from an errno value.
    pub fn enumeration_failed(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(errno).to_string();
        Self::EnumerationFailed { errno, message }
    }

    /// Create an enumeration error from the calling thread's last OS error.
    pub fn last_enumeration_error() -> Self {
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
        Self::enumeration_failed(errno)
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::EnumerationFailed { errno, .. } => {
                matches!(*errno, libc::EPERM | libc::EACCES)
            }
            Self::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// Get the errno value if this is an enumeration error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::EnumerationFailed { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}
