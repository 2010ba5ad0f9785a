//! File system errors

use super::ModforgeError;

/// Creates a file not found error
pub fn file_not_found(path: impl Into<String>) -> ModforgeError {
    ModforgeError::FileNotFound { path: path.into() }
}

/// Creates a file read error
pub fn file_read_failed(path: impl Into<String>, reason: impl Into<String>) -> ModforgeError {
    ModforgeError::FileReadFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a file write error
pub fn file_write_failed(path: impl Into<String>, reason: impl Into<String>) -> ModforgeError {
    ModforgeError::FileWriteFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates an IO error
pub fn io_error(message: impl Into<String>) -> ModforgeError {
    ModforgeError::IoError {
        message: message.into(),
    }
}
