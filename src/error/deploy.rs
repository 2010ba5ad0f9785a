//! Deployment and rollback errors

use super::ModforgeError;

/// Creates a digest mismatch error
pub fn hash_mismatch(
    path: impl Into<String>,
    expected: impl Into<String>,
    actual: impl Into<String>,
) -> ModforgeError {
    ModforgeError::HashMismatch {
        path: path.into(),
        expected: expected.into(),
        actual: actual.into(),
    }
}

/// Creates a permission denied error
pub fn permission_denied(path: impl Into<String>) -> ModforgeError {
    ModforgeError::PermissionDenied { path: path.into() }
}

/// Creates a destination locked error
pub fn destination_locked(root: impl Into<String>) -> ModforgeError {
    ModforgeError::DestinationLocked { root: root.into() }
}

/// Creates a destination in use error
pub fn destination_in_use(root: impl Into<String>) -> ModforgeError {
    ModforgeError::DestinationInUse { root: root.into() }
}

/// Creates the terminal rollback failed error
pub fn rollback_failed(paths: Vec<String>) -> ModforgeError {
    ModforgeError::RollbackFailed { paths }
}
