//! Deployment state persistence errors

use super::ModforgeError;

/// Creates a state parse error
pub fn state_parse_failed(path: impl Into<String>, reason: impl Into<String>) -> ModforgeError {
    ModforgeError::StateParseFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates a profile corrupted error
pub fn profile_corrupted(profile: impl Into<String>, marker: impl Into<String>) -> ModforgeError {
    ModforgeError::ProfileCorrupted {
        profile: profile.into(),
        marker: marker.into(),
    }
}
