//! Cross-platform path utilities
//!
//! Destination paths in manifests and deployment state are stored normalized:
//! forward slashes, relative to the destination root, with no `.`/`..`
//! components. Normalization happens once at the boundary so that path
//! comparison everywhere else is plain string equality.

use std::path::Path;

use crate::error::{ModforgeError, Result};

/// Characters that are unsafe in filesystem file names
/// Replaced with hyphens: `/`, `\`, `:`, `*`, `?`, `"`, `<`, `>`, `|`
const PATH_UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Convert a path to a forward-slash string for display and state keys
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Normalize a destination-relative path
///
/// Accepts `/` or `\` separators, strips `.` components, and rejects
/// absolute paths, empty paths and any `..` component.
///
/// # Errors
///
/// Returns `ModforgeError::InvalidManifestPath` if the path is absolute,
/// empty, or would escape the destination root.
pub fn normalize_rel_path(raw: &str) -> Result<String> {
    let unified = raw.replace('\\', "/");

    if unified.starts_with('/') || has_windows_drive_prefix(&unified) {
        return Err(ModforgeError::InvalidManifestPath {
            path: raw.to_string(),
            reason: "absolute paths are not allowed".to_string(),
        });
    }

    let mut components = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                return Err(ModforgeError::InvalidManifestPath {
                    path: raw.to_string(),
                    reason: "parent directory components are not allowed".to_string(),
                });
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        return Err(ModforgeError::InvalidManifestPath {
            path: raw.to_string(),
            reason: "path is empty".to_string(),
        });
    }

    Ok(components.join("/"))
}

fn has_windows_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), Some(':')) if c.is_ascii_alphabetic()
    )
}

/// Make a profile or unit name safe for filesystem use
///
/// Replaces unsafe characters with hyphens, collapses consecutive hyphens
/// and trims leading/trailing hyphens. Returns "unknown" if the result is
/// empty.
pub fn make_path_safe(name: &str) -> String {
    let key: String = name
        .chars()
        .map(|c| {
            if PATH_UNSAFE_CHARS.contains(&c) {
                '-'
            } else {
                c
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(key.len());
    let mut last_was_hyphen = false;
    for c in key.chars() {
        if c == '-' {
            if !last_was_hyphen {
                collapsed.push(c);
            }
            last_was_hyphen = true;
        } else {
            collapsed.push(c);
            last_was_hyphen = false;
        }
    }

    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rel_path() {
        assert_eq!(normalize_rel_path("plugins/mod.dll").unwrap(), "plugins/mod.dll");
        assert_eq!(normalize_rel_path("plugins\\mod.dll").unwrap(), "plugins/mod.dll");
        assert_eq!(normalize_rel_path("./config//shared.cfg").unwrap(), "config/shared.cfg");
    }

    macro_rules! test_normalize_rejects {
        ($test_name:ident, $input:expr) => {
            #[test]
            fn $test_name() {
                let result = normalize_rel_path($input);
                assert!(matches!(
                    result.unwrap_err(),
                    ModforgeError::InvalidManifestPath { .. }
                ));
            }
        };
    }

    test_normalize_rejects!(test_normalize_rejects_absolute, "/etc/passwd");
    test_normalize_rejects!(test_normalize_rejects_drive, "C:\\game\\file.dll");
    test_normalize_rejects!(test_normalize_rejects_parent, "../outside.dll");
    test_normalize_rejects!(test_normalize_rejects_nested_parent, "plugins/../../out.dll");
    test_normalize_rejects!(test_normalize_rejects_empty, "");
    test_normalize_rejects!(test_normalize_rejects_dot_only, "./.");

    #[test]
    fn test_make_path_safe() {
        assert_eq!(make_path_safe("default"), "default");
        assert_eq!(make_path_safe("my/profile:v2"), "my-profile-v2");
        assert_eq!(make_path_safe(":::"), "unknown");
    }
}
