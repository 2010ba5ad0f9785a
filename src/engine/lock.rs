//! Per-destination advisory locking
//!
//! One deployment per destination root at a time, enforced with an
//! advisory `flock`-style lock on a lock file inside the destination. The
//! lock is process-crash safe: the OS releases it when the holding process
//! dies, so no stale-lock cleanup is needed.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, destination_in_use, destination_locked};

const LOCK_FILE: &str = ".modforge.lock";

/// Exclusive advisory lock on a destination root
///
/// Held for the whole deployment; released on drop. The lock file itself
/// is left in place, only the advisory lock is released.
#[derive(Debug)]
pub struct DestinationLock {
    file: File,
    root: PathBuf,
}

impl DestinationLock {
    /// Acquire the lock, failing immediately if another holder exists
    ///
    /// # Errors
    ///
    /// Returns `ModforgeError::DestinationLocked` if another deployment
    /// holds the lock, or an IO error if the lock file cannot be created.
    pub fn acquire(dest_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(dest_root)?;
        let root = dunce::canonicalize(dest_root).unwrap_or_else(|_| dest_root.to_path_buf());

        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|_| destination_locked(root.display().to_string()))?;

        debug!(root = %root.display(), "destination lock acquired");
        Ok(Self { file, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Whether something currently holds the destination's advisory lock
///
/// Launcher precondition hook: callers that also take the lock while the
/// destination is in active use (a running game process) can be detected
/// here before a deployment is even planned.
pub fn is_destination_in_use(dest_root: &Path) -> bool {
    let path = dest_root.join(LOCK_FILE);
    let Ok(file) = OpenOptions::new().read(true).write(true).open(&path) else {
        // No lock file yet, nothing can be holding it
        return false;
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = file.unlock();
            false
        }
        Err(_) => true,
    }
}

/// Fail if the destination is in active use
///
/// # Errors
///
/// Returns `ModforgeError::DestinationInUse` while the advisory lock is
/// held by another process.
pub fn ensure_destination_free(dest_root: &Path) -> Result<()> {
    if is_destination_in_use(dest_root) {
        return Err(destination_in_use(dest_root.display().to_string()));
    }
    Ok(())
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(root = %self.root.display(), "destination lock released");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ModforgeError;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let temp = TempDir::new().unwrap();
        let _held = DestinationLock::acquire(temp.path()).unwrap();

        let err = DestinationLock::acquire(temp.path()).unwrap_err();
        assert!(matches!(err, ModforgeError::DestinationLocked { .. }));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        {
            let _held = DestinationLock::acquire(temp.path()).unwrap();
        }
        // Previous holder dropped, re-acquire succeeds
        let _again = DestinationLock::acquire(temp.path()).unwrap();
    }

    #[test]
    fn test_destination_in_use_tracks_lock() {
        let temp = TempDir::new().unwrap();
        assert!(!is_destination_in_use(temp.path()));
        assert!(ensure_destination_free(temp.path()).is_ok());

        let held = DestinationLock::acquire(temp.path()).unwrap();
        assert!(is_destination_in_use(temp.path()));
        let err = ensure_destination_free(temp.path()).unwrap_err();
        assert!(matches!(err, ModforgeError::DestinationInUse { .. }));

        drop(held);
        assert!(!is_destination_in_use(temp.path()));
    }

    #[test]
    fn test_acquire_creates_missing_destination() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("game").join("BepInEx");
        let lock = DestinationLock::acquire(&nested).unwrap();
        assert!(lock.root().exists());
    }
}
