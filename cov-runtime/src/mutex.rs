//! Cross-process, cross-isolation-domain exclusion for hit-file
//! updates.
//!
//! spec.md §9 names a global named OS mutex as the primary mechanism
//! and an `O_EXCL` lock file beside the hit file as "an acceptable
//! substitute" on platforms lacking one; this crate implements the
//! substitute directly, since it needs no platform-specific bindings
//! and the substitute's guarantees (one successful creator, everyone
//! else blocks) are exactly what spec.md §5 requires of the primary
//! mechanism.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// Name = `<basename(hits_file_path)>_Mutex` (spec.md §6); the lock
/// file on disk is named after it directly.
pub fn lock_name(hits_file_path: &Path) -> String {
    let basename = hits_file_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    format!("{basename}_Mutex")
}

fn lock_file_path(hits_file_path: &Path) -> PathBuf {
    hits_file_path.with_file_name(format!("{}.lock", lock_name(hits_file_path)))
}

/// Held for the duration of one hit-file read-modify-write. Released
/// (lock file removed) on drop, including on an early return via `?`.
pub struct HitFileLock {
    path: PathBuf,
}

impl HitFileLock {
    /// Blocks until the lock can be acquired exclusively.
    pub fn acquire(hits_file_path: &Path) -> Result<Self> {
        let path = lock_file_path(hits_file_path);
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(e).context("acquiring hit file lock"),
            }
        }
    }
}

impl Drop for HitFileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_name_derives_from_hits_file_basename() {
        let path = Path::new("/tmp/sample_run1");
        assert_eq!(lock_name(path), "sample_run1_Mutex");
    }

    #[test]
    fn second_acquire_blocks_until_first_is_dropped() {
        let dir = std::env::temp_dir().join(format!("cov-runtime-mutex-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let hits_path = dir.join("hits.bin");

        let guard = HitFileLock::acquire(&hits_path).unwrap();
        drop(guard);
        // A second acquire after the first is dropped must succeed promptly.
        let _guard2 = HitFileLock::acquire(&hits_path).unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }
}
