//! Kind-tagged errors surfaced to the hosting process, per spec.md §7.

use std::fmt;

/// Errors the runtime tracker can raise while updating a hit file.
#[derive(Debug)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The on-disk hit file's counter count did not match the
    /// in-memory counter array it was being merged against. Per
    /// spec.md §6/§7 this is a hard error; no partial write occurs.
    HitFileMismatch { on_disk: usize, expected: usize },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::HitFileMismatch { on_disk, expected } => {
                write!(f, "hit file has {on_disk} counters, expected {expected}")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}
