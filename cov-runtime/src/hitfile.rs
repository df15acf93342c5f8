//! Binary hit-file codec (spec.md §6):
//!
//! ```text
//! offset 0 : int32 N          -- number of entries
//! offset 4 : int32 counts[0]
//! offset 8 : int32 counts[1]
//! ...
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use zerocopy::{AsBytes, FromBytes, FromZeroes, KnownLayout, Unaligned, LE, U32};

use crate::error::RuntimeError;

#[derive(Unaligned, AsBytes, FromBytes, FromZeroes, KnownLayout)]
#[repr(C)]
struct HitFileHeader {
    count: U32<LE>,
}

static_assertions::const_assert_eq!(std::mem::size_of::<HitFileHeader>(), 4);

/// Reads `path` as a hit file. A missing file, a zero-length file, or
/// one too short to hold its own declared counters is treated as
/// *absent* (`Ok(None)`) rather than an error — this distinguishes
/// "never written" from "written by a different instrumentation of
/// the same path" (SPEC_FULL.md §2), the latter of which is the
/// `HitFileMismatch` case `merge` below raises.
pub fn read(path: &Path) -> Result<Option<Vec<i32>>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("reading hit file"),
    };
    let Some(header) = HitFileHeader::ref_from_prefix(&bytes[..]) else {
        return Ok(None);
    };
    let rest = &bytes[std::mem::size_of::<HitFileHeader>()..];
    let count = header.count.get() as usize;
    if rest.len() < count * 4 {
        return Ok(None);
    }
    let counts = rest[..count * 4].chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
    Ok(Some(counts))
}

/// Overwrites `path` with `counts`, whole-word: the length prefix and
/// every counter are each written in one pass so a crash mid-write
/// leaves the file at worst truncated, never holding a torn value
/// (spec.md §5 — on-disk state is "at worst stale, not corrupt").
pub fn write(path: &Path, counts: &[i32]) -> Result<()> {
    let header = HitFileHeader { count: U32::new(counts.len() as u32) };
    let mut bytes = header.as_bytes().to_vec();
    for c in counts {
        bytes.extend_from_slice(&c.to_le_bytes());
    }
    std::fs::write(path, bytes).context("writing hit file")
}

/// Sums `counts` into whatever is on disk at `path` and writes the
/// result back. Callers are expected to already hold the named
/// inter-process exclusion for `path` (see `mutex::HitFileLock`).
pub fn merge(path: &Path, counts: &[i32]) -> Result<()> {
    match read(path)? {
        Some(existing) if existing.len() == counts.len() => {
            let merged: Vec<i32> = existing.iter().zip(counts).map(|(a, b)| a.wrapping_add(*b)).collect();
            write(path, &merged)
        }
        Some(existing) => bail!(RuntimeError::HitFileMismatch {
            on_disk: existing.len(),
            expected: counts.len(),
        }),
        None => write(path, counts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let dir = std::env::temp_dir().join(format!("cov-runtime-hitfile-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hits.bin");

        write(&path, &[3, 4]).unwrap();
        assert_eq!(read(&path).unwrap(), Some(vec![3, 4]));

        merge(&path, &[1, 2]).unwrap();
        assert_eq!(read(&path).unwrap(), Some(vec![4, 6]));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_absent() {
        let path = std::env::temp_dir().join("cov-runtime-hitfile-does-not-exist.bin");
        assert_eq!(read(&path).unwrap(), None);
    }

    #[test]
    fn length_mismatch_against_wellformed_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("cov-runtime-hitfile-mismatch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hits.bin");
        write(&path, &[1, 2, 3]).unwrap();

        let err = merge(&path, &[1, 2]).unwrap_err();
        assert!(err.to_string().contains("expected 2"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn truncated_file_is_treated_as_absent() {
        let dir = std::env::temp_dir().join(format!("cov-runtime-hitfile-truncated-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hits.bin");
        std::fs::write(&path, [5u8, 0, 0, 0, 1, 0]).unwrap(); // declares N=5 but only 2 bytes of payload follow
        assert_eq!(read(&path).unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
