//! Opens a module together with its symbol sidecar, and writes a
//! modified module back to disk (spec.md §4.1).

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sync_file::{ReadAt, RandomAccessFile};
use tracing::debug;
use zerocopy::FromBytes;

use crate::error::MetadataError;
use crate::format::{ModuleHeaderFixed, MAGIC};
use crate::module::Module;
use crate::reader::parse_module;
use crate::writer::write_module;

/// The set of file extensions this engine recognizes as a debug-symbol
/// sidecar. Symbol-file discovery beyond "does a sidecar with one of
/// these extensions exist next to the module" is out of scope
/// (spec.md §1); callers needing richer discovery heuristics supply
/// their own sidecar path instead of relying on `sidecar_path`.
const SIDECAR_EXTENSIONS: &[&str] = &["symbols", "dbg"];

/// Finds the sidecar path that would accompany `module_path`, without
/// checking that it exists.
pub fn sidecar_path(module_path: &Path) -> PathBuf {
    module_path.with_extension(SIDECAR_EXTENSIONS[0])
}

/// Returns the sidecar path that actually exists next to `module_path`, if any.
pub fn find_existing_sidecar(module_path: &Path) -> Option<PathBuf> {
    for ext in SIDECAR_EXTENSIONS {
        let candidate = module_path.with_extension(ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// A module opened for instrumentation: the parsed metadata graph, plus
/// enough of the original file handle to write a modified module back
/// to the same stream on `flush`.
pub struct LoadedModule {
    path: PathBuf,
    pub module: Module,
}

impl LoadedModule {
    /// Opens `path` for read/write access and parses its metadata graph.
    ///
    /// This is a hard precondition failure if the module cannot be
    /// parsed; callers are expected to have already checked
    /// `can_instrument` for the sidecar precondition.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening module {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("reading length of {}", path.display()))?
            .len();
        let random = RandomAccessFile::from(file);
        let mut bytes = vec![0u8; len as usize];
        let mut read_so_far = 0usize;
        while read_so_far < bytes.len() {
            let n = random
                .read_at(&mut bytes[read_so_far..], read_so_far as u64)
                .with_context(|| format!("reading module data from {}", path.display()))?;
            if n == 0 {
                break;
            }
            read_so_far += n;
        }
        bytes.truncate(read_so_far);

        let module = parse_module(&bytes).map_err(|e| MetadataError::BadFormat(e.to_string()))?;
        debug!(module = %module.name, types = module.types.len(), methods = module.methods.len(), "loaded module");

        Ok(Self {
            path: path.to_path_buf(),
            module,
        })
    }

    /// Writes the (possibly modified) module back to the same file path
    /// it was opened from.
    pub fn flush(&self) -> anyhow::Result<()> {
        let bytes = write_module(&self.module);
        std::fs::write(&self.path, bytes)
            .with_context(|| format!("writing instrumented module to {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// True iff a symbol sidecar exists next to `module_path` and the
/// module's own container header parses, without fully decoding debug
/// info (SPEC_FULL.md §2). Per spec.md §4.1 this is a hard
/// precondition: `instrument()` must not be called when this returns
/// `false`.
pub fn can_instrument(module_path: &Path) -> bool {
    find_existing_sidecar(module_path).is_some() && has_valid_header(module_path)
}

fn has_valid_header(module_path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(module_path) else {
        return false;
    };
    let Some(header) = ModuleHeaderFixed::ref_from_prefix(&bytes[..]) else {
        return false;
    };
    header.magic == MAGIC
}
