//! Kind-tagged errors surfaced to the driver, per spec.md §7.

use std::fmt;

/// Errors that can escape the metadata layer.
#[derive(Debug)]
#[non_exhaustive]
pub enum MetadataError {
    /// The module file or its symbol sidecar could not be opened, or a
    /// required precondition (e.g. sidecar presence) did not hold.
    PreconditionFailed(String),
    /// The on-disk container did not parse as a valid module.
    BadFormat(String),
    /// An I/O failure while reading or writing the module file.
    Io(std::io::Error),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::PreconditionFailed(msg) => write!(f, "precondition failed: {msg}"),
            MetadataError::BadFormat(msg) => write!(f, "malformed module: {msg}"),
            MetadataError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Io(e)
    }
}
