//! Kind-tagged errors surfaced to the driver, per spec.md §7.

use std::fmt;

/// Errors that can escape the engine layer.
#[derive(Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// `instrument()` was called without first checking `can_instrument()`,
    /// or the symbol sidecar otherwise could not be opened.
    PreconditionFailed(String),
    /// The symbol analyser returned data that could not be reconciled
    /// with the module (e.g. referenced a method that does not exist).
    BadSymbols(String),
    /// An I/O failure while reading or writing module or sidecar data.
    Io(String),
    /// The runtime tracker template could not be found in the engine's
    /// own assembly. Fatal: spec.md §7 calls this "Fatal precondition
    /// violation".
    TemplateNotFound(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::PreconditionFailed(msg) => write!(f, "precondition failed: {msg}"),
            EngineError::BadSymbols(msg) => write!(f, "bad symbol data: {msg}"),
            EngineError::Io(msg) => write!(f, "I/O error: {msg}"),
            EngineError::TemplateNotFound(msg) => write!(f, "tracker template not found: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
