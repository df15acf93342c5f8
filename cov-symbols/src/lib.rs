//! Symbol Bridge: the contract between the instrumentation engine and
//! whatever analyser turns debug-symbol tables into sequence points
//! and branch points (spec.md §4.2).
//!
//! This crate does not itself parse any particular debug-symbol
//! format. It defines `SymbolAnalyser`, the boundary the engine calls
//! through, and ships `SidecarAnalyser` — a concrete implementation
//! backed by a small private binary sidecar file — so the engine can
//! be driven end to end without a real external analyser plugged in.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod analyser;
mod sidecar;
mod types;

pub use analyser::{MethodKey, SymbolAnalyser};
pub use sidecar::{SidecarAnalyser, SidecarBuilder};
pub use types::{BranchPoint, SequencePoint};

#[cfg(test)]
#[static_init::dynamic]
static INIT_LOGGER: () = {
    let _ = tracing_subscriber::fmt::try_init();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_point_without_document_is_skipped() {
        let bp = BranchPoint {
            document: None,
            offset: 0,
            end_offset: 0,
            start_line: 5,
            path: vec![],
            ordinal: 0,
        };
        assert!(bp.is_skipped());
    }

    #[test]
    fn branch_point_with_negative_start_line_is_skipped() {
        let bp = BranchPoint {
            document: Some("a.rs".into()),
            offset: 0,
            end_offset: 0,
            start_line: -1,
            path: vec![],
            ordinal: 0,
        };
        assert!(bp.is_skipped());
    }

    #[test]
    fn branch_point_with_document_and_line_is_not_skipped() {
        let bp = BranchPoint {
            document: Some("a.rs".into()),
            offset: 0,
            end_offset: 0,
            start_line: 5,
            path: vec![],
            ordinal: 0,
        };
        assert!(!bp.is_skipped());
    }
}
