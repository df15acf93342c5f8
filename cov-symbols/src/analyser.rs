//! The boundary this crate exposes to the detailed symbol analyser.
//!
//! The analyser that computes sequence points and branch points from
//! raw debug-symbol tables is treated as an external library the
//! engine calls (spec.md §1, §6) — this crate only defines its
//! contract and ships a minimal concrete implementation
//! (`sidecar::SidecarAnalyser`) sufficient to drive the engine end to
//! end in tests and in `covtool`.

use anyhow::Result;

use crate::types::{BranchPoint, SequencePoint};

/// Identifies a method for the purposes of looking up its debug info.
/// Symbol sidecars index methods by declaring type and name, not by
/// the engine's own `MethodId`, since the sidecar is produced
/// independently of any particular in-memory module graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub declaring_type: String,
    pub method_name: String,
}

impl MethodKey {
    pub fn new(declaring_type: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method_name: method_name.into(),
        }
    }
}

/// Bridges to the external symbol analyser.
pub trait SymbolAnalyser {
    /// Every non-hidden and hidden sequence point recorded for `method`,
    /// keyed by instruction offset. Hidden points are included (the
    /// filter is applied by the caller, per spec.md §4.2) so that a
    /// richer analyser implementation can still expose them for
    /// diagnostics.
    fn sequence_points(&self, method: &MethodKey) -> Result<Vec<SequencePoint>>;

    /// Every branch point recorded for `method`, in encounter order.
    fn branch_points(&self, method: &MethodKey) -> Result<Vec<BranchPoint>>;
}
