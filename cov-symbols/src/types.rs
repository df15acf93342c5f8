//! Schemas exchanged with the external symbol analyser (spec.md §4.2).

/// A debug-info record mapping one instruction (identified by its
/// byte offset within a normalized, offset-assigned method body — see
/// `cov_metadata::MethodBody::assign_source_offsets`) to a source-line
/// range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencePoint {
    /// The instruction offset this sequence point is attached to.
    pub offset: u32,
    pub document_url: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Hidden points (used by compilers to mark generated code with no
    /// source mapping) are never instrumented.
    pub is_hidden: bool,
}

/// One outgoing edge of a conditional, at a given source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchPoint {
    /// `None` when the compiler emitted this branch with no reliable
    /// source anchor (e.g. synthesized equality methods). Such points
    /// are skipped, never instrumented (spec.md §4.2).
    pub document: Option<String>,
    pub offset: u32,
    /// The offset of the instruction that terminates this edge's
    /// predecessor block. The method instrumenter splices a prelude
    /// immediately before whichever instruction has this offset.
    pub end_offset: u32,
    /// `-1` means "no reliable source anchor"; treated the same as a missing `document`.
    pub start_line: i32,
    /// The sequence of branch offsets taken to reach this edge,
    /// innermost first. Used only for diagnostics/dedup; not part of
    /// the hit map identity.
    pub path: Vec<u32>,
    /// 0-based index among sibling branch points that share
    /// `(document, start_line)`.
    pub ordinal: u32,
}

impl BranchPoint {
    /// A branch point without a reliable source anchor is always
    /// skipped — spec.md §4.2: "A branch point whose `start_line == -1`
    /// or whose `document` is absent is skipped."
    pub fn is_skipped(&self) -> bool {
        self.start_line == -1 || self.document.is_none()
    }
}
