//! Instructions and operands.

use crate::ids::{FieldId, InstrId, MethodId, TypeId};

/// The subset of the managed object format's instruction set this engine cares about.
///
/// Real formats carry several hundred opcodes; instrumentation only
/// needs to recognize the ones that move control (for branch-point
/// splicing and operand repointing), the ones the injected prelude
/// itself emits, and a representative sample of everything else so
/// that method bodies round-trip byte for byte.
#[derive(Clone, Eq, PartialEq, Debug)]
#[non_exhaustive]
pub enum OpCode {
    Nop,
    Dup,
    Pop,
    Ret,
    LdcI4,
    LdStr,
    LdArg(u16),
    LdLoc(u16),
    StLoc(u16),
    LdSFld,
    StSFld,
    LdElemA,
    NewArr,
    Call,
    CallVirt,
    /// Unconditional branch. Long form only; short-form (`br.s`) is
    /// normalized away before instrumentation (see `body::normalize`).
    Br,
    /// `brtrue`/`brfalse`-class: one target, conditional on the top of stack.
    BrCond { branch_if_true: bool },
    /// Relational branch (`beq`, `bne`, `blt`, `ble`, `bgt`, `bge`):
    /// pops two values, compares, branches on the result.
    BrCompare(Compare),
    /// Jump table: pops an index, branches to `targets[index]` or falls
    /// through if the index is out of range.
    Switch,
    /// A short-form encoding of `Br`/`BrCond`/`BrCompare` that only
    /// reaches targets within a signed 8-bit displacement. AltCover-style
    /// tools normalize these to long form before splicing so that an
    /// inserted prelude can never push a target out of encodable range.
    ShortForm(Box<OpCode>),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Compare {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An operand attached to an [`Instruction`].
#[derive(Clone, Debug)]
pub enum Operand {
    None,
    I32(i32),
    String(String),
    Field(FieldId),
    Method(MethodId),
    Type(TypeId),
    /// A reference to another instruction within the same body (branch target).
    Instr(InstrId),
    /// A jump table: one target per case.
    InstrList(Vec<InstrId>),
}

impl Operand {
    /// Every instruction id an operand mentions, mutably, so that
    /// repointing (see `body::retarget`) can rewrite in place.
    pub fn instr_refs_mut(&mut self) -> Vec<&mut InstrId> {
        match self {
            Operand::Instr(id) => vec![id],
            Operand::InstrList(ids) => ids.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

/// One instruction in a method body.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub id: InstrId,
    pub opcode: OpCode,
    pub operand: Operand,
    /// The instruction's byte offset as of the last time
    /// `MethodBody::assign_source_offsets` ran — normally right after
    /// normalization and before any splicing. The symbol bridge's
    /// sequence points and branch points are expressed in terms of this
    /// offset (spec.md §4.2/§4.5); it is a snapshot, not kept live
    /// across splices.
    pub source_offset: u32,
}

impl Instruction {
    pub fn new(id: InstrId, opcode: OpCode, operand: Operand) -> Self {
        Self {
            id,
            opcode,
            operand,
            source_offset: 0,
        }
    }

    /// Whether this instruction transfers control via a branch operand.
    pub fn is_branch(&self) -> bool {
        opcode_is_branch(&self.opcode)
    }

    /// The number of bytes this instruction occupies when encoded: one
    /// opcode byte plus a payload whose size depends on the opcode (and,
    /// for `switch`, on the number of jump table entries).
    pub fn encoded_size(&self) -> u32 {
        let switch_case_count = match &self.operand {
            Operand::InstrList(targets) => targets.len() as u32,
            _ => 0,
        };
        encoded_size_of(&self.opcode, switch_case_count)
    }
}

/// The encoded size of an opcode given its switch-case count (ignored
/// for every opcode but `Switch`). Exposed as a free function so the
/// reader can compute sizes before an operand has been resolved into
/// an `Operand` value.
pub fn encoded_size_of(opcode: &OpCode, switch_case_count: u32) -> u32 {
    let payload = match opcode {
        OpCode::Nop | OpCode::Dup | OpCode::Pop | OpCode::Ret => 0,
        OpCode::LdcI4 | OpCode::LdStr | OpCode::LdSFld | OpCode::StSFld | OpCode::LdElemA | OpCode::NewArr | OpCode::Call | OpCode::CallVirt => 4,
        OpCode::LdArg(_) | OpCode::LdLoc(_) | OpCode::StLoc(_) => 2,
        OpCode::Br => 4,
        OpCode::BrCond { .. } => 5,
        OpCode::BrCompare(_) => 5,
        OpCode::Switch => 4 + 4 * switch_case_count,
        OpCode::ShortForm(_) => 1,
    };
    1 + payload
}

fn opcode_is_branch(op: &OpCode) -> bool {
    match op {
        OpCode::Br | OpCode::BrCond { .. } | OpCode::BrCompare(_) | OpCode::Switch => true,
        OpCode::ShortForm(inner) => opcode_is_branch(inner),
        _ => false,
    }
}
