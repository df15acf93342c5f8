//! Method bodies: instruction streams and exception handler ranges.

use crate::ids::{InstrId, TypeId};
use crate::instr::{Instruction, OpCode, Operand};

/// One exception handler range. All five boundaries point at
/// instructions within the same body.
///
/// `filter_end` is not present in every metadata format this shape is
/// modeled on, but when a host format exposes it, the repoint pass in
/// `cov-engine`'s instrumenter updates it exactly like the other four
/// boundaries (spec.md §9 flags this as an open question; this crate
/// resolves it by always carrying the field).
#[derive(Clone, Debug)]
pub struct ExceptionHandler {
    pub try_start: InstrId,
    pub try_end: InstrId,
    pub handler_start: InstrId,
    pub handler_end: InstrId,
    pub filter_start: Option<InstrId>,
    pub filter_end: Option<InstrId>,
}

impl ExceptionHandler {
    /// Every boundary field, mutably, keyed by nothing in particular —
    /// callers compare each against the id they're repointing.
    pub fn boundaries_mut(&mut self) -> Vec<&mut InstrId> {
        let mut v = vec![
            &mut self.try_start,
            &mut self.try_end,
            &mut self.handler_start,
            &mut self.handler_end,
        ];
        if let Some(f) = self.filter_start.as_mut() {
            v.push(f);
        }
        if let Some(f) = self.filter_end.as_mut() {
            v.push(f);
        }
        v
    }
}

/// A local variable slot.
#[derive(Clone, Debug)]
pub struct Local {
    pub type_ref: TypeId,
}

/// A method's code: instructions, locals, and exception handlers.
///
/// Bodies that could not be parsed (e.g. the method is native, or the
/// code stream uses an encoding this engine does not understand) are
/// represented by the *absence* of a `MethodBody` on the owning
/// `MethodDef`, per spec.md §7 ("Method body unreadable" / "Native
/// method" are both silently skipped).
#[derive(Clone, Debug, Default)]
pub struct MethodBody {
    pub locals: Vec<Local>,
    pub instructions: Vec<Instruction>,
    pub exception_handlers: Vec<ExceptionHandler>,
    next_id: u64,
}

impl MethodBody {
    pub fn new(locals: Vec<Local>, instructions: Vec<Instruction>, exception_handlers: Vec<ExceptionHandler>) -> Self {
        let next_id = instructions.iter().map(|i| i.id.0).max().map(|m| m + 1).unwrap_or(0);
        Self {
            locals,
            instructions,
            exception_handlers,
            next_id,
        }
    }

    fn fresh_id(&mut self) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Finds the current position of an instruction id in the body.
    pub fn position_of(&self, id: InstrId) -> Option<usize> {
        self.instructions.iter().position(|i| i.id == id)
    }

    /// Rewrites every operand and exception-handler boundary that
    /// referred to `from` so that it refers to `to` instead.
    ///
    /// This is the repoint step required by spec.md §4.5: all control
    /// transfers that *entered* the original instruction must enter the
    /// replacement (typically the head of a just-spliced prelude).
    pub fn retarget(&mut self, from: InstrId, to: InstrId) {
        for instr in self.instructions.iter_mut() {
            for r in instr.operand.instr_refs_mut() {
                if *r == from {
                    *r = to;
                }
            }
        }
        for eh in self.exception_handlers.iter_mut() {
            for b in eh.boundaries_mut() {
                if *b == from {
                    *b = to;
                }
            }
        }
    }

    /// Inserts `new_instructions` immediately before the instruction
    /// currently identified by `before`, and retargets every reference
    /// to `before` to the first inserted instruction.
    ///
    /// Returns the id of the first inserted instruction (the new
    /// prelude head), matching the `T` returned by `AddLineHit`/
    /// `AddBranchHit` in spec.md §4.5.
    pub fn splice_before(&mut self, before: InstrId, new_instructions: Vec<(OpCode, Operand)>) -> InstrId {
        assert!(!new_instructions.is_empty());
        let pos = self
            .position_of(before)
            .expect("splice_before target must exist in this body");

        let mut ids = Vec::with_capacity(new_instructions.len());
        let mut built = Vec::with_capacity(new_instructions.len());
        for (opcode, operand) in new_instructions {
            let id = self.fresh_id();
            ids.push(id);
            built.push(Instruction::new(id, opcode, operand));
        }

        let head = ids[0];
        self.retarget(before, head);
        for (offset, instr) in built.into_iter().enumerate() {
            self.instructions.insert(pos + offset, instr);
        }
        head
    }

    /// Snapshots each instruction's byte offset into `Instruction::source_offset`.
    ///
    /// Called once, right after `normalize`, before any splicing. The
    /// external symbol analyser (`cov-symbols`) is expected to report
    /// sequence points and branch points in terms of these offsets.
    pub fn assign_source_offsets(&mut self) {
        let mut offset = 0u32;
        for instr in self.instructions.iter_mut() {
            instr.source_offset = offset;
            offset += instr.encoded_size();
        }
    }

    /// Computes the final byte offset of every instruction, in current
    /// order, for use by the writer when it resolves `Operand::Instr`/
    /// `Operand::InstrList` targets into on-disk displacements.
    pub fn final_offsets(&self) -> std::collections::HashMap<InstrId, u32> {
        let mut offset = 0u32;
        let mut map = std::collections::HashMap::with_capacity(self.instructions.len());
        for instr in &self.instructions {
            map.insert(instr.id, offset);
            offset += instr.encoded_size();
        }
        map
    }

    /// Normalizes every short-form branch to its long-form equivalent.
    ///
    /// Splicing preludes can push a branch target further away than a
    /// short-form (8-bit) displacement can reach; normalizing first
    /// means a splice can never silently produce an invalid encoding
    /// (spec.md §4.5).
    pub fn normalize(&mut self) {
        for instr in self.instructions.iter_mut() {
            if let OpCode::ShortForm(inner) = &instr.opcode {
                instr.opcode = (**inner).clone();
            }
        }
    }

    /// Converts long-form branches back to short form wherever the
    /// target is still within 8-bit displacement range after
    /// instrumentation. This is a code-size optimization only — it has
    /// no effect on the hit map or any invariant in spec.md §8, since
    /// operand identity (the target `InstrId`) is unchanged by the
    /// encoding used to represent it on disk.
    pub fn reoptimize(&mut self) {
        const SHORT_FORM_RANGE: i64 = 127;
        let position: std::collections::HashMap<InstrId, usize> = self
            .instructions
            .iter()
            .enumerate()
            .map(|(pos, i)| (i.id, pos))
            .collect();

        for pos in 0..self.instructions.len() {
            let target = match &self.instructions[pos].operand {
                Operand::Instr(id) => *id,
                _ => continue,
            };
            let Some(&target_pos) = position.get(&target) else {
                continue;
            };
            let displacement = target_pos as i64 - pos as i64;
            if displacement.abs() > SHORT_FORM_RANGE {
                continue;
            }
            let instr = &mut self.instructions[pos];
            match &instr.opcode {
                OpCode::Br | OpCode::BrCond { .. } | OpCode::BrCompare(_) => {
                    instr.opcode = OpCode::ShortForm(Box::new(instr.opcode.clone()));
                }
                _ => {}
            }
        }
    }
}
