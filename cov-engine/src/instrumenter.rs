//! Method Instrumenter (C5): splices counter-increment preludes into
//! eligible method bodies (spec.md §4.5).

use std::collections::HashMap;

use cov_metadata::{FieldId, MethodBody, MethodId, OpCode, Operand};
use cov_symbols::{BranchPoint, SequencePoint};
use tracing::debug;

use crate::filter::Filter;
use crate::hitmap::HitMapBuilder;

/// The five-instruction counter-increment sequence spliced before
/// every sequence-point head and every branch-point target.
fn prelude(hits_array_field: FieldId, hit_index: u32, atomic_increment: MethodId) -> Vec<(OpCode, Operand)> {
    vec![
        (OpCode::LdSFld, Operand::Field(hits_array_field)),
        (OpCode::LdcI4, Operand::I32(hit_index as i32)),
        (OpCode::LdElemA, Operand::None),
        (OpCode::Call, Operand::Method(atomic_increment)),
        (OpCode::Pop, Operand::None),
    ]
}

/// Splices preludes into `body` for every non-hidden, non-excluded
/// sequence point and every non-skipped, non-excluded branch point,
/// registering each with `hitmap`. Returns the number of preludes spliced.
///
/// `body` must already belong to an eligible method (the caller is
/// expected to have checked `Filter::is_method_instrumented`); this
/// function does not re-check eligibility, only per-document exclusion,
/// since that is evaluated per sequence/branch point rather than per
/// method (spec.md §4.3).
#[allow(clippy::too_many_arguments)]
pub fn instrument_method(
    body: &mut MethodBody,
    sequence_points: &[SequencePoint],
    branch_points: &[BranchPoint],
    filter: &Filter,
    hitmap: &mut HitMapBuilder,
    declaring_type_name: &str,
    method_name: &str,
    hits_array_field: FieldId,
    atomic_increment: MethodId,
) -> u32 {
    body.normalize();
    body.assign_source_offsets();

    let sp_by_offset: HashMap<u32, &SequencePoint> = sequence_points.iter().filter(|sp| !sp.is_hidden).map(|sp| (sp.offset, sp)).collect();

    let mut bp_by_end_offset: HashMap<u32, Vec<&BranchPoint>> = HashMap::new();
    for bp in branch_points {
        if bp.is_skipped() {
            continue;
        }
        bp_by_end_offset.entry(bp.end_offset).or_default().push(bp);
    }

    let mut spliced = 0u32;
    let mut pos = 0usize;
    while pos < body.instructions.len() {
        let instr_id = body.instructions[pos].id;
        let instr_offset = body.instructions[pos].source_offset;

        if let Some(sp) = sp_by_offset.get(&instr_offset) {
            if !filter.is_document_excluded(&sp.document_url) {
                let k = hitmap.add_line_hit(&sp.document_url, declaring_type_name, method_name, sp.start_line, sp.end_line);
                body.splice_before(instr_id, prelude(hits_array_field, k, atomic_increment));
                pos += 5;
                spliced += 1;
            }
        }

        if let Some(branches) = bp_by_end_offset.get(&instr_offset) {
            for bp in branches {
                let document = bp.document.as_deref().expect("is_skipped already excluded missing-document branch points");
                if filter.is_document_excluded(document) {
                    continue;
                }
                let k = hitmap.add_branch_hit(document, declaring_type_name, method_name, bp.offset, bp.end_offset, bp.path.clone(), bp.start_line as u32, bp.ordinal);
                body.splice_before(instr_id, prelude(hits_array_field, k, atomic_increment));
                pos += 5;
                spliced += 1;
            }
        }

        pos += 1;
    }

    body.reoptimize();
    debug!(method = method_name, preludes = spliced, "instrumented method");
    spliced
}

#[cfg(test)]
mod tests {
    use super::*;
    use cov_metadata::{FieldId, Instruction, InstrId, MethodId, OpCode, Operand};

    fn single_instr_body() -> MethodBody {
        MethodBody::new(vec![], vec![Instruction::new(InstrId(0), OpCode::Ret, Operand::None)], vec![])
    }

    #[test]
    fn line_hit_splices_prelude_before_instruction() {
        let mut body = single_instr_body();
        let sp = SequencePoint {
            offset: 0,
            document_url: "a.rs".into(),
            start_line: 10,
            end_line: 10,
            is_hidden: false,
        };
        let filter = Filter::new(&[], &[], &[]).unwrap();
        let mut hitmap = HitMapBuilder::new();

        let spliced = instrument_method(&mut body, &[sp], &[], &filter, &mut hitmap, "App.Widget", "DoWork", FieldId(0), MethodId(1));

        assert_eq!(spliced, 1);
        assert_eq!(body.instructions.len(), 6);
        assert!(matches!(body.instructions[4].opcode, OpCode::Pop));
        assert!(matches!(body.instructions[5].opcode, OpCode::Ret));
    }

    #[test]
    fn excluded_document_yields_no_prelude() {
        let mut body = single_instr_body();
        let sp = SequencePoint {
            offset: 0,
            document_url: "a.rs".into(),
            start_line: 10,
            end_line: 10,
            is_hidden: false,
        };
        let filter = Filter::new(&[], &[], &["a.rs".to_string()]).unwrap();
        let mut hitmap = HitMapBuilder::new();

        let spliced = instrument_method(&mut body, &[sp], &[], &filter, &mut hitmap, "App.Widget", "DoWork", FieldId(0), MethodId(1));

        assert_eq!(spliced, 0);
        assert_eq!(body.instructions.len(), 1);
    }

    #[test]
    fn skipped_branch_point_yields_no_prelude() {
        let mut body = single_instr_body();
        let bp = BranchPoint {
            document: Some("a.rs".into()),
            offset: 0,
            end_offset: 0,
            start_line: -1,
            path: vec![],
            ordinal: 0,
        };
        let filter = Filter::new(&[], &[], &[]).unwrap();
        let mut hitmap = HitMapBuilder::new();

        let spliced = instrument_method(&mut body, &[], &[bp], &filter, &mut hitmap, "App.Widget", "DoWork", FieldId(0), MethodId(1));

        assert_eq!(spliced, 0);
    }
}
