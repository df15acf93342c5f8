//! Tracker Injector (C4): clones the runtime tracker template into the
//! target module under a module-unique name (spec.md §4.4).

use std::collections::HashMap;

use cov_metadata::{FieldDef, FieldId, Instruction, InstrId, MethodDef, MethodId, Module, Operand, OpCode, TypeDef, TypeId};

use crate::imports::ImportCache;
use crate::template::{self, FieldRole, MethodRole, TemplateOp, TemplateOperand, TRACKER_NAMESPACE};

/// Handles into the clone that the rest of the engine needs: the
/// fields pinned by name in spec.md §4.4, and the static constructor
/// whose tail C4 finishes once the final hit count is known.
pub struct InjectedTracker {
    pub type_id: TypeId,
    pub hits_array_field: FieldId,
    pub hits_file_path_field: FieldId,
    pub static_constructor: MethodId,
    pub record_hit_method: MethodId,
    pub atomic_increment: MethodId,
}

/// Clones the tracker template into `target`, naming the new type
/// `<module_basename>_<identifier>` under the reserved namespace.
pub fn inject(target: &mut Module, imports: &mut ImportCache, module_basename: &str, identifier: &str) -> InjectedTracker {
    let template = template::build_template();

    let type_id = target.add_type(TypeDef {
        namespace: TRACKER_NAMESPACE.into(),
        name: format!("{module_basename}_{identifier}"),
        declaring_type: None,
        attributes: vec![],
        methods: vec![],
        fields: vec![],
    });

    let mut fields: HashMap<FieldRole, FieldId> = HashMap::new();
    for f in &template.fields {
        let type_ref = imports.resolve_type(target, f.type_ref);
        let id = target.add_field(FieldDef {
            name: f.role.field_name().into(),
            declaring_type: type_id,
            type_ref,
        });
        fields.insert(f.role, id);
    }

    // Method shells first, so that intra-template method references
    // (UnloadModule -> MergeAndPersist) resolve regardless of
    // declaration order in `template::build_template`.
    let mut methods: HashMap<MethodRole, MethodId> = HashMap::new();
    for m in &template.methods {
        let id = target.add_method(MethodDef {
            name: m.role.method_name().into(),
            declaring_type: type_id,
            attributes: vec![],
            is_native: false,
            is_static_constructor: m.is_static_constructor,
            return_type: None,
            body: None,
        });
        methods.insert(m.role, id);
    }

    let mut atomic_increment = None;
    for m in &template.methods {
        let method_id = methods[&m.role];
        let mut instructions = Vec::with_capacity(m.instructions.len());
        for (pos, ti) in m.instructions.iter().enumerate() {
            let opcode = match &ti.op {
                TemplateOp::Pop => OpCode::Pop,
                TemplateOp::Ret => OpCode::Ret,
                TemplateOp::LdArg(n) => OpCode::LdArg(*n),
                TemplateOp::LdSFld => OpCode::LdSFld,
                TemplateOp::LdElemA => OpCode::LdElemA,
                TemplateOp::Call => OpCode::Call,
            };
            let operand = match &ti.operand {
                TemplateOperand::None => Operand::None,
                // Field reference: remapped by name to the clone's own
                // field (spec.md §4.4). We already have the map built
                // above, so this is a direct lookup rather than a
                // string search, but the effect is the same.
                TemplateOperand::Field(role) => Operand::Field(fields[role]),
                // Intra-template method reference: redirected to the clone.
                TemplateOperand::Method(role) => Operand::Method(methods[role]),
                // External method reference: imported into the target module.
                TemplateOperand::ExternalMethod(r) => {
                    let id = imports.resolve_method(target, *r);
                    atomic_increment.get_or_insert(id);
                    Operand::Method(id)
                }
            };
            instructions.push(Instruction::new(InstrId(pos as u64), opcode, operand));
        }
        target.method_mut(method_id).body = Some(cov_metadata::MethodBody::new(vec![], instructions, vec![]));
    }

    InjectedTracker {
        type_id,
        hits_array_field: fields[&FieldRole::HitsArray],
        hits_file_path_field: fields[&FieldRole::HitsFilePath],
        static_constructor: methods[&MethodRole::StaticConstructor],
        record_hit_method: methods[&MethodRole::RecordHit],
        atomic_increment: atomic_increment.expect("RecordHit always references the atomic increment"),
    }
}

/// Finishes the clone's static constructor once every method in the
/// target module has been instrumented and the final hit count `n` is
/// known (spec.md §4.4): splices the five allocation instructions
/// immediately before the constructor's terminating instruction.
pub fn finalize_static_constructor(target: &mut Module, imports: &mut ImportCache, tracker: &InjectedTracker, hit_count: u32, hits_file_path: &str) {
    let int32_array_type = imports.resolve_type(target, template::ExternalRef::Int32ArrayType);
    let body = target
        .method_mut(tracker.static_constructor)
        .body
        .as_mut()
        .expect("the static constructor always has a body");

    let ret_id = body.instructions.last().expect("the static constructor always ends in Ret").id;

    body.splice_before(
        ret_id,
        vec![
            (OpCode::LdcI4, Operand::I32(hit_count as i32)),
            (OpCode::NewArr, Operand::Type(int32_array_type)),
            (OpCode::StSFld, Operand::Field(tracker.hits_array_field)),
            (OpCode::LdStr, Operand::String(hits_file_path.to_string())),
            (OpCode::StSFld, Operand::Field(tracker.hits_file_path_field)),
        ],
    );
}
