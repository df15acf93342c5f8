//! The runtime tracker template (C4's input), expressed as
//! pre-processed data keyed by a small enum of reference roles rather
//! than as a clonable `cov_metadata::Module`.
//!
//! spec.md §9 flags two ways to tell a template-internal reference
//! from an external one: reflect on the cloned IL at injection time, or
//! bake the distinction into the template data up front. This crate
//! takes the second option ("it makes the rewrite total and eliminates
//! the failure mode where a new template method silently introduces an
//! un-rewritten reference") — every operand in the template is one of
//! `FieldRole`, `MethodRole`, or `ExternalRef`, so `injector::inject`
//! never has to guess.

/// The reserved namespace the cloned tracker type lives under. Also
/// used by the filter (spec.md §4.3(ii)) to exclude the tracker itself
/// from instrumentation.
pub const TRACKER_NAMESPACE: &str = "__CoverageTracker";

/// The template type's own name before cloning (the clone is renamed
/// to `<module_basename>_<identifier>`).
pub const TRACKER_TYPE_NAME: &str = "Tracker";

/// The two fields pinned by name on the cloned tracker type (spec.md §4.4).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum FieldRole {
    HitsArray,
    HitsFilePath,
}

impl FieldRole {
    pub fn field_name(self) -> &'static str {
        match self {
            FieldRole::HitsArray => "HitsArray",
            FieldRole::HitsFilePath => "HitsFilePath",
        }
    }
}

/// Methods defined on the template type.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum MethodRole {
    /// The static constructor; C4 splices the hits-array allocation
    /// into it after every method in the target module has been
    /// instrumented (spec.md §4.4).
    StaticConstructor,
    /// `RecordHit(k)` — the hot path called from every spliced prelude.
    RecordHit,
    /// Invoked on process-exit / isolation-domain unload.
    UnloadModule,
    /// Private helper `UnloadModule` calls; kept as a separate template
    /// method to exercise the intra-template method-redirect rule.
    MergeAndPersist,
}

impl MethodRole {
    pub fn method_name(self) -> &'static str {
        match self {
            MethodRole::StaticConstructor => ".cctor",
            MethodRole::RecordHit => "RecordHit",
            MethodRole::UnloadModule => "UnloadModule",
            MethodRole::MergeAndPersist => "MergeAndPersist",
        }
    }
}

/// A reference to something the template needs but does not itself
/// define — imported into the target module on first use and cached
/// (spec.md §4.5 describes the same caching discipline for
/// `atomic_increment_i32_by_ref`, reused here for consistency).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ExternalRef {
    /// The platform string type, used for `HitsFilePath`.
    StringType,
    /// A one-dimensional 32-bit signed integer array type, used for `HitsArray`.
    Int32ArrayType,
    /// The platform's atomic 32-bit increment of an integer location by reference.
    AtomicIncrementI32ByRef,
}

impl ExternalRef {
    pub fn type_name(self) -> &'static str {
        match self {
            ExternalRef::StringType => "String",
            ExternalRef::Int32ArrayType => "Int32[]",
            ExternalRef::AtomicIncrementI32ByRef => "Interlocked",
        }
    }

    pub fn method_name(self) -> Option<&'static str> {
        match self {
            ExternalRef::AtomicIncrementI32ByRef => Some("Increment"),
            _ => None,
        }
    }
}

/// An operand in a template instruction. Unlike
/// `cov_metadata::Operand`, every reference is tagged with its role
/// rather than a raw id — the injector resolves roles into concrete
/// ids in the target module.
#[derive(Clone, Debug)]
pub enum TemplateOperand {
    None,
    Field(FieldRole),
    Method(MethodRole),
    ExternalMethod(ExternalRef),
}

/// One instruction in a template method body. Mirrors
/// `cov_metadata::OpCode`'s shape directly; the role carried by the
/// accompanying `TemplateOperand` is what the injector actually
/// resolves. Template bodies never contain branches: every template
/// method here is straight-line code, so there is no need to model
/// template-local instruction ids.
#[derive(Clone, Debug)]
pub enum TemplateOp {
    Pop,
    Ret,
    LdArg(u16),
    LdSFld,
    LdElemA,
    Call,
}

#[derive(Clone, Debug)]
pub struct TemplateInstruction {
    pub op: TemplateOp,
    pub operand: TemplateOperand,
}

fn instr(op: TemplateOp, operand: TemplateOperand) -> TemplateInstruction {
    TemplateInstruction { op, operand }
}

/// One field declared on the template type.
pub struct TemplateField {
    pub role: FieldRole,
    pub type_ref: ExternalRef,
}

/// One method declared on the template type.
pub struct TemplateMethod {
    pub role: MethodRole,
    pub is_static_constructor: bool,
    pub instructions: Vec<TemplateInstruction>,
}

/// The whole template: fields plus methods. Built fresh on every call
/// — it is pure data, cheap to construct, and never mutated in place.
pub struct Template {
    pub fields: Vec<TemplateField>,
    pub methods: Vec<TemplateMethod>,
}

pub fn build_template() -> Template {
    Template {
        fields: vec![
            TemplateField {
                role: FieldRole::HitsArray,
                type_ref: ExternalRef::Int32ArrayType,
            },
            TemplateField {
                role: FieldRole::HitsFilePath,
                type_ref: ExternalRef::StringType,
            },
        ],
        methods: vec![
            TemplateMethod {
                role: MethodRole::StaticConstructor,
                is_static_constructor: true,
                // C4 splices the allocation sequence in before this Ret
                // once the final hit count is known.
                instructions: vec![instr(TemplateOp::Ret, TemplateOperand::None)],
            },
            TemplateMethod {
                role: MethodRole::RecordHit,
                is_static_constructor: false,
                instructions: vec![
                    instr(TemplateOp::LdSFld, TemplateOperand::Field(FieldRole::HitsArray)),
                    instr(TemplateOp::LdArg(0), TemplateOperand::None),
                    instr(TemplateOp::LdElemA, TemplateOperand::None),
                    instr(TemplateOp::Call, TemplateOperand::ExternalMethod(ExternalRef::AtomicIncrementI32ByRef)),
                    instr(TemplateOp::Pop, TemplateOperand::None),
                    instr(TemplateOp::Ret, TemplateOperand::None),
                ],
            },
            TemplateMethod {
                role: MethodRole::UnloadModule,
                is_static_constructor: false,
                instructions: vec![
                    instr(TemplateOp::Call, TemplateOperand::Method(MethodRole::MergeAndPersist)),
                    instr(TemplateOp::Ret, TemplateOperand::None),
                ],
            },
            TemplateMethod {
                role: MethodRole::MergeAndPersist,
                is_static_constructor: false,
                instructions: vec![
                    instr(TemplateOp::LdSFld, TemplateOperand::Field(FieldRole::HitsFilePath)),
                    instr(TemplateOp::Pop, TemplateOperand::None),
                    instr(TemplateOp::Ret, TemplateOperand::None),
                ],
            },
        ],
    }
}
