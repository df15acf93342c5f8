//! The metadata graph for an instrumentable module: types, methods,
//! fields, instruction streams, and exception handlers, plus the
//! binary reader/writer and file-level loader that back them.
//!
//! This crate is the Module Loader (C1) of the instrumentation engine:
//! it owns the data model described in spec.md §3, and the read/write
//! halves of spec.md §4.1. It knows nothing about coverage, filters, or
//! the runtime tracker — those live in `cov-engine` and `cov-runtime`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

pub mod body;
mod cursor;
pub mod error;
pub mod format;
pub mod ids;
pub mod instr;
pub mod loader;
pub mod module;
mod reader;
mod writer;

pub use body::{ExceptionHandler, Local, MethodBody};
pub use error::MetadataError;
pub use ids::{FieldId, InstrId, MethodId, TypeId};
pub use instr::{Compare, Instruction, OpCode, Operand};
pub use loader::{can_instrument, find_existing_sidecar, sidecar_path, LoadedModule};
pub use module::{FieldDef, MethodDef, Module, TypeDef};
pub use reader::parse_module;
pub use writer::write_module;

#[cfg(test)]
#[static_init::dynamic]
static INIT_LOGGER: () = {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .compact()
        .without_time()
        .try_init();
};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_module() -> Module {
        let mut module = Module {
            name: "Sample".into(),
            ..Default::default()
        };
        let ty = module.add_type(TypeDef {
            namespace: "App".into(),
            name: "Widget".into(),
            declaring_type: None,
            attributes: vec![],
            methods: vec![],
            fields: vec![],
        });

        let ret = Instruction::new(InstrId(0), OpCode::Ret, Operand::None);
        let body = MethodBody::new(vec![], vec![ret], vec![]);

        module.add_method(MethodDef {
            name: "DoWork".into(),
            declaring_type: ty,
            attributes: vec![],
            is_native: false,
            is_static_constructor: false,
            return_type: None,
            body: Some(body),
        });

        module
    }

    #[test]
    fn round_trips_through_binary_format() {
        let module = sample_module();
        let bytes = write_module(&module);
        let parsed = parse_module(&bytes).expect("parses");

        assert_eq!(parsed.name, "Sample");
        assert_eq!(parsed.types.len(), 1);
        assert_eq!(parsed.methods.len(), 1);
        assert_eq!(parsed.methods[0].name, "DoWork");
        assert_eq!(parsed.methods[0].body.as_ref().unwrap().instructions.len(), 1);
    }

    #[test]
    fn splice_before_retargets_references() {
        let mut module = sample_module();
        let ret_id = InstrId(0);

        let body = module.methods[0].body.as_mut().unwrap();
        // A branch that targets the ret instruction.
        let br = Instruction::new(InstrId(1), OpCode::Br, Operand::Instr(ret_id));
        body.instructions.insert(0, br);

        let head = body.splice_before(
            ret_id,
            vec![(OpCode::Nop, Operand::None), (OpCode::Nop, Operand::None)],
        );

        // The branch that used to target `ret` now targets the prelude head.
        match &body.instructions[0].operand {
            Operand::Instr(target) => assert_eq!(*target, head),
            other => panic!("expected Instr operand, got {other:?}"),
        }
        assert_eq!(body.instructions.len(), 4);
    }

    #[test]
    fn can_instrument_requires_sidecar_and_a_parseable_header() {
        let dir = std::env::temp_dir().join(format!("cov-metadata-test-{}", InstrId(rand_seed()).0));
        std::fs::create_dir_all(&dir).unwrap();
        let module_path = dir.join("app.module");
        let sidecar = sidecar_path(&module_path);

        std::fs::write(&module_path, write_module(&Module::default())).unwrap();
        assert!(!can_instrument(&module_path), "no sidecar yet");

        std::fs::write(&sidecar, b"sidecar").unwrap();
        assert!(can_instrument(&module_path), "sidecar present, header parses");

        std::fs::write(&module_path, b"not a real module, just needs to exist").unwrap();
        assert!(!can_instrument(&module_path), "sidecar present, header does not parse");

        let _ = std::fs::remove_dir_all(&dir);
    }

    fn rand_seed() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().subsec_nanos() as u64
    }
}
