//! The instrumentation engine: Filter (C3), Tracker Injector (C4),
//! Method Instrumenter (C5), Hit Map Builder (C6), and the public
//! `Instrumenter` API (spec.md §4.3–§4.6, §6).
//!
//! C1 (Module Loader) and C2 (Symbol Bridge) live in `cov-metadata` and
//! `cov-symbols` respectively; this crate composes them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

pub mod error;
pub mod filter;
mod hitmap;
mod imports;
mod injector;
mod instrument;
mod instrumenter;
pub mod result;
pub mod template;

pub use error::EngineError;
pub use filter::Filter;
pub use instrument::Instrumenter;
pub use result::{Branch, Document, HitEntry, InstrumenterResult, Line};

#[cfg(test)]
#[static_init::dynamic]
static INIT_LOGGER: () = {
    let _ = tracing_subscriber::fmt().with_test_writer().without_time().try_init();
};

#[cfg(test)]
mod tests {
    use super::*;
    use cov_metadata::{Instruction, InstrId, MethodBody, MethodDef, Module, OpCode, Operand, TypeDef};
    use cov_symbols::{BranchPoint, SequencePoint, SidecarBuilder};

    fn write_module_with_sidecar(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
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
        // S1: one method with two source lines, no branches.
        let instructions = vec![
            Instruction::new(InstrId(0), OpCode::Nop, Operand::None),
            Instruction::new(InstrId(1), OpCode::Ret, Operand::None),
        ];
        let body = MethodBody::new(vec![], instructions, vec![]);
        module.add_method(MethodDef {
            name: "DoWork".into(),
            declaring_type: ty,
            attributes: vec![],
            is_native: false,
            is_static_constructor: false,
            return_type: None,
            body: Some(body),
        });
        let module_path = dir.join("sample.module");
        std::fs::write(&module_path, cov_metadata::write_module(&module)).unwrap();

        let mut sidecar = SidecarBuilder::new();
        sidecar.add_method(
            cov_symbols::MethodKey::new("App.Widget", "DoWork"),
            vec![
                SequencePoint {
                    offset: 0,
                    document_url: "widget.rs".into(),
                    start_line: 10,
                    end_line: 10,
                    is_hidden: false,
                },
                SequencePoint {
                    offset: 1,
                    document_url: "widget.rs".into(),
                    start_line: 11,
                    end_line: 11,
                    is_hidden: false,
                },
            ],
            Vec::<BranchPoint>::new(),
        );
        let sidecar_path = cov_metadata::sidecar_path(&module_path);
        sidecar.write_to(&sidecar_path).unwrap();

        (module_path, sidecar_path)
    }

    #[test]
    fn s1_two_lines_no_branches_produces_two_line_hits() {
        let dir = std::env::temp_dir().join(format!("cov-engine-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (module_path, _sidecar) = write_module_with_sidecar(&dir);

        let instrumenter = Instrumenter::new(&module_path, "run1", &[], &[], &[]).unwrap();
        assert!(instrumenter.can_instrument());

        let result = instrumenter.instrument().unwrap();
        assert_eq!(result.hit_entries.len(), 2);
        assert!(matches!(result.hit_entries[0], HitEntry::Line { doc_index: 0, start_line: 10, end_line: 10 }));
        assert!(matches!(result.hit_entries[1], HitEntry::Line { doc_index: 0, start_line: 11, end_line: 11 }));
        assert!(result.hits_file_path.ends_with("sample_run1"));

        let reloaded = cov_metadata::LoadedModule::open(&module_path).unwrap();
        let tracker_type = reloaded
            .module
            .types
            .iter()
            .find(|t| t.namespace == template::TRACKER_NAMESPACE)
            .expect("tracker type was injected");
        assert_eq!(tracker_type.name, "sample_run1");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn s5_two_identifiers_produce_distinct_trackers_and_hit_files() {
        let dir = std::env::temp_dir().join(format!("cov-engine-test-s5-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (module_path, _sidecar) = write_module_with_sidecar(&dir);

        let run_a = Instrumenter::new(&module_path, "a", &[], &[], &[]).unwrap().instrument().unwrap();

        // Re-establish the fixture: `instrument` already rewrote the module in place.
        let (module_path_b, _) = write_module_with_sidecar(&dir);
        let run_b = Instrumenter::new(&module_path_b, "b", &[], &[], &[]).unwrap().instrument().unwrap();

        assert_ne!(run_a.hits_file_path, run_b.hits_file_path);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn s10_empty_module_yields_empty_hit_entries_and_a_tracker() {
        let dir = std::env::temp_dir().join(format!("cov-engine-test-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let module = Module {
            name: "Empty".into(),
            ..Default::default()
        };
        let module_path = dir.join("empty.module");
        std::fs::write(&module_path, cov_metadata::write_module(&module)).unwrap();
        let sidecar_path = cov_metadata::sidecar_path(&module_path);
        std::fs::write(&sidecar_path, SidecarBuilder::new().build()).unwrap();

        let result = Instrumenter::new(&module_path, "run", &[], &[], &[]).unwrap().instrument().unwrap();
        assert!(result.hit_entries.is_empty());

        let reloaded = cov_metadata::LoadedModule::open(&module_path).unwrap();
        assert_eq!(reloaded.module.types.len(), 1);
        assert!(reloaded.module.types[0].namespace == template::TRACKER_NAMESPACE);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn s6_branch_without_source_anchor_is_skipped() {
        let dir = std::env::temp_dir().join(format!("cov-engine-test-s6-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut module = Module {
            name: "Eq".into(),
            ..Default::default()
        };
        let ty = module.add_type(TypeDef {
            namespace: "App".into(),
            name: "Record".into(),
            declaring_type: None,
            attributes: vec![],
            methods: vec![],
            fields: vec![],
        });
        let instructions = vec![Instruction::new(InstrId(0), OpCode::Ret, Operand::None)];
        let body = MethodBody::new(vec![], instructions, vec![]);
        module.add_method(MethodDef {
            name: "Equals".into(),
            declaring_type: ty,
            attributes: vec![],
            is_native: false,
            is_static_constructor: false,
            return_type: None,
            body: Some(body),
        });

        let module_path = dir.join("eq.module");
        std::fs::write(&module_path, cov_metadata::write_module(&module)).unwrap();

        let mut sidecar = SidecarBuilder::new();
        sidecar.add_method(
            cov_symbols::MethodKey::new("App.Record", "Equals"),
            vec![],
            vec![BranchPoint {
                document: Some("record.rs".into()),
                offset: 0,
                end_offset: 0,
                start_line: -1,
                path: vec![],
                ordinal: 0,
            }],
        );
        sidecar.write_to(&cov_metadata::sidecar_path(&module_path)).unwrap();

        let result = Instrumenter::new(&module_path, "run", &[], &[], &[]).unwrap().instrument().unwrap();
        assert!(result.hit_entries.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn s3_opt_out_attribute_excludes_all_methods_of_type() {
        let dir = std::env::temp_dir().join(format!("cov-engine-test-s3-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut module = Module {
            name: "Excl".into(),
            ..Default::default()
        };
        let ty = module.add_type(TypeDef {
            namespace: "App".into(),
            name: "Generated".into(),
            declaring_type: None,
            attributes: vec!["ExcludeFromCodeCoverage".into()],
            methods: vec![],
            fields: vec![],
        });
        let instructions = vec![Instruction::new(InstrId(0), OpCode::Ret, Operand::None)];
        module.add_method(MethodDef {
            name: "DoWork".into(),
            declaring_type: ty,
            attributes: vec![],
            is_native: false,
            is_static_constructor: false,
            return_type: None,
            body: Some(MethodBody::new(vec![], instructions, vec![])),
        });

        let module_path = dir.join("excl.module");
        std::fs::write(&module_path, cov_metadata::write_module(&module)).unwrap();

        let mut sidecar = SidecarBuilder::new();
        sidecar.add_method(
            cov_symbols::MethodKey::new("App.Generated", "DoWork"),
            vec![SequencePoint {
                offset: 0,
                document_url: "generated.rs".into(),
                start_line: 1,
                end_line: 1,
                is_hidden: false,
            }],
            vec![],
        );
        sidecar.write_to(&cov_metadata::sidecar_path(&module_path)).unwrap();

        let result = Instrumenter::new(&module_path, "run", &[], &[], &[]).unwrap().instrument().unwrap();
        assert!(result.hit_entries.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
