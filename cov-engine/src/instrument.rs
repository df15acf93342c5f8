//! The public engine API (spec.md §6): `Instrumenter::new`,
//! `can_instrument`, `instrument`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use cov_metadata::{LoadedModule, MethodId, TypeId};
use cov_symbols::{MethodKey, SidecarAnalyser, SymbolAnalyser};
use tracing::info;

use crate::error::EngineError;
use crate::filter::Filter;
use crate::hitmap::HitMapBuilder;
use crate::imports::ImportCache;
use crate::injector;
use crate::instrumenter;
use crate::result::InstrumenterResult;

struct EligibleMethod {
    method_id: MethodId,
    declaring_type_name: String,
    method_name: String,
}

/// Drives one instrumentation run over a single module.
pub struct Instrumenter {
    module_path: PathBuf,
    identifier: String,
    filter: Filter,
}

impl Instrumenter {
    pub fn new(module_path: impl Into<PathBuf>, identifier: impl Into<String>, exclude_filters: &[String], include_filters: &[String], excluded_files: &[String]) -> Result<Self> {
        Ok(Self {
            module_path: module_path.into(),
            identifier: identifier.into(),
            filter: Filter::new(exclude_filters, include_filters, excluded_files)?,
        })
    }

    /// `false` when no symbol sidecar is present next to the module
    /// (spec.md §4.1 hard precondition). Callers must gate `instrument()` on this.
    pub fn can_instrument(&self) -> bool {
        cov_metadata::can_instrument(&self.module_path)
    }

    /// Instruments the module using the sidecar file next to it,
    /// decoded with `cov_symbols::SidecarAnalyser`.
    pub fn instrument(&self) -> Result<InstrumenterResult> {
        let sidecar = cov_metadata::find_existing_sidecar(&self.module_path)
            .ok_or_else(|| EngineError::PreconditionFailed(format!("no symbol sidecar next to {}", self.module_path.display())))?;
        let analyser = SidecarAnalyser::open(&sidecar)?;
        self.instrument_with(&analyser)
    }

    /// Instruments the module using a caller-supplied symbol analyser,
    /// for hosts whose symbol format `cov_symbols::SidecarAnalyser`
    /// does not understand.
    pub fn instrument_with(&self, analyser: &dyn SymbolAnalyser) -> Result<InstrumenterResult> {
        if !self.can_instrument() {
            bail!(EngineError::PreconditionFailed(format!("can_instrument() is false for {}", self.module_path.display())));
        }

        let mut loaded = LoadedModule::open(&self.module_path)?;
        let module_basename = module_basename(&self.module_path);

        let eligible = self.collect_eligible_methods(&loaded);

        let mut imports = ImportCache::new();
        let tracker = injector::inject(&mut loaded.module, &mut imports, &module_basename, &self.identifier);

        let mut hitmap = HitMapBuilder::new();
        for em in &eligible {
            let key = MethodKey::new(em.declaring_type_name.clone(), em.method_name.clone());
            let sequence_points = analyser.sequence_points(&key).map_err(|e| EngineError::BadSymbols(e.to_string()))?;
            let branch_points = analyser.branch_points(&key).map_err(|e| EngineError::BadSymbols(e.to_string()))?;

            // Method body unreadable / native: silently skipped (spec.md §7).
            let Some(body) = loaded.module.method_mut(em.method_id).body.as_mut() else {
                continue;
            };
            instrumenter::instrument_method(
                body,
                &sequence_points,
                &branch_points,
                &self.filter,
                &mut hitmap,
                &em.declaring_type_name,
                &em.method_name,
                tracker.hits_array_field,
                tracker.atomic_increment,
            );
        }

        let (documents, hit_entries) = hitmap.finish();
        let hit_count = hit_entries.len() as u32;

        let hits_file_path = hits_file_path(&self.module_path, &self.identifier);
        injector::finalize_static_constructor(&mut loaded.module, &mut imports, &tracker, hit_count, &hits_file_path.to_string_lossy());

        loaded.flush()?;

        let module_path = std::fs::canonicalize(&self.module_path).unwrap_or_else(|_| self.module_path.clone());
        info!(module = %module_basename, hit_entries = hit_count, "instrumented module");

        Ok(InstrumenterResult {
            module: module_basename,
            module_path: module_path.to_string_lossy().into_owned(),
            hits_file_path: hits_file_path.to_string_lossy().into_owned(),
            documents,
            hit_entries,
        })
    }

    fn collect_eligible_methods(&self, loaded: &LoadedModule) -> Vec<EligibleMethod> {
        let mut eligible = Vec::new();
        for type_id in (0..loaded.module.types.len()).map(TypeId::from) {
            if !self.filter.is_type_instrumented(&loaded.module, type_id) {
                continue;
            }
            let declaring_type_name = loaded.module.type_ref(type_id).full_name();
            for &method_id in &loaded.module.type_ref(type_id).methods {
                if !self.filter.is_method_instrumented(&loaded.module, method_id) {
                    continue;
                }
                let method = loaded.module.method_ref(method_id);
                if method.is_native {
                    continue;
                }
                eligible.push(EligibleMethod {
                    method_id,
                    declaring_type_name: declaring_type_name.clone(),
                    method_name: method.name.clone(),
                });
            }
        }
        eligible
    }
}

fn module_basename(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "module".to_string())
}

/// `<system_temp_dir>/<module_basename>_<identifier>` (spec.md §6).
fn hits_file_path(module_path: &Path, identifier: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}_{identifier}", module_basename(module_path)))
}
