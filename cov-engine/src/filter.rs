//! Filter (C3): decides whether a type, method, or source document is
//! subject to instrumentation (spec.md §4.3).

use cov_metadata::{Module, TypeId};
use glob::Pattern;
use regex::Regex;
use std::sync::OnceLock;

use crate::template::TRACKER_NAMESPACE;

/// Attribute names (simple or qualified) that opt a type or method out
/// of instrumentation. Matched against the tail component only, so
/// both `ExcludeFromCoverage` and `My.Namespace.ExcludeFromCoverage`
/// are recognized.
const OPT_OUT_ATTRIBUTES: &[&str] = &[
    "ExcludeFromCoverageAttribute",
    "ExcludeFromCoverage",
    "ExcludeFromCodeCoverageAttribute",
    "ExcludeFromCodeCoverage",
];

fn has_opt_out_attribute(attributes: &[String]) -> bool {
    attributes.iter().any(|attr| {
        let tail = attr.rsplit(['.', '/']).next().unwrap_or(attr);
        OPT_OUT_ATTRIBUTES.contains(&tail)
    })
}

/// Matches compiler-generated local function names of the shape
/// `<Outer>g__Inner|0_0`. Brittle across compiler versions by nature
/// (spec.md §9 flags this explicitly); treated as best effort.
fn local_function_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^<(?P<outer>[^>]+)>g__[^|]+\|").expect("local function pattern is a valid regex"))
}

/// If `method_name` looks like a compiler-generated local function,
/// returns the name of the method it was lifted from.
pub fn enclosing_method_name(method_name: &str) -> Option<&str> {
    let caps = local_function_pattern().captures(method_name)?;
    Some(caps.name("outer").unwrap().as_str())
}

/// Normalizes a document path for comparison/interning: separators are
/// unified to `/` so the same file referenced with `\` and `/` maps to
/// one document (supplemented feature, SPEC_FULL.md §2 — left
/// ambiguous by spec.md §3).
pub fn normalize_document_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Include/exclude glob filters plus the excluded-document list.
pub struct Filter {
    exclude: Vec<Pattern>,
    include: Vec<Pattern>,
    excluded_files: Vec<String>,
}

impl Filter {
    pub fn new(exclude_filters: &[String], include_filters: &[String], excluded_files: &[String]) -> anyhow::Result<Self> {
        let exclude = exclude_filters.iter().map(|p| Pattern::new(p)).collect::<Result<_, _>>()?;
        let include = include_filters.iter().map(|p| Pattern::new(p)).collect::<Result<_, _>>()?;
        let excluded_files = excluded_files.iter().map(|p| normalize_document_path(p)).collect();
        Ok(Self { exclude, include, excluded_files })
    }

    /// Whether `type_id` is instrumented, per spec.md §4.3: evaluated
    /// against the *outermost* declaring type regardless of which type
    /// the caller actually asked about.
    pub fn is_type_instrumented(&self, module: &Module, type_id: TypeId) -> bool {
        let outer_id = module.outermost_declaring_type(type_id);
        let outer = module.type_ref(outer_id);

        if has_opt_out_attribute(&outer.attributes) {
            return false;
        }
        if outer.namespace == TRACKER_NAMESPACE {
            return false;
        }
        let full_name = outer.full_name();
        if self.exclude.iter().any(|p| p.matches(&full_name)) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(&full_name)) {
            return false;
        }
        true
    }

    /// Whether `method_id` is instrumented: its type must be
    /// instrumented, and neither the method itself nor — for local
    /// functions — the method it was lifted from may carry an opt-out
    /// attribute.
    pub fn is_method_instrumented(&self, module: &Module, method_id: cov_metadata::MethodId) -> bool {
        let method = module.method_ref(method_id);
        if !self.is_type_instrumented(module, method.declaring_type) {
            return false;
        }
        if has_opt_out_attribute(&method.attributes) {
            return false;
        }
        if let Some(enclosing_name) = enclosing_method_name(&method.name) {
            let declaring = module.type_ref(method.declaring_type);
            let enclosing = declaring
                .methods
                .iter()
                .map(|&id| module.method_ref(id))
                .find(|m| m.name == enclosing_name);
            if let Some(enclosing) = enclosing {
                if has_opt_out_attribute(&enclosing.attributes) {
                    return false;
                }
            }
        }
        true
    }

    /// Whether a sequence point referencing `document_path` is skipped
    /// because the document is in the excluded-files list.
    pub fn is_document_excluded(&self, document_path: &str) -> bool {
        let normalized = normalize_document_path(document_path);
        self.excluded_files.iter().any(|f| f == &normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_local_function_names() {
        assert_eq!(enclosing_method_name("<DoWork>g__Helper|0_0"), Some("DoWork"));
        assert_eq!(enclosing_method_name("DoWork"), None);
    }

    #[test]
    fn opt_out_matches_simple_and_qualified_names() {
        assert!(has_opt_out_attribute(&["ExcludeFromCoverage".to_string()]));
        assert!(has_opt_out_attribute(&["My.Ns.ExcludeFromCodeCoverageAttribute".to_string()]));
        assert!(!has_opt_out_attribute(&["Serializable".to_string()]));
    }

    #[test]
    fn normalizes_separators() {
        assert_eq!(normalize_document_path(r"src\app\widget.rs"), "src/app/widget.rs");
    }
}
