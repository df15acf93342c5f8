use std::path::PathBuf;

use anyhow::{bail, Result};
use cov_engine::Instrumenter;

#[derive(clap::Args)]
pub struct InstrumentOptions {
    /// Path to the module file to instrument in place.
    module: PathBuf,

    /// Instrumentation identifier; distinguishes parallel runs over the same module.
    #[arg(long, default_value = "covtool")]
    id: String,

    /// Glob excluding types/methods by fully-qualified name. Repeatable.
    #[arg(long = "exclude")]
    exclude_filters: Vec<String>,

    /// Glob re-including types/methods otherwise excluded. Repeatable.
    #[arg(long = "include")]
    include_filters: Vec<String>,

    /// Source document path to exclude from instrumentation. Repeatable.
    #[arg(long = "exclude-file")]
    excluded_files: Vec<String>,
}

pub fn command(opts: InstrumentOptions) -> Result<()> {
    let instrumenter = Instrumenter::new(&opts.module, &opts.id, &opts.exclude_filters, &opts.include_filters, &opts.excluded_files)?;

    if !instrumenter.can_instrument() {
        bail!("{} has no symbol sidecar next to it; nothing to instrument", opts.module.display());
    }

    let result = instrumenter.instrument()?;

    println!("module:          {}", result.module);
    println!("module path:     {}", result.module_path);
    println!("hits file:       {}", result.hits_file_path);
    println!("documents:       {}", result.documents.len());
    println!("hit entries:     {}", result.hit_entries.len());

    for (path, doc) in &result.documents {
        println!("  {path} (index {})  {} lines, {} branches", doc.index, doc.lines.len(), doc.branches.len());
    }

    Ok(())
}
