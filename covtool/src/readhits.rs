use std::path::PathBuf;

use anyhow::{bail, Result};

#[derive(clap::Args)]
pub struct ReadHitsOptions {
    /// Path to a binary hit file written by the runtime tracker.
    path: PathBuf,
}

pub fn command(opts: ReadHitsOptions) -> Result<()> {
    match cov_runtime::hitfile::read(&opts.path)? {
        Some(counts) => {
            println!("{} counters:", counts.len());
            for (index, count) in counts.iter().enumerate() {
                println!("  [{index}] {count}");
            }
        }
        None => bail!("{} is absent or unreadable", opts.path.display()),
    }
    Ok(())
}
