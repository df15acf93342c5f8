use std::path::PathBuf;

use anyhow::Result;
use dump_utils::HexDump;

#[derive(clap::Args)]
pub struct HexdumpOptions {
    /// File to dump.
    path: PathBuf,

    /// Byte offset to start at.
    #[arg(long, default_value_t = 0)]
    at: usize,

    /// Maximum number of bytes to display.
    #[arg(long)]
    max: Option<usize>,
}

pub fn command(opts: HexdumpOptions) -> Result<()> {
    let bytes = crate::read_file(&opts.path)?;
    let bytes = &bytes[opts.at.min(bytes.len())..];
    let dump = match opts.max {
        Some(max) => HexDump::new(bytes).at(opts.at).header(true).max(max),
        None => HexDump::new(bytes).at(opts.at).header(true),
    };
    println!("{dump}");
    Ok(())
}
