#![forbid(unused_must_use)]

use std::path::PathBuf;

use clap::Parser;

mod hexdump;
mod instrument;
mod readhits;

#[derive(clap::Parser)]
struct CommandWithFlags {
    /// Reduce logging to just warnings and errors.
    #[arg(long)]
    quiet: bool,

    /// Turn on debug output.
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Instruments a module file in place and prints the resulting hit map summary.
    Instrument(instrument::InstrumentOptions),
    /// Reads a binary hit file and prints its counters.
    ReadHits(readhits::ReadHitsOptions),
    /// Dumps part of any file as a hex dump.
    Hexdump(hexdump::HexdumpOptions),
}

fn main() -> anyhow::Result<()> {
    let command_with_flags = CommandWithFlags::parse();
    configure_tracing(&command_with_flags);

    match command_with_flags.command {
        Command::Instrument(args) => instrument::command(args)?,
        Command::ReadHits(args) => readhits::command(args)?,
        Command::Hexdump(args) => hexdump::command(args)?,
    }

    Ok(())
}

fn configure_tracing(args: &CommandWithFlags) {
    use tracing_subscriber::filter::LevelFilter;

    let max_level = if args.quiet {
        LevelFilter::WARN
    } else if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt().with_max_level(max_level).without_time().init();
}

pub(crate) fn read_file(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))
}
