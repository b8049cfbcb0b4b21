//! ibisgen: convert a transistor-level SPICE buffer description into an
//! IBIS behavioral model by driving an external simulator.

mod correlate;
mod orchestrator;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ibisgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (flat keyword or structured form)
    config: PathBuf,

    /// Output directory for the .ibs file, decks, and simulator results
    #[arg(long, default_value = "./out")]
    outdir: PathBuf,

    /// Simulator dialect; overrides the configuration's declaration
    #[arg(long, value_parser = ["hspice", "spectre", "eldo"])]
    spice_type: Option<String>,

    /// Simulator command template with {in} {out} {msg} placeholders
    #[arg(long)]
    spice_cmd: Option<String>,

    /// Reuse existing simulation results that are newer than their decks
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1), default_value_t = 0)]
    iterate: u8,

    /// Delete intermediate decks and logs after successful parsing
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1), default_value_t = 0)]
    cleanup: u8,

    /// Wall-clock limit per simulator run, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to an external IBIS checker to run on the emitted file
    #[arg(long)]
    ibischk: Option<PathBuf>,

    /// Also emit a correlation testbench per characterized pin
    #[arg(long)]
    correlate: bool,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let options = orchestrator::RunOptions {
        config: cli.config,
        outdir: cli.outdir,
        spice_type: cli.spice_type.as_deref().and_then(lib_types::SpiceType::parse),
        spice_cmd: cli.spice_cmd,
        iterate: cli.iterate != 0,
        cleanup: cli.cleanup != 0,
        timeout: cli.timeout.map(std::time::Duration::from_secs),
        ibischk: cli.ibischk,
        correlate: cli.correlate,
    };

    let summary = orchestrator::run(&options)?;
    summary.log();
    Ok(())
}
