//! `analyzer <input.elf> <output.toml>` (§6 "CLI"). Parses the ELF, runs
//! the full analysis pipeline with a default configuration, and writes the
//! resulting TOML — the machine-readable plan `recompiler` consumes next.

use anyhow::{Context, Result};
use clap::Parser;
use ps2recomp_config::RecompilerConfig;
use ps2recomp_elf::ElfFile;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "analyzer", about = "Analyze a PS2 ELF and emit a recompiler config")]
struct Args {
    input_elf: PathBuf,
    output_toml: PathBuf,
}

fn run() -> Result<()> {
    let args = Args::parse();
    let bytes = std::fs::read(&args.input_elf)
        .with_context(|| format!("reading {}", args.input_elf.display()))?;
    let elf = ElfFile::parse(&bytes).context("parsing ELF")?;

    let mut base = RecompilerConfig::default();
    base.general.input = args.input_elf.to_string_lossy().into_owned();
    base.general.output = "out".to_string();

    let result = ps2recomp_analyzer::analyze(&elf, &base, &[], &[]).context("analyzing ELF")?;
    let config = result.to_config(&base);
    config
        .save(&args.output_toml)
        .with_context(|| format!("writing {}", args.output_toml.display()))?;

    tracing::info!(
        functions = result.functions.len(),
        jump_tables = result.jump_tables.len(),
        "analysis complete"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run() {
        eprintln!("analyzer: {err:#}");
        std::process::exit(1);
    }
}
