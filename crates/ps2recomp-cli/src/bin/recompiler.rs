//! `recompiler <config.toml>` (§6 "CLI"): reads the analyzer's TOML,
//! re-runs analysis against it (so hand-edited `stubs`/`skip`/`patches`
//! take effect), and emits one Rust source file per guest function plus
//! `register_functions.rs` under `[general].output`.

use anyhow::{Context, Result};
use clap::Parser;
use ps2recomp_config::RecompilerConfig;
use ps2recomp_elf::ElfFile;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recompiler", about = "Emit recompiled host source from a recompiler config")]
struct Args {
    config_toml: PathBuf,
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = RecompilerConfig::load(&args.config_toml)
        .with_context(|| format!("loading {}", args.config_toml.display()))?;

    let elf_bytes = std::fs::read(&config.general.input)
        .with_context(|| format!("reading {}", config.general.input))?;
    let elf = ElfFile::parse(&elf_bytes).context("parsing ELF")?;

    let ghidra_symbols = match &config.general.ghidra_output {
        Some(path) => ps2recomp_config::import_ghidra_csv(path).with_context(|| format!("reading {path}"))?,
        None => Vec::new(),
    };
    let external_functions = match &config.general.functions_file {
        Some(path) => {
            ps2recomp_config::load_external_functions(path).with_context(|| format!("reading {path}"))?
        }
        None => Vec::new(),
    };

    let result = ps2recomp_analyzer::analyze(&elf, &config, &ghidra_symbols, &external_functions)
        .context("analyzing ELF")?;

    std::fs::create_dir_all(&config.general.output)
        .with_context(|| format!("creating output dir {}", config.general.output))?;

    if config.general.single_file_output {
        let mut combined = String::new();
        for f in &result.functions {
            let cfg = &result.cfgs[&f.start];
            combined.push_str(&ps2recomp_codegen::generate_function(f, cfg));
            combined.push('\n');
        }
        std::fs::write(
            PathBuf::from(&config.general.output).join("recomp_all.rs"),
            combined,
        )?;
    } else {
        for (name, source) in ps2recomp_codegen::partition_by_band(&result, 20) {
            std::fs::write(PathBuf::from(&config.general.output).join(format!("{name}.rs")), source)?;
        }
    }

    let register_src = ps2recomp_codegen::generate_register_functions(&result);
    std::fs::write(
        PathBuf::from(&config.general.output).join("register_functions.rs"),
        register_src,
    )?;

    tracing::info!(
        functions = result.functions.len(),
        output = config.general.output,
        "recompilation complete"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run() {
        eprintln!("recompiler: {err:#}");
        std::process::exit(1);
    }
}
