//! `runtime <elf-path>` (§6 "CLI"): loads the ELF into the embedded memory
//! image and runs until stop. A real build links this binary against the
//! `register_functions.rs` / `recomp_*.rs` a `recompiler` run emitted for
//! that specific title; `register_game_functions` below is the seam a
//! generated build fills in — standalone, it dispatches straight to
//! "unknown function" at the entry point, which is still useful for
//! exercising ELF loading and the kernel/io wiring.

use anyhow::{Context, Result};
use clap::Parser;
use ps2recomp_elf::ElfFile;
use ps2recomp_io::vsync::VsyncWorker;
use ps2recomp_kernel::Kernel;
use ps2recomp_runtime::{GuestMemory, PS2Runtime};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "runtime", about = "Run a recompiled PS2 executable")]
struct Args {
    elf_path: PathBuf,
}

/// The seam a generated `register_functions.rs` fills by calling
/// `ps2recomp_runtime::PS2Runtime::register_function` for every recompiled
/// entry point (§4.4 "register_functions.cpp"). No functions are linked in
/// by default.
fn register_game_functions(_runtime: &PS2Runtime) {}

fn run() -> Result<()> {
    let args = Args::parse();
    let bytes = std::fs::read(&args.elf_path).with_context(|| format!("reading {}", args.elf_path.display()))?;
    let elf = ElfFile::parse(&bytes).context("parsing ELF")?;

    let mut rdram = GuestMemory::new();
    let mut ctx = PS2Runtime::load_elf(&elf, &mut rdram);
    let runtime = PS2Runtime::new();
    register_game_functions(&runtime);

    let kernel = Kernel::new(std::env::current_dir().unwrap_or_default());
    let _ = &kernel; // wired in by generated syscall dispatch in a full build.

    let shared_mem = Arc::new(Mutex::new(rdram));
    let intc = Arc::new(ps2recomp_kernel::intc::IntcTable::new());
    intc.enable(ps2recomp_kernel::intc::INTC_VBLANK_START);
    intc.enable(ps2recomp_kernel::intc::INTC_VBLANK_END);
    let vsync_flag_addr = 0x0000_1000;
    let vsync_tick_addr = 0x0000_1008;
    let _vsync = VsyncWorker::start(shared_mem.clone(), intc, vsync_flag_addr, vsync_tick_addr);

    tracing::info!(entry = format!("{:#010x}", ctx.pc), "starting dispatch loop");
    {
        let mut mem = shared_mem.lock().unwrap();
        if let Err(err) = runtime.run(&mut mem, &mut ctx) {
            tracing::warn!(?err, "dispatch loop exited with a memory error");
        }
    }
    runtime.request_stop();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run() {
        eprintln!("runtime: {err:#}");
        std::process::exit(1);
    }
}
