//! Runtime dispatch (§4.7): the function table, ELF loading, the main
//! event loop, and exception/fault reporting that the generated code's
//! `runtime.*` calls route through.

use crate::context::R5900Context;
use crate::memory::{GuestMemory, MemoryError};
use ps2recomp_elf::ElfFile;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::warn;

/// One recompiled guest function body, matching what `ps2recomp-codegen`
/// emits for `generate_function` (§4.4).
pub type GuestFn = fn(&mut GuestMemory, &mut R5900Context, &PS2Runtime) -> Result<(), MemoryError>;

/// Exceptions the runtime can signal into a guest thread (§4.7). Only
/// `IntegerOverflow` has a modelled vector; everything else is logged and
/// control returns to the dispatcher, matching the spec's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    IntegerOverflow,
    Breakpoint,
    ReservedInstruction,
    AddressError,
}

const EXCEPTION_VECTOR: u32 = 0x8000_0000;

/// Well-known RDRAM address the `run()` scheduler tick posts to, unsticking
/// games that poll an SDK-provided scheduler semaphore (§4.7, §9 "Open
/// questions": a heuristic, not part of the EE kernel contract).
pub const SCHEDULER_SEMAPHORE_HEURISTIC_ADDR: u32 = 0x0000_0000;

/// Holds memory, CPU context, the function table, and a cooperative stop
/// flag. One `PS2Runtime` is shared (by reference) across every guest
/// thread; the function table is populated once at startup and is
/// read-only thereafter (§5), so lookups only need a reader lock.
pub struct PS2Runtime {
    functions: RwLock<HashMap<u32, GuestFn>>,
    stop_requested: AtomicBool,
}

impl Default for PS2Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl PS2Runtime {
    pub fn new() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Parses the ELF, copies every `PT_LOAD` segment into guest RAM,
    /// registers executable segments as code regions for the
    /// self-modifying-code tracker, and returns a context with `pc` set to
    /// the entry point (§4.7 `load_elf`).
    pub fn load_elf(elf: &ElfFile, rdram: &mut GuestMemory) -> R5900Context {
        for region in elf.code_regions() {
            rdram.register_code_region(region.0, region.1);
        }
        for seg in &elf.segments {
            if let Some(bytes) = elf.read_bytes(seg.vaddr, seg.memsz as usize) {
                rdram.load_segment(seg.vaddr, bytes);
            }
        }
        let mut ctx = R5900Context::new();
        ctx.pc = elf.entry_point;
        ctx
    }

    pub fn register_function(&self, addr: u32, f: GuestFn) {
        self.functions.write().unwrap().insert(addr, f);
    }

    pub fn lookup_function(&self, addr: u32) -> Option<GuestFn> {
        self.functions.read().unwrap().get(&addr).copied()
    }

    pub fn has_function(&self, addr: u32) -> bool {
        self.functions.read().unwrap().contains_key(&addr)
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Sets up the entry ABI (`$a0 = 0`, `$a1 = 0`, `$sp = 0x0200_0000`) and
    /// runs the entry function's dispatch loop until stop is requested
    /// (§4.7 `run`). The display/event loop and scheduler-semaphore tick
    /// are the caller's (`ps2recomp-cli`'s `runtime` binary and
    /// `ps2recomp-io`) responsibility; this drives a single guest thread to
    /// completion or to a stop request.
    pub fn run(&self, rdram: &mut GuestMemory, ctx: &mut R5900Context) -> Result<(), MemoryError> {
        ctx.set_gpr_u32(4, 0);
        ctx.set_gpr_u32(5, 0);
        ctx.set_gpr_u32(29, 0x0200_0000);
        self.dispatch_loop(rdram, ctx)
    }

    /// Looks up `ctx.pc` and calls it, repeating until `request_stop` is
    /// observed; an address with no registered function raises
    /// `UnknownFunction` (logged; execution stops).
    pub fn dispatch_loop(&self, rdram: &mut GuestMemory, ctx: &mut R5900Context) -> Result<(), MemoryError> {
        while !self.is_stop_requested() {
            match self.lookup_function(ctx.pc) {
                Some(f) => f(rdram, ctx, self)?,
                None => {
                    self.unknown_function(ctx.pc);
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn unknown_function(&self, addr: u32) {
        warn!(pc = format!("{addr:#010x}"), "dispatch: unknown function");
    }

    pub fn mid_function_miss(&self, function_start: u32, target: u32) {
        warn!(
            function_start = format!("{function_start:#010x}"),
            target = format!("{target:#010x}"),
            "dispatch landed on a block not covered by the function's CFG"
        );
    }

    pub fn unknown_opcode(&self, pc: u32, raw: u32) {
        warn!(pc = format!("{pc:#010x}"), raw = format!("{raw:#010x}"), "unknown opcode");
    }

    pub fn unmodelled_mmi(&self, pc: u32, code: u8) {
        warn!(pc = format!("{pc:#010x}"), code = format!("{code:#04x}"), "unmodelled MMI sub-opcode");
    }

    pub fn unmodelled_cop0(&self, pc: u32, code: u8) {
        warn!(pc = format!("{pc:#010x}"), code = format!("{code:#04x}"), "unmodelled COP0 sub-opcode");
    }

    pub fn unmodelled_cop1(&self, pc: u32, code: u8) {
        warn!(pc = format!("{pc:#010x}"), code = format!("{code:#04x}"), "unmodelled COP1 sub-opcode");
    }

    pub fn unmodelled_cop2(&self, pc: u32, code: u8) {
        warn!(pc = format!("{pc:#010x}"), code = format!("{code:#04x}"), "unmodelled COP2 sub-opcode");
    }

    /// `INTEGER_OVERFLOW` writes `cop0_epc = pc` and transfers control to
    /// the exception vector `0x8000_0000`; other exception kinds are only
    /// logged (§4.7).
    pub fn signal_exception(&self, ctx: &mut R5900Context, kind: ExceptionKind) {
        match kind {
            ExceptionKind::IntegerOverflow => {
                ctx.cop0_epc = ctx.pc;
                ctx.cop0_cause = (ctx.cop0_cause & !0x7c) | (12 << 2);
                ctx.pc = EXCEPTION_VECTOR;
            }
            other => {
                warn!(pc = format!("{:#010x}", ctx.pc), kind = ?other, "exception (not vectored)");
            }
        }
    }

    /// The syscall dispatcher: `ps2recomp-kernel` registers itself through
    /// a handler set elsewhere in a full build. Standalone, unrecognised
    /// syscall codes just log and return `-1` (§4.9 "Unknown syscall").
    pub fn handle_syscall(&self, _rdram: &mut GuestMemory, ctx: &mut R5900Context, code: i32) -> i32 {
        warn!(
            pc = format!("{:#010x}", ctx.pc),
            code,
            ra = format!("{:#010x}", ctx.gpr_u32(31)),
            a0 = format!("{:#010x}", ctx.gpr_u32(4)),
            a1 = format!("{:#010x}", ctx.gpr_u32(5)),
            a2 = format!("{:#010x}", ctx.gpr_u32(6)),
            a3 = format!("{:#010x}", ctx.gpr_u32(7)),
            "unhandled syscall"
        );
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_rdram: &mut GuestMemory, ctx: &mut R5900Context, runtime: &PS2Runtime) -> Result<(), MemoryError> {
        runtime.request_stop();
        ctx.pc = 0xdead;
        Ok(())
    }

    #[test]
    fn dispatch_loop_runs_registered_function_then_stops() {
        let runtime = PS2Runtime::new();
        runtime.register_function(0x1000, noop);
        let mut rdram = GuestMemory::new();
        let mut ctx = R5900Context::new();
        ctx.pc = 0x1000;
        runtime.dispatch_loop(&mut rdram, &mut ctx).unwrap();
        assert_eq!(ctx.pc, 0xdead);
        assert!(runtime.is_stop_requested());
    }

    #[test]
    fn lookup_of_unregistered_address_is_none() {
        let runtime = PS2Runtime::new();
        assert!(runtime.lookup_function(0x2000).is_none());
        assert!(!runtime.has_function(0x2000));
    }

    #[test]
    fn integer_overflow_vectors_to_exception_handler_and_saves_epc() {
        let runtime = PS2Runtime::new();
        let mut ctx = R5900Context::new();
        ctx.pc = 0x1234;
        runtime.signal_exception(&mut ctx, ExceptionKind::IntegerOverflow);
        assert_eq!(ctx.cop0_epc, 0x1234);
        assert_eq!(ctx.pc, EXCEPTION_VECTOR);
    }

    #[test]
    fn unvectored_exception_leaves_pc_untouched() {
        let runtime = PS2Runtime::new();
        let mut ctx = R5900Context::new();
        ctx.pc = 0x1234;
        runtime.signal_exception(&mut ctx, ExceptionKind::Breakpoint);
        assert_eq!(ctx.pc, 0x1234);
    }
}
