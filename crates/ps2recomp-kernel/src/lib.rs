//! EE-kernel syscall emulation (§4.9): threads, semaphores, event flags,
//! alarms, INTC/DMAC enable, SIF RPC & DMA, fio, GS register access, and
//! OSD config. Every syscall here shares the `(rdram, ctx, runtime)`
//! signature shape of the spec and returns its value via
//! `ctx.set_return_*` rather than a bare integer, so the generated call
//! site never has to know which ABI slot a given syscall's result lands
//! in.

pub mod alarm;
pub mod codes;
pub mod eventflag;
pub mod fio;
pub mod gs_osd;
pub mod intc;
pub mod sema;
pub mod sif;
pub mod thread;

use ps2recomp_runtime::memory::GuestMemory;
use ps2recomp_runtime::R5900Context;
use std::path::PathBuf;
use tracing::warn;

/// Aggregates every EE kernel object table. One `Kernel` is shared (by
/// reference) across every guest thread, mirroring `PS2Runtime`'s function
/// table (§5 "Kernel-object tables ... one global mutex for table
/// mutation; per-object mutex+condvar for blocking").
pub struct Kernel {
    pub threads: thread::ThreadTable,
    pub semas: sema::SemaTable,
    pub event_flags: eventflag::EventFlagTable,
    pub intc: intc::IntcTable,
    pub sif: sif::SifRpcTable,
    pub fio: fio::FioTable,
    pub osd: gs_osd::OsdConfig,
}

impl Kernel {
    pub fn new(process_cwd: PathBuf) -> Self {
        Self {
            threads: thread::ThreadTable::new(),
            semas: sema::SemaTable::new(),
            event_flags: eventflag::EventFlagTable::new(),
            intc: intc::IntcTable::new(),
            sif: sif::SifRpcTable::new(),
            fio: fio::FioTable::new(process_cwd),
            osd: gs_osd::OsdConfig::new(),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

/// The EE syscall numbers this recompiler actually decodes and routes;
/// every other code falls through to `TODO` (§4.9 "Unknown syscall").
/// Values match the EE SDK's `<kernel.h>` syscall table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SyscallId {
    CreateThread = 0x20,
    DeleteThread = 0x21,
    StartThread = 0x22,
    ExitThread = 0x23,
    CreateSema = 0x40,
    DeleteSema = 0x41,
    SignalSema = 0x42,
    WaitSema = 0x43,
    PollSema = 0x44,
    ReferSemaStatus = 0x45,
    CreateEventFlag = 0xb0,
    DeleteEventFlag = 0xb1,
    SetEventFlag = 0xb2,
    ClearEventFlag = 0xb3,
    WaitEventFlag = 0xb4,
    PollEventFlag = 0xb5,
    SetAlarm = 0x71,
    CancelAlarm = 0x72,
    EnableIntc = 0x33,
    DisableIntc = 0x34,
    AddIntcHandler = 0x35,
    RemoveIntcHandler = 0x36,
    // SIF, fio, GS, and OSD are library calls on real hardware (reached
    // through SIF RPC or a jal stub, never the `syscall` instruction), so
    // they carry no canonical EE syscall number. This recompiler's codegen
    // assigns them syscall-shaped ids anyway so every kernel family routes
    // through the same dispatch table (§4.9).
    SifInitRpc = 0x90,
    SifBindRpc = 0x91,
    SifCallRpc = 0x92,
    SifCheckStatRpc = 0x93,
    SifSetRpcQueue = 0x94,
    SifRemoveRpcQueue = 0x95,
    SifRegisterRpc = 0x96,
    SifRemoveRpc = 0x97,
    SifSetDma = 0x98,
    SifDmaStat = 0x99,
    FioOpen = 0xa0,
    FioClose = 0xa1,
    FioRead = 0xa2,
    FioWrite = 0xa3,
    FioLseek = 0xa4,
    FioGetstat = 0xa5,
    FioMkdir = 0xa6,
    FioRmdir = 0xa7,
    FioRemove = 0xa8,
    FioChdir = 0xa9,
    GsSetCrt = 0xc0,
    GsSetVideoMode = 0xc1,
    GsGetImr = 0xc2,
    GsPutImr = 0xc3,
    GetOsdConfigParam = 0xc8,
    SetOsdConfigParam = 0xc9,
}

impl SyscallId {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0x20 => Self::CreateThread,
            0x21 => Self::DeleteThread,
            0x22 => Self::StartThread,
            0x23 => Self::ExitThread,
            0x40 => Self::CreateSema,
            0x41 => Self::DeleteSema,
            0x42 => Self::SignalSema,
            0x43 => Self::WaitSema,
            0x44 => Self::PollSema,
            0x45 => Self::ReferSemaStatus,
            0xb0 => Self::CreateEventFlag,
            0xb1 => Self::DeleteEventFlag,
            0xb2 => Self::SetEventFlag,
            0xb3 => Self::ClearEventFlag,
            0xb4 => Self::WaitEventFlag,
            0xb5 => Self::PollEventFlag,
            0x71 => Self::SetAlarm,
            0x72 => Self::CancelAlarm,
            0x33 => Self::EnableIntc,
            0x34 => Self::DisableIntc,
            0x35 => Self::AddIntcHandler,
            0x36 => Self::RemoveIntcHandler,
            0x90 => Self::SifInitRpc,
            0x91 => Self::SifBindRpc,
            0x92 => Self::SifCallRpc,
            0x93 => Self::SifCheckStatRpc,
            0x94 => Self::SifSetRpcQueue,
            0x95 => Self::SifRemoveRpcQueue,
            0x96 => Self::SifRegisterRpc,
            0x97 => Self::SifRemoveRpc,
            0x98 => Self::SifSetDma,
            0x99 => Self::SifDmaStat,
            0xa0 => Self::FioOpen,
            0xa1 => Self::FioClose,
            0xa2 => Self::FioRead,
            0xa3 => Self::FioWrite,
            0xa4 => Self::FioLseek,
            0xa5 => Self::FioGetstat,
            0xa6 => Self::FioMkdir,
            0xa7 => Self::FioRmdir,
            0xa8 => Self::FioRemove,
            0xa9 => Self::FioChdir,
            0xc0 => Self::GsSetCrt,
            0xc1 => Self::GsSetVideoMode,
            0xc2 => Self::GsGetImr,
            0xc3 => Self::GsPutImr,
            0xc8 => Self::GetOsdConfigParam,
            0xc9 => Self::SetOsdConfigParam,
            _ => return None,
        })
    }
}

/// Reads up to `max_len` bytes starting at `addr` and stops at the first
/// NUL or unmapped byte (§4.9 fio/SIF paths are always NUL-terminated
/// guest strings).
fn read_cstring(mem: &GuestMemory, addr: u32, max_len: usize) -> String {
    let mut bytes = Vec::with_capacity(max_len.min(64));
    for i in 0..max_len as u32 {
        match mem.read8(addr.wrapping_add(i)) {
            Ok(0) | Err(_) => break,
            Ok(b) => bytes.push(b),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Handles the semaphore family: `CreateSema`/`DeleteSema`/`SignalSema`/
/// `WaitSema`/`PollSema`/`ReferSemaStatus`. Returns `false` for anything
/// else so the caller can fall through to other families or the `TODO`
/// handler.
pub fn dispatch_sema_syscall(
    kernel: &Kernel,
    rdram: &mut GuestMemory,
    ctx: &mut R5900Context,
    id: SyscallId,
    should_stop: impl Fn() -> bool,
) -> bool {
    match id {
        SyscallId::CreateSema => {
            let (attr, option, init, max) = sema::decode_create_sema_params(
                ctx.gpr_u32(4),
                ctx.gpr_u32(5),
                ctx.gpr_u32(6),
                ctx.gpr_u32(7),
            );
            let id = kernel.semas.create_sema(attr, option, init, max);
            ctx.set_return_u32(id);
            true
        }
        SyscallId::DeleteSema => {
            let rc = kernel.semas.delete_sema(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::SignalSema => {
            let rc = kernel.semas.signal_sema(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::WaitSema => {
            let rc = kernel.semas.wait_sema(ctx.gpr_u32(4), should_stop);
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::PollSema => {
            let rc = kernel.semas.poll_sema(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::ReferSemaStatus => {
            let sema_id = ctx.gpr_u32(4);
            let out_addr = ctx.gpr_u32(5);
            match kernel.semas.refer_status(sema_id) {
                Some(status) => {
                    for (i, word) in status.as_words().iter().enumerate() {
                        let _ = rdram.write32(out_addr.wrapping_add(i as u32 * 4), *word);
                    }
                    ctx.set_return_s32(0);
                }
                None => ctx.set_return_s32(codes::KE_UNKNOWN_SEMID),
            }
            true
        }
        _ => false,
    }
}

/// As [`dispatch_sema_syscall`] but for the event-flag family.
pub fn dispatch_event_flag_syscall(
    kernel: &Kernel,
    ctx: &mut R5900Context,
    id: SyscallId,
    should_stop: impl Fn() -> bool,
) -> bool {
    match id {
        SyscallId::CreateEventFlag => {
            let evf_id = kernel
                .event_flags
                .create(ctx.gpr_u32(4), ctx.gpr_u32(5), ctx.gpr_u32(6));
            ctx.set_return_u32(evf_id);
            true
        }
        SyscallId::DeleteEventFlag => {
            let rc = kernel.event_flags.delete(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::SetEventFlag => {
            let rc = kernel.event_flags.set(ctx.gpr_u32(4), ctx.gpr_u32(5));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::ClearEventFlag => {
            let rc = kernel.event_flags.clear(ctx.gpr_u32(4), ctx.gpr_u32(5));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::WaitEventFlag => {
            let (rc, _result) = kernel
                .event_flags
                .wait(ctx.gpr_u32(4), ctx.gpr_u32(5), ctx.gpr_u32(6), should_stop);
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::PollEventFlag => {
            let (rc, _result) = kernel.event_flags.poll(ctx.gpr_u32(4), ctx.gpr_u32(5), ctx.gpr_u32(6));
            ctx.set_return_s32(rc);
            true
        }
        _ => false,
    }
}

/// Thread family (§4.9 "Threads"). `CreateThread`'s sole argument is a
/// pointer to the seven-word parameter block `(attr, entry, stack,
/// stack_size, priority, gp, option)`; `StartThread` only updates the
/// table here, since spawning the host thread that actually runs the
/// recompiled entry function belongs to `ps2recomp-runtime`'s function
/// table. `ExitThread` targets the thread id in `$a0` rather than "the
/// calling thread" — this recompiler's `R5900Context` doesn't track which
/// guest thread it belongs to, so there is no other id to exit.
pub fn dispatch_thread_syscall(kernel: &Kernel, rdram: &GuestMemory, ctx: &mut R5900Context, id: SyscallId) -> bool {
    match id {
        SyscallId::CreateThread => {
            let addr = ctx.gpr_u32(4);
            let word = |i: u32| rdram.read32(addr.wrapping_add(i * 4)).unwrap_or(0);
            let param = thread::ThreadParam {
                attr: word(0),
                entry: word(1),
                stack: word(2),
                stack_size: word(3),
                priority: word(4),
                gp: word(5),
                option: word(6),
            };
            let tid = kernel.threads.create_thread(param);
            ctx.set_return_u32(tid);
            true
        }
        SyscallId::DeleteThread => {
            let rc = kernel.threads.delete_thread(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::StartThread => {
            let tid = ctx.gpr_u32(4);
            let arg = ctx.gpr_u32(5);
            match kernel.threads.start_thread(tid, arg) {
                Ok(_param) => ctx.set_return_s32(0),
                Err(rc) => ctx.set_return_s32(rc),
            }
            true
        }
        SyscallId::ExitThread => {
            kernel.threads.exit_thread(ctx.gpr_u32(4));
            ctx.set_return_s32(0);
            true
        }
        _ => false,
    }
}

/// Alarm family (§4.9 "Alarms").
pub fn dispatch_alarm_syscall(kernel: &Kernel, ctx: &mut R5900Context, id: SyscallId) -> bool {
    match id {
        SyscallId::SetAlarm => {
            let rc = alarm::set_alarm(&kernel.semas, ctx.gpr_u32(4), ctx.gpr_u32(5), ctx.gpr_u32(6));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::CancelAlarm => {
            let rc = alarm::cancel_alarm(ctx.gpr_u32(4), ctx.gpr_u32(5));
            ctx.set_return_s32(rc);
            true
        }
        _ => false,
    }
}

/// INTC/DMAC family (§4.9 "INTC/DMAC").
pub fn dispatch_intc_syscall(kernel: &Kernel, ctx: &mut R5900Context, id: SyscallId) -> bool {
    match id {
        SyscallId::EnableIntc => {
            let rc = kernel.intc.enable(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::DisableIntc => {
            let rc = kernel.intc.disable(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::AddIntcHandler => {
            let handler_id = kernel.intc.add_handler(ctx.gpr_u32(4), ctx.gpr_u32(5), ctx.gpr_u32(6), ctx.gpr_u32(7));
            ctx.set_return_u32(handler_id);
            true
        }
        SyscallId::RemoveIntcHandler => {
            let rc = kernel.intc.remove_handler(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        _ => false,
    }
}

/// SIF RPC and SIF DMA family (§4.9 "SIF RPC"). `SifCallRpc`'s last five
/// parameters don't fit in `$a0..$a3`, so they're read off the stack at
/// the standard o32 spill slots (`$sp+16, +20, ...`), matching the ABI the
/// generated call site itself was compiled against. The per-client wakeup
/// semaphore `call_rpc` can signal isn't carried by any register this
/// syscall sees, so this always passes `None` for it; real client structs
/// that embed one would need the analyzer to name that field, which is
/// out of this recompiler's scope.
pub fn dispatch_sif_syscall(kernel: &Kernel, rdram: &mut GuestMemory, ctx: &mut R5900Context, id: SyscallId) -> bool {
    match id {
        SyscallId::SifInitRpc => {
            ctx.set_return_s32(0);
            true
        }
        SyscallId::SifBindRpc => {
            let rc = kernel.sif.bind_rpc(ctx.gpr_u32(4), ctx.gpr_u32(5), ctx.gpr_u32(6));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::SifCallRpc => {
            let sp = ctx.gpr_u32(29);
            let stack_word = |i: u32| rdram.read32(sp.wrapping_add(16 + i * 4)).unwrap_or(0);
            let rc = kernel.sif.call_rpc(
                rdram,
                &kernel.semas,
                ctx.gpr_u32(4),
                ctx.gpr_u32(5),
                ctx.gpr_u32(6),
                ctx.gpr_u32(7),
                stack_word(0),
                stack_word(1),
                stack_word(2),
                stack_word(3),
                stack_word(4),
                None,
            );
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::SifCheckStatRpc => {
            let rc = kernel.sif.check_stat_rpc(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::SifSetRpcQueue | SyscallId::SifRemoveRpcQueue => {
            // No modelled IOP-side queue to register against; accepted
            // unconditionally, same as `gs_set_crt`.
            ctx.set_return_s32(0);
            true
        }
        SyscallId::SifRegisterRpc => {
            let sd_addr = ctx.gpr_u32(4);
            let sid = ctx.gpr_u32(5);
            kernel.sif.register_rpc(sid, sd_addr);
            ctx.set_return_u32(sd_addr);
            true
        }
        SyscallId::SifRemoveRpc => {
            let rc = kernel.sif.remove_rpc(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::SifSetDma => {
            let addr = ctx.gpr_u32(4);
            let count = ctx.gpr_u32(5);
            let descriptors: Vec<sif::SifDmaDescriptor> = (0..count)
                .map(|i| {
                    let base = addr.wrapping_add(i * 16);
                    sif::SifDmaDescriptor {
                        src: rdram.read32(base).unwrap_or(0),
                        dest: rdram.read32(base.wrapping_add(4)).unwrap_or(0),
                        size: rdram.read32(base.wrapping_add(8)).unwrap_or(0),
                        attr: rdram.read32(base.wrapping_add(12)).unwrap_or(0),
                    }
                })
                .collect();
            let rc = sif::sif_set_dma(rdram, &descriptors);
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::SifDmaStat => {
            let rc = sif::sif_check_dma_stat(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        _ => false,
    }
}

/// fio family (§4.9 "fio"). Paths are read as NUL-terminated guest
/// strings from `$a0`.
pub fn dispatch_fio_syscall(kernel: &Kernel, rdram: &mut GuestMemory, ctx: &mut R5900Context, id: SyscallId) -> bool {
    const MAX_PATH: usize = 256;
    match id {
        SyscallId::FioOpen => {
            let path = read_cstring(rdram, ctx.gpr_u32(4), MAX_PATH);
            let fd = kernel.fio.open(&path, ctx.gpr_u32(5));
            ctx.set_return_s32(fd);
            true
        }
        SyscallId::FioClose => {
            let rc = kernel.fio.close(ctx.gpr_s32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::FioRead => {
            let fd = ctx.gpr_s32(4);
            let buf_addr = ctx.gpr_u32(5);
            let size = ctx.gpr_u32(6) as usize;
            let mut buf = vec![0u8; size];
            let n = kernel.fio.read(fd, &mut buf);
            if n > 0 {
                for (i, b) in buf[..n as usize].iter().enumerate() {
                    let _ = rdram.write8(buf_addr.wrapping_add(i as u32), *b);
                }
            }
            ctx.set_return_s32(n);
            true
        }
        SyscallId::FioWrite => {
            let fd = ctx.gpr_s32(4);
            let buf_addr = ctx.gpr_u32(5);
            let size = ctx.gpr_u32(6);
            let mut buf = vec![0u8; size as usize];
            for (i, b) in buf.iter_mut().enumerate() {
                *b = rdram.read8(buf_addr.wrapping_add(i as u32)).unwrap_or(0);
            }
            let n = kernel.fio.write(fd, &buf);
            ctx.set_return_s32(n);
            true
        }
        SyscallId::FioLseek => {
            let rc = kernel.fio.lseek(ctx.gpr_s32(4), ctx.gpr_s32(5), ctx.gpr_u32(6));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::FioGetstat => {
            let path = read_cstring(rdram, ctx.gpr_u32(4), MAX_PATH);
            match kernel.fio.getstat(&path) {
                Some(st) => {
                    let out_addr = ctx.gpr_u32(5);
                    for (i, b) in st.iter().enumerate() {
                        let _ = rdram.write8(out_addr.wrapping_add(i as u32), *b);
                    }
                    ctx.set_return_s32(0);
                }
                None => ctx.set_return_s32(-1),
            }
            true
        }
        SyscallId::FioMkdir => {
            let path = read_cstring(rdram, ctx.gpr_u32(4), MAX_PATH);
            ctx.set_return_s32(kernel.fio.mkdir(&path));
            true
        }
        SyscallId::FioRmdir => {
            let path = read_cstring(rdram, ctx.gpr_u32(4), MAX_PATH);
            ctx.set_return_s32(kernel.fio.rmdir(&path));
            true
        }
        SyscallId::FioRemove => {
            let path = read_cstring(rdram, ctx.gpr_u32(4), MAX_PATH);
            ctx.set_return_s32(kernel.fio.remove(&path));
            true
        }
        SyscallId::FioChdir => {
            let path = read_cstring(rdram, ctx.gpr_u32(4), MAX_PATH);
            ctx.set_return_s32(kernel.fio.chdir(&path));
            true
        }
        _ => false,
    }
}

/// GS privileged-register family (§4.9 "GS.").
pub fn dispatch_gs_syscall(rdram: &mut GuestMemory, ctx: &mut R5900Context, id: SyscallId) -> bool {
    match id {
        SyscallId::GsSetCrt => {
            let rc = gs_osd::gs_set_crt(ctx.gpr_u32(4), ctx.gpr_u32(5), ctx.gpr_u32(6));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::GsSetVideoMode => {
            let rc = gs_osd::gs_set_video_mode(ctx.gpr_u32(4));
            ctx.set_return_s32(rc);
            true
        }
        SyscallId::GsGetImr => {
            ctx.set_return_u32(gs_osd::gs_get_imr(rdram));
            true
        }
        SyscallId::GsPutImr => {
            gs_osd::gs_put_imr(rdram, ctx.gpr_u32(4));
            ctx.set_return_s32(0);
            true
        }
        _ => false,
    }
}

/// OSD config family (§4.9 "OSD.").
pub fn dispatch_osd_syscall(kernel: &Kernel, ctx: &mut R5900Context, id: SyscallId) -> bool {
    match id {
        SyscallId::GetOsdConfigParam => {
            ctx.set_return_u32(kernel.osd.get());
            true
        }
        SyscallId::SetOsdConfigParam => {
            kernel.osd.set(ctx.gpr_u32(4));
            ctx.set_return_s32(0);
            true
        }
        _ => false,
    }
}

/// The master syscall entry point (§4.9): decodes the syscall id from
/// `$v1` and routes it through every family's dispatch function in turn,
/// falling back to [`todo_syscall`] when the code is unrecognised or no
/// family claims it.
pub fn dispatch_syscall(kernel: &Kernel, rdram: &mut GuestMemory, ctx: &mut R5900Context, should_stop: impl Fn() -> bool) {
    let Some(id) = SyscallId::from_code(ctx.gpr_s32(3)) else {
        todo_syscall(ctx);
        return;
    };
    let handled = dispatch_sema_syscall(kernel, rdram, ctx, id, &should_stop)
        || dispatch_event_flag_syscall(kernel, ctx, id, &should_stop)
        || dispatch_thread_syscall(kernel, rdram, ctx, id)
        || dispatch_alarm_syscall(kernel, ctx, id)
        || dispatch_intc_syscall(kernel, ctx, id)
        || dispatch_sif_syscall(kernel, rdram, ctx, id)
        || dispatch_fio_syscall(kernel, rdram, ctx, id)
        || dispatch_gs_syscall(rdram, ctx, id)
        || dispatch_osd_syscall(kernel, ctx, id);
    if !handled {
        todo_syscall(ctx);
    }
}

/// Logs an unrecognised syscall at `warn!` with `pc`, `$ra`, and
/// `$v1/$a0..$a3`, and returns `-1` (§4.9 "Unknown syscall").
pub fn todo_syscall(ctx: &mut R5900Context) {
    warn!(
        pc = format!("{:#010x}", ctx.pc),
        ra = format!("{:#010x}", ctx.gpr_u32(31)),
        v1 = format!("{:#010x}", ctx.gpr_u32(3)),
        a0 = format!("{:#010x}", ctx.gpr_u32(4)),
        a1 = format!("{:#010x}", ctx.gpr_u32(5)),
        a2 = format!("{:#010x}", ctx.gpr_u32(6)),
        a3 = format!("{:#010x}", ctx.gpr_u32(7)),
        "TODO: unhandled syscall"
    );
    ctx.set_return_s32(-1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_sema_round_trip_through_context_registers() {
        let kernel = Kernel::new(PathBuf::from("."));
        let mut mem = GuestMemory::new();
        let mut ctx = R5900Context::new();
        ctx.set_gpr_u32(4, 0); // attr
        ctx.set_gpr_u32(5, 0); // option
        ctx.set_gpr_u32(6, 0); // init
        ctx.set_gpr_u32(7, 1); // max
        assert!(dispatch_sema_syscall(&kernel, &mut mem, &mut ctx, SyscallId::CreateSema, || false));
        let id = ctx.gpr_u32(2);
        assert_eq!(id, 1);

        ctx.set_gpr_u32(4, id);
        assert!(dispatch_sema_syscall(&kernel, &mut mem, &mut ctx, SyscallId::SignalSema, || false));
        assert_eq!(ctx.gpr_s32(2), 0);

        ctx.set_gpr_u32(4, id);
        assert!(dispatch_sema_syscall(&kernel, &mut mem, &mut ctx, SyscallId::WaitSema, || false));
        assert_eq!(ctx.gpr_s32(2), 0);
    }

    #[test]
    fn refer_sema_status_writes_count_and_waiters_after_signal_wait() {
        let kernel = Kernel::new(PathBuf::from("."));
        let mut mem = GuestMemory::new();
        let mut ctx = R5900Context::new();
        let id = kernel.semas.create_sema(0, 0, 0, 1);
        kernel.semas.signal_sema(id);
        kernel.semas.wait_sema(id, || false);

        ctx.set_gpr_u32(4, id);
        ctx.set_gpr_u32(5, 0x1000);
        assert!(dispatch_sema_syscall(&kernel, &mut mem, &mut ctx, SyscallId::ReferSemaStatus, || false));
        assert_eq!(ctx.gpr_s32(2), 0);
        let words: Vec<u32> = (0..6).map(|i| mem.read32(0x1000 + i * 4).unwrap()).collect();
        assert_eq!(words[4], 0); // count
        assert_eq!(words[5], 0); // waiters
    }

    #[test]
    fn dispatch_thread_syscall_create_start_refer_status() {
        let kernel = Kernel::new(PathBuf::from("."));
        let mut mem = GuestMemory::new();
        let param_addr = 0x2000u32;
        for (i, word) in [0u32, 0x1000, 0x100000, 0x4000, 10, 0x2000, 0].iter().enumerate() {
            mem.write32(param_addr + i as u32 * 4, *word).unwrap();
        }
        let mut ctx = R5900Context::new();
        ctx.set_gpr_u32(4, param_addr);
        assert!(dispatch_thread_syscall(&kernel, &mem, &mut ctx, SyscallId::CreateThread));
        let tid = ctx.gpr_u32(2);
        assert_eq!(tid, thread::MAIN_THREAD_ID + 1);

        ctx.set_gpr_u32(4, tid);
        ctx.set_gpr_u32(5, 0xCAFE);
        assert!(dispatch_thread_syscall(&kernel, &mem, &mut ctx, SyscallId::StartThread));
        assert_eq!(ctx.gpr_s32(2), 0);
        assert!(kernel.threads.refer_status(tid).is_ok());
    }

    #[test]
    fn dispatch_fio_syscall_mkdir_chdir_open_write_close_getstat() {
        let dir = tempfile::TempDir::new().unwrap();
        let kernel = Kernel::new(dir.path().to_path_buf());
        let mut mem = GuestMemory::new();

        let write_path = |mem: &mut GuestMemory, addr: u32, s: &str| {
            for (i, b) in s.bytes().enumerate() {
                mem.write8(addr + i as u32, b).unwrap();
            }
            mem.write8(addr + s.len() as u32, 0).unwrap();
        };

        write_path(&mut mem, 0x100, "host:d");
        let mut ctx = R5900Context::new();
        ctx.set_gpr_u32(4, 0x100);
        assert!(dispatch_fio_syscall(&kernel, &mut mem, &mut ctx, SyscallId::FioMkdir));
        assert_eq!(ctx.gpr_s32(2), 0);
        assert!(dispatch_fio_syscall(&kernel, &mut mem, &mut ctx, SyscallId::FioChdir));
        assert_eq!(ctx.gpr_s32(2), 0);

        write_path(&mut mem, 0x200, "f.bin");
        ctx.set_gpr_u32(4, 0x200);
        ctx.set_gpr_u32(5, fio::O_WRONLY | fio::O_CREAT);
        assert!(dispatch_fio_syscall(&kernel, &mut mem, &mut ctx, SyscallId::FioOpen));
        let fd = ctx.gpr_s32(2);
        assert!(fd >= 0);

        write_path(&mut mem, 0x300, "hello");
        ctx.set_gpr_u32(4, fd as u32);
        ctx.set_gpr_u32(5, 0x300);
        ctx.set_gpr_u32(6, 5);
        assert!(dispatch_fio_syscall(&kernel, &mut mem, &mut ctx, SyscallId::FioWrite));
        assert_eq!(ctx.gpr_s32(2), 5);

        ctx.set_gpr_u32(4, fd as u32);
        assert!(dispatch_fio_syscall(&kernel, &mut mem, &mut ctx, SyscallId::FioClose));

        write_path(&mut mem, 0x400, "host:d/f.bin");
        ctx.set_gpr_u32(4, 0x400);
        ctx.set_gpr_u32(5, 0x500);
        assert!(dispatch_fio_syscall(&kernel, &mut mem, &mut ctx, SyscallId::FioGetstat));
        assert_eq!(ctx.gpr_s32(2), 0);
        assert_eq!(mem.read32(0x508).unwrap(), 5); // size_lo
    }

    #[test]
    fn dispatch_syscall_routes_unknown_code_to_todo() {
        let kernel = Kernel::new(PathBuf::from("."));
        let mut mem = GuestMemory::new();
        let mut ctx = R5900Context::new();
        ctx.set_gpr_s32(3, 0x7fff);
        dispatch_syscall(&kernel, &mut mem, &mut ctx, || false);
        assert_eq!(ctx.gpr_s32(2), -1);
    }

    #[test]
    fn syscall_id_from_code_rejects_unknown() {
        assert!(SyscallId::from_code(0x7fff).is_none());
        assert_eq!(SyscallId::from_code(0x40), Some(SyscallId::CreateSema));
    }

    #[test]
    fn todo_syscall_returns_minus_one() {
        let mut ctx = R5900Context::new();
        todo_syscall(&mut ctx);
        assert_eq!(ctx.gpr_s32(2), -1);
    }
}
