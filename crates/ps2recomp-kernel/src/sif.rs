//! SIF RPC and SIF DMA (§4.9 "SIF RPC", §8 scenario 5, boundary behaviors
//! on `SifSetDma`). The EE side of SIF RPC is a loopback in this
//! recompiler: there is no separate IOP processor (§1 Non-goals), so
//! `SifCallRpc` copies directly from the send buffer to the recv buffer
//! instead of crossing to a modelled IOP.

use crate::sema::SemaTable;
use ps2recomp_runtime::memory::GuestMemory;
use std::collections::HashMap;
use std::sync::Mutex;

pub const SIF_RPC_MODE_NOWAIT: u32 = 1;
pub const SIF_DMA_MAX_DESCRIPTORS: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
struct SifServer {
    /// 0 until a real `SifRegisterRpc` lands; `SifBindRpc` against an
    /// unregistered `sid` creates this placeholder (§4.9 "Bind creates a
    /// placeholder server if the sid is not yet registered").
    server_data_addr: u32,
}

#[derive(Debug, Clone, Copy)]
struct SifClient {
    sid: u32,
}

/// Metadata recorded for the most recent `SifCallRpc` against a client,
/// matching the fields of `SifRpcServerData` the EE SDK headers document
/// (rpc number, send/recv buffers and sizes, end-callback).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SifRpcServerData {
    pub rpc_number: u32,
    pub send_buf: u32,
    pub send_size: u32,
    pub recv_buf: u32,
    pub recv_size: u32,
    pub end_function: u32,
    pub end_param: u32,
}

#[derive(Default)]
struct SifInner {
    servers: HashMap<u32, SifServer>,
    clients: HashMap<u32, SifClient>,
    last_call: HashMap<u32, SifRpcServerData>,
}

#[derive(Default)]
pub struct SifRpcTable {
    inner: Mutex<SifInner>,
}

impl SifRpcTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `client_ptr` to `sid`; always succeeds (§1 Non-goals: no
    /// modelled IOP to reject the bind).
    pub fn bind_rpc(&self, client_ptr: u32, sid: u32, _mode: u32) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.servers.entry(sid).or_insert_with(SifServer::default);
        inner.clients.insert(client_ptr, SifClient { sid });
        0
    }

    /// Registers a real server for `sid` and remaps every client that was
    /// bound before registration existed (§4.9 "a later Register *remaps*
    /// pre-bound clients").
    pub fn register_rpc(&self, sid: u32, server_data_addr: u32) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.servers.insert(sid, SifServer { server_data_addr });
        0
    }

    pub fn remove_rpc(&self, sid: u32) -> i32 {
        self.inner.lock().unwrap().servers.remove(&sid);
        0
    }

    pub fn check_stat_rpc(&self, client_ptr: u32) -> i32 {
        let inner = self.inner.lock().unwrap();
        match inner.clients.get(&client_ptr) {
            Some(c) if inner.servers.get(&c.sid).map(|s| s.server_data_addr != 0).unwrap_or(false) => 0,
            Some(_) => 1, // bound, server not yet registered: still in progress
            None => -1,
        }
    }

    /// Loopback call: copies `send_size` bytes guest-RAM→guest-RAM from
    /// `send_buf` to `recv_buf` (clamped to `recv_size`), records call
    /// metadata, and — if `mode` carries `SIF_RPC_MODE_NOWAIT` and a
    /// `wakeup_sema` was supplied by the caller — signals it, matching
    /// "if `mode == NOWAIT` signals the per-client semaphore" (§4.9).
    #[allow(clippy::too_many_arguments)]
    pub fn call_rpc(
        &self,
        mem: &mut GuestMemory,
        semas: &SemaTable,
        client_ptr: u32,
        rpc_no: u32,
        mode: u32,
        send_buf: u32,
        send_size: u32,
        recv_buf: u32,
        recv_size: u32,
        end_function: u32,
        end_param: u32,
        wakeup_sema: Option<u32>,
    ) -> i32 {
        let copy_len = send_size.min(recv_size);
        for i in 0..copy_len {
            if let Ok(b) = mem.read8(send_buf.wrapping_add(i)) {
                let _ = mem.write8(recv_buf.wrapping_add(i), b);
            }
        }
        self.inner.lock().unwrap().last_call.insert(
            client_ptr,
            SifRpcServerData {
                rpc_number: rpc_no,
                send_buf,
                send_size,
                recv_buf,
                recv_size,
                end_function,
                end_param,
            },
        );
        if mode & SIF_RPC_MODE_NOWAIT != 0 {
            if let Some(sema) = wakeup_sema {
                semas.signal_sema(sema);
            }
        }
        0
    }

    pub fn last_call(&self, client_ptr: u32) -> Option<SifRpcServerData> {
        self.inner.lock().unwrap().last_call.get(&client_ptr).copied()
    }

    pub fn server_data_addr(&self, sid: u32) -> Option<u32> {
        self.inner.lock().unwrap().servers.get(&sid).map(|s| s.server_data_addr)
    }
}

/// A single SIF DMA descriptor (§4.9 "SIF DMA").
#[derive(Debug, Clone, Copy)]
pub struct SifDmaDescriptor {
    pub src: u32,
    pub dest: u32,
    pub size: u32,
    pub attr: u32,
}

/// `sceSifSetDma`: copies every descriptor's `src..src+size` into
/// `dest..dest+size`. Rejects outright if there are more than
/// [`SIF_DMA_MAX_DESCRIPTORS`] entries. Validates every descriptor's
/// endpoints *before* copying any of them, so an invalid descriptor aborts
/// with no partial writes (§8 boundary behaviors).
pub fn sif_set_dma(mem: &mut GuestMemory, descriptors: &[SifDmaDescriptor]) -> i32 {
    if descriptors.len() > SIF_DMA_MAX_DESCRIPTORS {
        return 0;
    }
    for d in descriptors {
        if !endpoint_plausible(mem, d.src, d.size) || !endpoint_plausible(mem, d.dest, d.size) {
            return 0;
        }
    }
    for d in descriptors {
        for i in 0..d.size {
            if let Ok(b) = mem.read8(d.src.wrapping_add(i)) {
                let _ = mem.write8(d.dest.wrapping_add(i), b);
            }
        }
    }
    descriptors.len() as i32
}

fn endpoint_plausible(mem: &GuestMemory, addr: u32, size: u32) -> bool {
    if size == 0 {
        return true;
    }
    mem.translate(addr).is_ok() && mem.translate(addr.wrapping_add(size - 1)).is_ok()
}

pub fn sif_check_dma_stat(_descriptors_in_flight: u32) -> i32 {
    0 // no modelled IOP: every SIF DMA is synchronous, so it's always done.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_before_register_creates_placeholder_then_register_remaps() {
        let sif = SifRpcTable::new();
        let client_a = 0x1000;
        let sid = 0x20000122;
        assert_eq!(sif.bind_rpc(client_a, sid, 0), 0);
        assert_eq!(sif.server_data_addr(sid), Some(0));

        assert_eq!(sif.register_rpc(sid, 0x5000), 0);
        assert_eq!(sif.server_data_addr(sid), Some(0x5000));
    }

    #[test]
    fn call_rpc_copies_send_into_recv_and_records_metadata() {
        let mut mem = GuestMemory::new();
        mem.write32(0x1000, 0xdeadbeef).unwrap();
        let semas = SemaTable::new();
        let sif = SifRpcTable::new();
        sif.call_rpc(&mut mem, &semas, 0x2000, 7, 0, 0x1000, 4, 0x1100, 4, 0, 0, None);
        assert_eq!(mem.read32(0x1100).unwrap(), 0xdeadbeef);
        let recorded = sif.last_call(0x2000).unwrap();
        assert_eq!(recorded.rpc_number, 7);
    }

    #[test]
    fn call_rpc_nowait_signals_the_wakeup_semaphore() {
        let mut mem = GuestMemory::new();
        let semas = SemaTable::new();
        let sema_id = semas.create_sema(0, 0, 0, 1);
        let sif = SifRpcTable::new();
        sif.call_rpc(&mut mem, &semas, 0x2000, 1, SIF_RPC_MODE_NOWAIT, 0, 0, 0, 0, 0, 0, Some(sema_id));
        assert_eq!(semas.poll_sema(sema_id), 0);
    }

    #[test]
    fn set_dma_rejects_more_than_32_descriptors() {
        let mut mem = GuestMemory::new();
        let descriptors = vec![SifDmaDescriptor { src: 0, dest: 0x1000, size: 4, attr: 0 }; 33];
        assert_eq!(sif_set_dma(&mut mem, &descriptors), 0);
    }

    #[test]
    fn set_dma_invalid_descriptor_leaves_earlier_destinations_untouched() {
        let mut mem = GuestMemory::new();
        mem.write32(0x100, 0x1111).unwrap();
        let descriptors = vec![
            SifDmaDescriptor { src: 0x100, dest: 0x200, size: 4, attr: 0 },
            SifDmaDescriptor { src: 0xFFFF_FFF0, dest: 0x300, size: 4, attr: 0 },
        ];
        assert_eq!(sif_set_dma(&mut mem, &descriptors), 0);
        assert_eq!(mem.read32(0x200).unwrap(), 0);
    }

    #[test]
    fn set_dma_copies_every_valid_descriptor() {
        let mut mem = GuestMemory::new();
        mem.write32(0x100, 0xAAAA).unwrap();
        mem.write32(0x104, 0xBBBB).unwrap();
        let descriptors = vec![
            SifDmaDescriptor { src: 0x100, dest: 0x200, size: 4, attr: 0 },
            SifDmaDescriptor { src: 0x104, dest: 0x204, size: 4, attr: 0 },
        ];
        assert_eq!(sif_set_dma(&mut mem, &descriptors), 2);
        assert_eq!(mem.read32(0x200).unwrap(), 0xAAAA);
        assert_eq!(mem.read32(0x204).unwrap(), 0xBBBB);
    }
}
