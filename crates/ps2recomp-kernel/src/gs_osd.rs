//! GS privileged-register and OSD config syscalls (§4.9 "GS.", "OSD.").
//! `GsSetCrt`/`GsSetVideoMode` only need to be accepted (the blit path in
//! `ps2recomp-io` doesn't model video mode at all); `GsGetIMR`/`GsPutIMR`
//! and the OSD config word round-trip real state.

use ps2recomp_runtime::memory::GuestMemory;
use std::sync::atomic::{AtomicU32, Ordering};

pub fn gs_set_crt(_interlace: u32, _mode: u32, _field: u32) -> i32 {
    0
}

pub fn gs_set_video_mode(_mode: u32) -> i32 {
    0
}

pub fn gs_get_imr(mem: &GuestMemory) -> u32 {
    mem.gs_imr()
}

pub fn gs_put_imr(mem: &mut GuestMemory, value: u32) {
    mem.gs_set_imr(value);
}

/// The single process-wide OSD config word (§4.9 "OSD."). Not guest
/// memory — the EE SDK keeps this in a kernel-private area the games never
/// address directly, so it lives next to the kernel rather than in
/// `GuestMemory`.
#[derive(Default)]
pub struct OsdConfig(AtomicU32);

impl OsdConfig {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: u32) {
        self.0.store(value, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gs_imr_round_trips_through_guest_memory() {
        let mut mem = GuestMemory::new();
        gs_put_imr(&mut mem, 0x1234);
        assert_eq!(gs_get_imr(&mem), 0x1234);
    }

    #[test]
    fn osd_config_round_trips() {
        let osd = OsdConfig::new();
        osd.set(7);
        assert_eq!(osd.get(), 7);
    }
}
