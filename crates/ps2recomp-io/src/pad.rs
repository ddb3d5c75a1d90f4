//! Pad backend (§4.10 "Pad backend"). The host input layer (a GUI-studio
//! concern, out of this crate's scope per §1) updates a process-wide
//! button-mask override; `scePadRead` just samples it into the guest's
//! per-frame buffer.

use ps2recomp_runtime::memory::GuestMemory;
use std::sync::atomic::{AtomicU16, Ordering};

pub const PAD_STATE_STABLE: u32 = 6;
pub const PAD_MODE_DIGITAL: u32 = 4;
pub const PAD_PORT_MAX: u32 = 2;
pub const PAD_SLOT_MAX: u32 = 1;

/// All buttons released, matching the EE convention of an active-low mask.
const NO_BUTTONS: u16 = 0xFFFF;

/// Process-wide pad state the host input layer writes and `scePadRead`
/// reads. One instance covers the single pad port this recompiler models.
pub struct PadOverride {
    buttons: AtomicU16,
    rx: std::sync::atomic::AtomicU8,
    ry: std::sync::atomic::AtomicU8,
    lx: std::sync::atomic::AtomicU8,
    ly: std::sync::atomic::AtomicU8,
}

impl Default for PadOverride {
    fn default() -> Self {
        Self::new()
    }
}

impl PadOverride {
    pub fn new() -> Self {
        Self {
            buttons: AtomicU16::new(NO_BUTTONS),
            rx: std::sync::atomic::AtomicU8::new(0x80),
            ry: std::sync::atomic::AtomicU8::new(0x80),
            lx: std::sync::atomic::AtomicU8::new(0x80),
            ly: std::sync::atomic::AtomicU8::new(0x80),
        }
    }

    pub fn set_buttons(&self, active_low_mask: u16) {
        self.buttons.store(active_low_mask, Ordering::SeqCst);
    }

    pub fn set_sticks(&self, rx: u8, ry: u8, lx: u8, ly: u8) {
        self.rx.store(rx, Ordering::SeqCst);
        self.ry.store(ry, Ordering::SeqCst);
        self.lx.store(lx, Ordering::SeqCst);
        self.ly.store(ly, Ordering::SeqCst);
    }

    /// Fills the per-frame buffer at `buf_addr` with the 8-byte `scePadRead`
    /// layout: offsets 2..3 = button mask (LE u16), 4 = rx, 5 = ry, 6 = lx,
    /// 7 = ly. Returns the number of bytes the real syscall reports (8,
    /// matching a single digital+analog pad's frame).
    pub fn read_into(&self, mem: &mut GuestMemory, buf_addr: u32) -> u32 {
        let mask = self.buttons.load(Ordering::SeqCst);
        let _ = mem.write8(buf_addr, 0);
        let _ = mem.write8(buf_addr.wrapping_add(1), PAD_MODE_DIGITAL as u8);
        let _ = mem.write16(buf_addr.wrapping_add(2), mask);
        let _ = mem.write8(buf_addr.wrapping_add(4), self.rx.load(Ordering::SeqCst));
        let _ = mem.write8(buf_addr.wrapping_add(5), self.ry.load(Ordering::SeqCst));
        let _ = mem.write8(buf_addr.wrapping_add(6), self.lx.load(Ordering::SeqCst));
        let _ = mem.write8(buf_addr.wrapping_add(7), self.ly.load(Ordering::SeqCst));
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_no_buttons_pressed() {
        let pad = PadOverride::new();
        let mut mem = GuestMemory::new();
        pad.read_into(&mut mem, 0x1000);
        assert_eq!(mem.read16(0x1002).unwrap(), NO_BUTTONS);
    }

    #[test]
    fn override_is_reflected_into_the_frame_buffer() {
        let pad = PadOverride::new();
        pad.set_buttons(0xFFFE); // cross pressed (bit 0 clear, active-low)
        let mut mem = GuestMemory::new();
        pad.read_into(&mut mem, 0x2000);
        assert_eq!(mem.read16(0x2002).unwrap(), 0xFFFE);
    }
}
