//! GS framebuffer blit (§4.10 "GS blit"). Produces a host-side RGBA
//! scratch buffer each frame; the actual texture upload is the rendering
//! backend's job (§1, an external collaborator this module never imports).

use ps2recomp_runtime::memory::GuestMemory;

pub const PSMCT32: u32 = 0;
pub const MAX_SCANLINES: u32 = 448;
pub const MAX_WIDTH: u32 = 640;

/// Default RDRAM address the non-PSMCT32 fallback path copies from; games
/// that never touch GS privileged registers fall back to a flat
/// framebuffer the recompiled code itself writes here.
pub const FALLBACK_RDRAM_FB_ADDR: u32 = 0x0100_0000;

/// One RGBA8888 frame, row-major, `width * height * 4` bytes.
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Reads `DISPFBUF1`/`DISPLAY1` and produces the next frame to present
/// (§4.10). Only a linear PSMCT32 copy is decoded; anything else falls
/// back to a flat copy from [`FALLBACK_RDRAM_FB_ADDR`] (§9 Open Questions:
/// "GIF IMAGE transfer semantics are intentionally minimal").
pub fn blit_frame(mem: &GuestMemory) -> Frame {
    let fbuf = mem.dispfbuf1();
    let display = mem.display1();
    let height = (display.dh + 1).min(MAX_SCANLINES);
    let width = (display.dw + 1).min(MAX_WIDTH);

    let mut pixels = vec![0u8; (width * height * 4) as usize];
    if fbuf.psm != PSMCT32 {
        for i in 0..pixels.len() {
            if let Ok(b) = mem.read8(FALLBACK_RDRAM_FB_ADDR.wrapping_add(i as u32)) {
                pixels[i] = b;
            }
        }
        return Frame { width, height, pixels };
    }

    for y in 0..height {
        let row_base = fbuf.fbp.wrapping_mul(2048).wrapping_add(y.wrapping_mul(fbuf.fbw).wrapping_mul(64).wrapping_mul(4));
        let row_bytes = (width * 4) as usize;
        let mut row = vec![0u8; row_bytes];
        mem.read_gs_vram(row_base, &mut row);
        let dst_start = (y * width * 4) as usize;
        pixels[dst_start..dst_start + row_bytes].copy_from_slice(&row);
    }
    Frame { width, height, pixels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps2recomp_runtime::memory::{GS_DISPFBUF1, GS_DISPLAY1, GS_PRIV_BASE};

    #[test]
    fn psmct32_path_reads_from_vram_at_the_expected_offset() {
        let mut mem = GuestMemory::new();
        // DISPFBUF1: fbp=0, fbw=10, psm=0 (bits: fbp[0..9], fbw[9..15], psm[15..20])
        mem.write64(GS_PRIV_BASE + GS_DISPFBUF1, 10 << 9).unwrap();
        // DISPLAY1: dw=7, dh=3 -> width 8, height 4
        mem.write64(GS_PRIV_BASE + GS_DISPLAY1, (7u64 << 32) | (3u64 << 44)).unwrap();
        let frame = blit_frame(&mem);
        assert_eq!(frame.width, 8);
        assert_eq!(frame.height, 4);
        assert_eq!(frame.pixels.len(), 8 * 4 * 4);
    }

    #[test]
    fn non_psmct32_falls_back_to_flat_rdram_copy() {
        let mut mem = GuestMemory::new();
        mem.write64(GS_PRIV_BASE + GS_DISPFBUF1, 1 << 15).unwrap(); // psm=1
        mem.write8(FALLBACK_RDRAM_FB_ADDR, 0x42).unwrap();
        let frame = blit_frame(&mem);
        assert_eq!(frame.pixels[0], 0x42);
    }
}
