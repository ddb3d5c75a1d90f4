//! Guest address space (§4.5): RDRAM, scratchpad, GS VRAM, and the
//! privileged IO/GS register windows, plus a code-modification tracker so
//! the dispatcher can notice a guest overwriting its own recompiled code.
//!
//! `translate` resolves the KSEG0 (`0x8000_0000`) and KSEG1 (`0xA000_0000`)
//! cached/uncached aliases and the scratchpad's direct window down to a
//! physical offset; anything at or above `0xC000_0000` would require a real
//! TLB, which no guest module exercised by this recompiler installs, so it
//! is reported as a miss.

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::warn;

pub const RDRAM_SIZE: usize = 32 * 1024 * 1024;
pub const SCRATCHPAD_BASE: u32 = 0x7000_0000;
pub const SCRATCHPAD_SIZE: usize = 16 * 1024;

/// Not a real EE physical mapping (the GS is reached from the EE only
/// through the GIF/privileged registers); giving VRAM a window of guest
/// address space lets 128-bit accesses and the blit path in
/// `ps2recomp-io` share the same `read*`/`write*` API as RDRAM.
pub const GS_VRAM_BASE: u32 = 0x1400_0000;
pub const GS_VRAM_SIZE: usize = 4 * 1024 * 1024;

pub const IO_BASE: u32 = 0x1000_0000;
pub const IO_SIZE: usize = 0x1_0000;
pub const TIMER_BASE: u32 = 0x1000_0000;
pub const INTC_BASE: u32 = 0x1000_0200;
pub const VIF0_BASE: u32 = 0x1000_3800;
pub const VIF1_BASE: u32 = 0x1000_3c00;
pub const DMA_BASE: u32 = 0x1000_8000;
pub const DMA_CHANNEL_STRIDE: u32 = 0x1000;
pub const DMA_CHCR_OFFSET: u32 = 0x00;
pub const DMA_MADR_OFFSET: u32 = 0x10;
pub const DMA_QWC_OFFSET: u32 = 0x20;
pub const DMA_TADR_OFFSET: u32 = 0x30;
pub const DMA_CHCR_START_BIT: u32 = 0x100;

pub const GS_PRIV_BASE: u32 = 0x1200_0000;
pub const GS_PRIV_SIZE: usize = 0x2000;
pub const GS_DISPFBUF1: u32 = 0x0090;
pub const GS_DISPLAY1: u32 = 0x00a0;
pub const GS_IMR: u32 = 0x1010;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum MemoryError {
    #[error("unaligned access at {0:#010x}")]
    AddressError(u32),
    #[error("tlb miss at {0:#010x}")]
    TlbMiss(u32),
}

#[derive(Debug, Clone, Copy)]
enum Region {
    Rdram(u32),
    Scratchpad(u32),
    GsVram(u32),
    GsPriv(u32),
    Io(u32),
    Unmapped,
}

/// Decoded `DISPFBUF1`/`DISPLAY1` fields the GS blit path (§4.10) needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispFbuf {
    pub fbp: u32,
    pub fbw: u32,
    pub psm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Display {
    pub dw: u32,
    pub dh: u32,
}

/// A DMA tag as walked for a zero-`QWC` GIF/VIF1 transfer (REF/NEXT/CNT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaTagKind {
    Refe,
    Cnt,
    Next,
    Other(u8),
}

pub struct GuestMemory {
    rdram: Vec<u8>,
    scratchpad: Vec<u8>,
    gs_vram: Vec<u8>,
    gs_priv: Vec<u8>,
    io: Vec<u8>,
    code_regions: Vec<(u32, u32)>,
    modified: BTreeSet<u32>,
}

impl Default for GuestMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestMemory {
    pub fn new() -> Self {
        Self {
            rdram: vec![0; RDRAM_SIZE],
            scratchpad: vec![0; SCRATCHPAD_SIZE],
            gs_vram: vec![0; GS_VRAM_SIZE],
            gs_priv: vec![0; GS_PRIV_SIZE],
            io: vec![0; IO_SIZE],
            code_regions: Vec::new(),
            modified: BTreeSet::new(),
        }
    }

    pub fn translate(&self, virt: u32) -> Result<u32, MemoryError> {
        if (SCRATCHPAD_BASE..SCRATCHPAD_BASE + SCRATCHPAD_SIZE as u32).contains(&virt) {
            return Ok(virt);
        }
        if virt >= 0xC000_0000 {
            return Err(MemoryError::TlbMiss(virt));
        }
        if virt >= 0xA000_0000 {
            return Ok(virt - 0xA000_0000);
        }
        if virt >= 0x8000_0000 {
            return Ok(virt - 0x8000_0000);
        }
        Ok(virt)
    }

    fn region(&self, phys: u32) -> Region {
        if (SCRATCHPAD_BASE..SCRATCHPAD_BASE + SCRATCHPAD_SIZE as u32).contains(&phys) {
            return Region::Scratchpad(phys - SCRATCHPAD_BASE);
        }
        if (GS_VRAM_BASE..GS_VRAM_BASE + GS_VRAM_SIZE as u32).contains(&phys) {
            return Region::GsVram(phys - GS_VRAM_BASE);
        }
        if (GS_PRIV_BASE..GS_PRIV_BASE + GS_PRIV_SIZE as u32).contains(&phys) {
            return Region::GsPriv(phys - GS_PRIV_BASE);
        }
        if (IO_BASE..IO_BASE + IO_SIZE as u32).contains(&phys) {
            return Region::Io(phys - IO_BASE);
        }
        if (phys as usize) < self.rdram.len() {
            return Region::Rdram(phys);
        }
        Region::Unmapped
    }

    fn backing(&self, region: Region) -> Option<(&[u8], u32)> {
        match region {
            Region::Rdram(off) => Some((&self.rdram, off)),
            Region::Scratchpad(off) => Some((&self.scratchpad, off)),
            Region::GsVram(off) => Some((&self.gs_vram, off)),
            Region::GsPriv(off) => Some((&self.gs_priv, off)),
            Region::Io(off) => Some((&self.io, off)),
            Region::Unmapped => None,
        }
    }

    fn backing_mut(&mut self, region: Region) -> Option<(&mut [u8], u32)> {
        match region {
            Region::Rdram(off) => Some((&mut self.rdram, off)),
            Region::Scratchpad(off) => Some((&mut self.scratchpad, off)),
            Region::GsVram(off) => Some((&mut self.gs_vram, off)),
            Region::GsPriv(off) => Some((&mut self.gs_priv, off)),
            Region::Io(off) => Some((&mut self.io, off)),
            Region::Unmapped => None,
        }
    }

    fn read_n(&self, addr: u32, width: u32) -> Result<&[u8], MemoryError> {
        if addr % width != 0 {
            return Err(MemoryError::AddressError(addr));
        }
        let phys = self.translate(addr)?;
        let region = self.region(phys);
        match self.backing(region) {
            Some((buf, off)) if (off as usize) + width as usize <= buf.len() => {
                Ok(&buf[off as usize..off as usize + width as usize])
            }
            _ => Ok(&ZERO[..width as usize]),
        }
    }

    pub fn read8(&self, addr: u32) -> Result<u8, MemoryError> {
        Ok(self.read_n(addr, 1)?[0])
    }

    pub fn read16(&self, addr: u32) -> Result<u16, MemoryError> {
        let b = self.read_n(addr, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read32(&self, addr: u32) -> Result<u32, MemoryError> {
        let b = self.read_n(addr, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read64(&self, addr: u32) -> Result<u64, MemoryError> {
        let b = self.read_n(addr, 8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    /// 128-bit access is only legal in RAM/scratchpad/VRAM (§4.5); elsewhere
    /// it reads as zero rather than faulting, matching the split-access
    /// fallback the spec describes for writes.
    pub fn read128(&self, addr: u32) -> Result<u128, MemoryError> {
        if addr % 16 != 0 {
            return Err(MemoryError::AddressError(addr));
        }
        let phys = self.translate(addr)?;
        match self.region(phys) {
            r @ (Region::Rdram(_) | Region::Scratchpad(_) | Region::GsVram(_)) => {
                let (buf, off) = self.backing(r).unwrap();
                if (off as usize) + 16 <= buf.len() {
                    let mut bytes = [0u8; 16];
                    bytes.copy_from_slice(&buf[off as usize..off as usize + 16]);
                    Ok(u128::from_le_bytes(bytes))
                } else {
                    Ok(0)
                }
            }
            _ => Ok(0),
        }
    }

    fn write_n(&mut self, addr: u32, width: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        if addr % width != 0 {
            return Err(MemoryError::AddressError(addr));
        }
        let phys = self.translate(addr)?;
        if let Region::Io(off) = self.region(phys) {
            self.write_io_register(IO_BASE + off, load_le(bytes));
            return Ok(());
        }
        let region = self.region(phys);
        if let Some((buf, off)) = self.backing_mut(region) {
            if (off as usize) + bytes.len() <= buf.len() {
                buf[off as usize..off as usize + bytes.len()].copy_from_slice(bytes);
            }
        }
        if self.is_code_region(addr) {
            warn!(addr = format!("{addr:#010x}"), "write to recompiled code region");
            self.mark_modified(addr);
        }
        Ok(())
    }

    pub fn write8(&mut self, addr: u32, v: u8) -> Result<(), MemoryError> {
        self.write_n(addr, 1, &[v])
    }

    pub fn write16(&mut self, addr: u32, v: u16) -> Result<(), MemoryError> {
        self.write_n(addr, 2, &v.to_le_bytes())
    }

    pub fn write32(&mut self, addr: u32, v: u32) -> Result<(), MemoryError> {
        self.write_n(addr, 4, &v.to_le_bytes())
    }

    pub fn write64(&mut self, addr: u32, v: u64) -> Result<(), MemoryError> {
        self.write_n(addr, 8, &v.to_le_bytes())
    }

    /// Outside RAM/scratchpad/VRAM, a 128-bit write is split into two
    /// 64-bit writes rather than rejected (§4.5).
    pub fn write128(&mut self, addr: u32, v: u128) -> Result<(), MemoryError> {
        if addr % 16 != 0 {
            return Err(MemoryError::AddressError(addr));
        }
        let phys = self.translate(addr)?;
        match self.region(phys) {
            Region::Rdram(_) | Region::Scratchpad(_) | Region::GsVram(_) => {
                self.write_n(addr, 16, &v.to_le_bytes())
            }
            _ => {
                self.write64(addr, v as u64)?;
                self.write64(addr.wrapping_add(8), (v >> 64) as u64)
            }
        }
    }

    /// Routes a write landing in the IO window (`0x1000_0000+`) to the
    /// typed sub-handler for its sub-range (§4.5). Values are stored back
    /// into the IO backing buffer so plain reads still see the last write;
    /// DMA channel kicks additionally trigger the image-transfer path.
    pub fn write_io_register(&mut self, addr: u32, value: u32) {
        let off = addr.wrapping_sub(IO_BASE);
        if (off as usize) + 4 <= self.io.len() {
            self.io[off as usize..off as usize + 4].copy_from_slice(&value.to_le_bytes());
        }
        match addr {
            a if (TIMER_BASE..INTC_BASE).contains(&a) => { /* timer register, stored only */ }
            a if (INTC_BASE..VIF0_BASE).contains(&a) => { /* INTC register, stored only */ }
            a if (VIF0_BASE..VIF1_BASE).contains(&a) => { /* VIF0 register, stored only */ }
            a if (VIF1_BASE..DMA_BASE).contains(&a) => { /* VIF1 register, stored only */ }
            a if a >= DMA_BASE && a < DMA_BASE + 16 * DMA_CHANNEL_STRIDE => {
                self.handle_dma_register_write(a);
            }
            _ => {}
        }
    }

    fn channel_reg(&self, channel: u32, offset: u32) -> u32 {
        let base = DMA_BASE + channel * DMA_CHANNEL_STRIDE + offset;
        let off = (base - IO_BASE) as usize;
        if off + 4 <= self.io.len() {
            u32::from_le_bytes(self.io[off..off + 4].try_into().unwrap())
        } else {
            0
        }
    }

    /// Channel 1 (VIF1) and channel 2 (GIF) image-transfer kick (§4.5):
    /// `CHCR` bit `0x100` starts a minimal copy from `MADR` to GS VRAM at
    /// the page `DISPFBUF1.FBP` indicates. `QWC == 0` walks a one-tag chain
    /// from `TADR` instead of a flat copy.
    fn handle_dma_register_write(&mut self, written_addr: u32) {
        let rel = written_addr - DMA_BASE;
        let channel = rel / DMA_CHANNEL_STRIDE;
        let reg_off = rel % DMA_CHANNEL_STRIDE;
        if reg_off != DMA_CHCR_OFFSET || (channel != 1 && channel != 2) {
            return;
        }
        let chcr = self.channel_reg(channel, DMA_CHCR_OFFSET);
        if chcr & DMA_CHCR_START_BIT == 0 {
            return;
        }
        let madr = self.channel_reg(channel, DMA_MADR_OFFSET);
        let qwc = self.channel_reg(channel, DMA_QWC_OFFSET);
        let tadr = self.channel_reg(channel, DMA_TADR_OFFSET);
        let dest_page = self.dispfbuf1().fbp.wrapping_mul(2048);

        if qwc == 0 {
            self.walk_dma_tag_chain(tadr, dest_page);
            return;
        }
        let len = qwc as usize * 16;
        for i in 0..len {
            if let Ok(b) = self.read8(madr.wrapping_add(i as u32)) {
                let _ = self.write8(GS_VRAM_BASE.wrapping_add(dest_page).wrapping_add(i as u32), b);
            }
        }
    }

    /// Walks exactly one DMA tag (REF/NEXT/CNT id 0/1/2) from `tadr` and
    /// copies its payload, matching the "one-tag chain" scope in §4.5.
    fn walk_dma_tag_chain(&mut self, tadr: u32, dest_page: u32) {
        let Ok(tag_lo) = self.read64(tadr) else { return };
        let qwc = (tag_lo & 0xFFFF) as usize;
        let id = ((tag_lo >> 28) & 0x7) as u8;
        let addr_field = ((tag_lo >> 32) & 0xFFFF_FFFF) as u32;
        let kind = match id {
            0 => DmaTagKind::Refe,
            1 => DmaTagKind::Cnt,
            2 => DmaTagKind::Next,
            other => DmaTagKind::Other(other),
        };
        let src = match kind {
            DmaTagKind::Cnt => tadr.wrapping_add(16),
            _ => addr_field,
        };
        for i in 0..qwc * 16 {
            if let Ok(b) = self.read8(src.wrapping_add(i as u32)) {
                let _ = self.write8(GS_VRAM_BASE.wrapping_add(dest_page).wrapping_add(i as u32), b);
            }
        }
    }

    pub fn dispfbuf1(&self) -> DispFbuf {
        let raw = self.gs_priv_read64(GS_DISPFBUF1);
        DispFbuf {
            fbp: (raw & 0x1FF) as u32,
            fbw: ((raw >> 9) & 0x3F) as u32,
            psm: ((raw >> 15) & 0x1F) as u32,
        }
    }

    pub fn display1(&self) -> Display {
        let raw = self.gs_priv_read64(GS_DISPLAY1);
        Display {
            dw: ((raw >> 32) & 0xFFF) as u32,
            dh: ((raw >> 44) & 0x7FF) as u32,
        }
    }

    pub fn gs_imr(&self) -> u32 {
        self.gs_priv_read64(GS_IMR) as u32
    }

    pub fn gs_set_imr(&mut self, value: u32) {
        self.gs_priv_write64(GS_IMR, value as u64);
    }

    fn gs_priv_read64(&self, offset: u32) -> u64 {
        let off = offset as usize;
        if off + 8 <= self.gs_priv.len() {
            u64::from_le_bytes(self.gs_priv[off..off + 8].try_into().unwrap())
        } else {
            0
        }
    }

    fn gs_priv_write64(&mut self, offset: u32, value: u64) {
        let off = offset as usize;
        if off + 8 <= self.gs_priv.len() {
            self.gs_priv[off..off + 8].copy_from_slice(&value.to_le_bytes());
        }
    }

    pub fn read_gs_vram(&self, offset: u32, out: &mut [u8]) {
        let off = offset as usize;
        if off + out.len() <= self.gs_vram.len() {
            out.copy_from_slice(&self.gs_vram[off..off + out.len()]);
        }
    }

    /// Copies host bytes into RDRAM at `vaddr`, used to load `PT_LOAD`
    /// segments during `load_elf`. Bypasses the modified-code tracker: this
    /// is program loading, not a guest self-write.
    pub fn load_segment(&mut self, vaddr: u32, data: &[u8]) {
        let start = vaddr as usize;
        let end = start + data.len();
        if end <= self.rdram.len() {
            self.rdram[start..end].copy_from_slice(data);
        }
    }

    pub fn register_code_region(&mut self, start: u32, end: u32) {
        self.code_regions.push((start, end));
    }

    pub fn is_code_region(&self, addr: u32) -> bool {
        self.code_regions.iter().any(|&(s, e)| addr >= s && addr < e)
    }

    pub fn mark_modified(&mut self, addr: u32) {
        self.modified.insert(addr & !0x3);
    }

    pub fn is_code_modified(&self, addr: u32) -> bool {
        self.modified.contains(&(addr & !0x3))
    }

    pub fn clear_modified_flag(&mut self, addr: u32) {
        self.modified.remove(&(addr & !0x3));
    }
}

const ZERO: [u8; 16] = [0; 16];

fn load_le(bytes: &[u8]) -> u32 {
    let mut b = [0u8; 4];
    for (i, v) in bytes.iter().take(4).enumerate() {
        b[i] = *v;
    }
    u32::from_le_bytes(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_aligned_rdram_writes() {
        let mut mem = GuestMemory::new();
        mem.write32(0x1000, 0xdead_beef).unwrap();
        assert_eq!(mem.read32(0x1000).unwrap(), 0xdead_beef);
        mem.write128(0x2000, 0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00).unwrap();
        assert_eq!(
            mem.read128(0x2000).unwrap(),
            0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00
        );
    }

    #[test]
    fn unaligned_access_reports_the_address() {
        let mem = GuestMemory::new();
        let err = mem.read32(0x123).unwrap_err();
        assert_eq!(err, MemoryError::AddressError(0x123));
        assert!(format!("{err}").contains("123"));
    }

    #[test]
    fn kseg0_and_kseg1_alias_the_same_physical_byte() {
        let mut mem = GuestMemory::new();
        mem.write32(0x0000_1000, 0x55).unwrap();
        assert_eq!(mem.read32(0x8000_1000).unwrap(), 0x55);
        assert_eq!(mem.read32(0xA000_1000).unwrap(), 0x55);
    }

    #[test]
    fn scratchpad_is_a_direct_window_regardless_of_kseg() {
        let mut mem = GuestMemory::new();
        mem.write32(SCRATCHPAD_BASE + 4, 0x77).unwrap();
        assert_eq!(mem.read32(SCRATCHPAD_BASE + 4).unwrap(), 0x77);
    }

    #[test]
    fn code_region_write_is_tracked() {
        let mut mem = GuestMemory::new();
        mem.register_code_region(0x1000, 0x2000);
        assert!(!mem.is_code_modified(0x1500));
        mem.write32(0x1500, 0).unwrap();
        assert!(mem.is_code_modified(0x1500));
        mem.clear_modified_flag(0x1500);
        assert!(!mem.is_code_modified(0x1500));
    }

    #[test]
    fn dma_channel_two_image_transfer_copies_to_vram_at_fbp_page() {
        let mut mem = GuestMemory::new();
        mem.gs_priv_write64(GS_DISPFBUF1, 0); // fbp = 0
        let src = 0x3000u32;
        mem.write32(src, 0xCAFEBABE).unwrap();
        let chan_base = DMA_BASE + 2 * DMA_CHANNEL_STRIDE;
        mem.write_io_register(chan_base + DMA_MADR_OFFSET, src);
        mem.write_io_register(chan_base + DMA_QWC_OFFSET, 1);
        mem.write_io_register(chan_base + DMA_CHCR_OFFSET, DMA_CHCR_START_BIT);
        assert_eq!(mem.read32(GS_VRAM_BASE).unwrap(), 0xCAFEBABE);
    }
}
