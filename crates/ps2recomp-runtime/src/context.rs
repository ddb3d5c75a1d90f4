//! The recompiled R5900 CPU context (§4.6): 32 128-bit GPRs, the FPU file,
//! VU0 macro-mode state, and the COP0 registers the generated code touches
//! directly. One `R5900Context` exists per guest thread (§5 "CPU context
//! per guest thread is thread-local").

/// Standard MIPS COP0 register numbers for the registers this recompiler
/// models individually; everything else lands in the generic `cop0_other`
/// bank.
pub const COP0_STATUS: u32 = 12;
pub const COP0_CAUSE: u32 = 13;
pub const COP0_EPC: u32 = 14;

#[derive(Debug, Clone)]
pub struct R5900Context {
    gpr: [u128; 32],
    pub pc: u32,
    pub hi: u64,
    pub lo: u64,
    pub hi1: u64,
    pub lo1: u64,
    pub sa: u32,
    pub f: [f32; 32],
    pub fcr31: u32,
    pub vi: [u16; 16],
    pub vu0_q: f32,
    pub vu0_status: u32,
    pub cf: [u32; 4],
    pub llbit: bool,
    pub lladdr: u32,
    pub cop0_status: u32,
    pub cop0_cause: u32,
    pub cop0_epc: u32,
    cop0_other: [u32; 32],
    /// Backing store for the 32 VU0 `VF` registers, addressed directly by
    /// `Lqc2`/`Sqc2` (a 128-bit load/store of the raw lane bytes) and
    /// through the `vu0_vf_bits`/`vu0_vf_set_bits` accessors by
    /// `Qmfc2`/`Qmtc2` (a GPR-width transfer of the same bytes).
    pub vu0_vf: [[u8; 16]; 32],
}

impl Default for R5900Context {
    fn default() -> Self {
        Self::new()
    }
}

impl R5900Context {
    pub fn new() -> Self {
        Self {
            gpr: [0; 32],
            pc: 0,
            hi: 0,
            lo: 0,
            hi1: 0,
            lo1: 0,
            sa: 0,
            f: [0.0; 32],
            fcr31: 0,
            vi: [0; 16],
            vu0_q: 0.0,
            vu0_status: 0,
            cf: [0; 4],
            llbit: false,
            lladdr: 0,
            cop0_status: 0,
            cop0_cause: 0,
            cop0_epc: 0,
            cop0_other: [0; 32],
            vu0_vf: [[0; 16]; 32],
        }
    }

    /// A fresh context for a newly started thread, with the stack/global
    /// pointer/argument/entry set up per the `StartThread` ABI (§4.9).
    pub fn for_thread(stack_top: u32, gp: u32, arg: u32, entry: u32) -> Self {
        let mut ctx = Self::new();
        ctx.set_gpr_u32(29, stack_top);
        ctx.set_gpr_u32(28, gp);
        ctx.set_gpr_u32(4, arg);
        ctx.pc = entry;
        ctx
    }

    pub fn gpr_u32(&self, r: u32) -> u32 {
        self.gpr[r as usize] as u32
    }

    pub fn gpr_s32(&self, r: u32) -> i32 {
        self.gpr[r as usize] as u32 as i32
    }

    pub fn gpr_u64(&self, r: u32) -> u64 {
        self.gpr[r as usize] as u64
    }

    pub fn gpr_s64(&self, r: u32) -> i64 {
        self.gpr[r as usize] as u64 as i64
    }

    pub fn gpr_vec(&self, r: u32) -> u128 {
        self.gpr[r as usize]
    }

    /// Sign-extends a 32-bit value to 64 bits and clears the upper 64 bits
    /// of the register lane (§4.6 `SET_GPR_U32/S32`; the Open Question on
    /// upper-lane handling is resolved to always-zero, per the accessor
    /// table rather than the original's inconsistent behaviour).
    pub fn set_gpr_s32(&mut self, r: u32, v: i32) {
        if r == 0 {
            return;
        }
        self.gpr[r as usize] = v as i64 as u64 as u128;
    }

    pub fn set_gpr_u32(&mut self, r: u32, v: u32) {
        self.set_gpr_s32(r, v as i32);
    }

    pub fn set_gpr_u64(&mut self, r: u32, v: u64) {
        if r == 0 {
            return;
        }
        self.gpr[r as usize] = v as u128;
    }

    pub fn set_gpr_s64(&mut self, r: u32, v: i64) {
        self.set_gpr_u64(r, v as u64);
    }

    pub fn set_gpr_vec(&mut self, r: u32, v: u128) {
        if r == 0 {
            return;
        }
        self.gpr[r as usize] = v;
    }

    /// Places a 32-bit syscall/library return value in `$v0` per the R5900
    /// ABI: sign-extended into the 64-bit lane, upper lane cleared.
    pub fn set_return_s32(&mut self, v: i32) {
        self.set_gpr_s32(2, v);
    }

    pub fn set_return_u32(&mut self, v: u32) {
        self.set_gpr_u32(2, v);
    }

    /// A 64-bit return value: low half in `$v0`, high half mirrored into
    /// `$v1` (§4.6).
    pub fn set_return_u64(&mut self, v: u64) {
        self.set_gpr_u64(2, v & 0xFFFF_FFFF);
        self.set_gpr_u64(3, v >> 32);
    }

    pub fn cop0_read(&self, reg: u32) -> u32 {
        match reg {
            COP0_STATUS => self.cop0_status,
            COP0_CAUSE => self.cop0_cause,
            COP0_EPC => self.cop0_epc,
            other => self.cop0_other[other as usize % 32],
        }
    }

    pub fn cop0_write(&mut self, reg: u32, value: u32) {
        match reg {
            COP0_STATUS => self.cop0_status = value,
            COP0_CAUSE => self.cop0_cause = value,
            COP0_EPC => self.cop0_epc = value,
            other => self.cop0_other[other as usize % 32] = value,
        }
    }

    pub fn vu0_vf_bits(&self, reg: u32) -> u128 {
        u128::from_le_bytes(self.vu0_vf[reg as usize % 32])
    }

    pub fn vu0_vf_set_bits(&mut self, reg: u32, value: u128) {
        self.vu0_vf[reg as usize % 32] = value.to_le_bytes();
    }

    /// Decodes a VU0 `VF` register as four little-endian f32 lanes (x,y,z,w)
    /// for the macro-mode arithmetic ops in `ps2recomp_runtime::vu0`.
    pub fn vu0_vf_xyzw(&self, reg: u32) -> [f32; 4] {
        let bytes = self.vu0_vf[reg as usize % 32];
        std::array::from_fn(|i| f32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap()))
    }

    pub fn vu0_vf_set_xyzw(&mut self, reg: u32, lanes: [f32; 4]) {
        if reg == 0 {
            return;
        }
        let mut bytes = [0u8; 16];
        for (i, lane) in lanes.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&lane.to_le_bytes());
        }
        self.vu0_vf[reg as usize % 32] = bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_gpr_u32_sign_extends_into_gpr_u64() {
        let mut ctx = R5900Context::new();
        ctx.set_gpr_s32(8, -1);
        assert_eq!(ctx.gpr_u64(8), u64::MAX);
        assert_eq!(ctx.gpr_s64(8), -1);
    }

    #[test]
    fn gpr_zero_reads_zero_and_ignores_writes() {
        let mut ctx = R5900Context::new();
        ctx.set_gpr_u32(0, 0x1234);
        assert_eq!(ctx.gpr_u32(0), 0);
    }

    #[test]
    fn set_gpr_u64_clears_the_upper_lane() {
        let mut ctx = R5900Context::new();
        ctx.set_gpr_vec(9, u128::MAX);
        ctx.set_gpr_u64(9, 0x42);
        assert_eq!(ctx.gpr_vec(9), 0x42);
    }

    #[test]
    fn cop0_status_and_epc_are_individually_addressable() {
        let mut ctx = R5900Context::new();
        ctx.cop0_write(COP0_EPC, 0x1000);
        ctx.cop0_write(COP0_STATUS, 1);
        assert_eq!(ctx.cop0_read(COP0_EPC), 0x1000);
        assert_eq!(ctx.cop0_read(COP0_STATUS), 1);
    }

    #[test]
    fn vu0_vf_bits_round_trips_through_qmtc2_qmfc2_style_accessors() {
        let mut ctx = R5900Context::new();
        ctx.vu0_vf_set_bits(5, 0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00);
        assert_eq!(ctx.vu0_vf_bits(5), 0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00);
    }
}
