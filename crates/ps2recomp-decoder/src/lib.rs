//! Pure R5900 instruction decoder (§4.2).
//!
//! `decode` is a pure function: same `(raw, address)` in, same
//! [`Instruction`] out, no shared state — so it is trivially safe to call
//! concurrently from multiple analyzer worker threads.

mod flags;
mod opcode;

pub use flags::InstrFlags;
pub use opcode::{
    AluOp, BranchOp, Cop0Op, Cop1Op, Cop2Op, Fcond, ImmOp, JumpOp, LoadOp, MiscOp, MmiOp,
    MulDivOp, Opcode, ShiftOp, StoreOp, TrapOp,
};

/// A decoded R5900 instruction (§3 "Instruction").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub address: u32,
    pub raw: u32,
    pub opcode: Opcode,
    pub rs: u8,
    pub rt: u8,
    pub rd: u8,
    pub shamt: u8,
    pub imm: i16,
    pub func: u8,
    pub flags: InstrFlags,
}

impl Instruction {
    pub fn is_branch(&self) -> bool {
        self.flags.contains(InstrFlags::IS_BRANCH)
    }
    pub fn is_jump(&self) -> bool {
        self.flags.contains(InstrFlags::IS_JUMP)
    }
    pub fn has_delay_slot(&self) -> bool {
        self.flags.contains(InstrFlags::HAS_DELAY_SLOT)
    }
    pub fn modifies_pc(&self) -> bool {
        self.flags.contains(InstrFlags::MODIFIES_PC)
    }

    /// Branch/jump target for PC-relative branches (`addr + 4 + imm*4`).
    /// Returns `None` for register-indirect jumps (`jr`/`jalr`).
    pub fn branch_target(&self) -> Option<u32> {
        if self.is_branch() {
            let off = (self.imm as i32) << 2;
            Some((self.address.wrapping_add(4) as i32).wrapping_add(off) as u32)
        } else {
            None
        }
    }

    /// `j`/`jal` targets: low 26 bits of raw shifted left 2, combined with
    /// the top 4 bits of `address + 4` (the containing segment).
    pub fn jump_target(&self) -> Option<u32> {
        match self.opcode {
            Opcode::Jump(JumpOp::J) | Opcode::Jump(JumpOp::Jal) => {
                let seg = (self.address.wrapping_add(4)) & 0xF000_0000;
                Some(seg | ((self.raw & 0x03FF_FFFF) << 2))
            }
            _ => None,
        }
    }
}

fn rs_of(raw: u32) -> u8 {
    ((raw >> 21) & 0x1F) as u8
}
fn rt_of(raw: u32) -> u8 {
    ((raw >> 16) & 0x1F) as u8
}
fn rd_of(raw: u32) -> u8 {
    ((raw >> 11) & 0x1F) as u8
}
fn shamt_of(raw: u32) -> u8 {
    ((raw >> 6) & 0x1F) as u8
}
fn func_of(raw: u32) -> u8 {
    (raw & 0x3F) as u8
}
fn imm_of(raw: u32) -> i16 {
    (raw & 0xFFFF) as i16
}

/// Decode one 32-bit MIPS/MMI/COP big-endian-loaded word. `address` is only
/// used to compute branch/jump-target-adjacent flags; it does not affect
/// the tag/operand extraction.
pub fn decode(raw: u32, address: u32) -> Instruction {
    let primary = (raw >> 26) & 0x3F;
    let rs = rs_of(raw);
    let rt = rt_of(raw);
    let rd = rd_of(raw);
    let shamt = shamt_of(raw);
    let func = func_of(raw);
    let imm = imm_of(raw);

    let mut flags = InstrFlags::empty();

    let opcode = match primary {
        0x00 => decode_special(func, rs, rt, rd, shamt, &mut flags),
        0x01 => decode_regimm(rt, &mut flags),
        0x02 => {
            flags |= InstrFlags::IS_JUMP | InstrFlags::HAS_DELAY_SLOT | InstrFlags::MODIFIES_PC;
            Opcode::Jump(JumpOp::J)
        }
        0x03 => {
            flags |= InstrFlags::IS_JUMP
                | InstrFlags::IS_CALL
                | InstrFlags::HAS_DELAY_SLOT
                | InstrFlags::MODIFIES_PC;
            Opcode::Jump(JumpOp::Jal)
        }
        0x04 => branch(BranchOp::Beq, &mut flags),
        0x05 => branch(BranchOp::Bne, &mut flags),
        0x06 => branch(BranchOp::Blez, &mut flags),
        0x07 => branch(BranchOp::Bgtz, &mut flags),
        0x08 => Opcode::Imm(ImmOp::Addi),
        0x09 => Opcode::Imm(ImmOp::Addiu),
        0x0A => Opcode::Imm(ImmOp::Slti),
        0x0B => Opcode::Imm(ImmOp::Sltiu),
        0x0C => Opcode::Imm(ImmOp::Andi),
        0x0D => Opcode::Imm(ImmOp::Ori),
        0x0E => Opcode::Imm(ImmOp::Xori),
        0x0F => Opcode::Imm(ImmOp::Lui),
        0x10 => decode_cop0(rs, func, &mut flags),
        0x11 => decode_cop1(rs, rt, func, &mut flags),
        0x12 => decode_cop2(rs, rt, func, &mut flags),
        0x14 => branch(BranchOp::Beql, &mut flags),
        0x15 => branch(BranchOp::Bnel, &mut flags),
        0x16 => branch(BranchOp::Blezl, &mut flags),
        0x17 => branch(BranchOp::Bgtzl, &mut flags),
        0x18 => Opcode::Imm(ImmOp::Daddi),
        0x19 => Opcode::Imm(ImmOp::Daddiu),
        0x1A => load(LoadOp::Ldl, &mut flags),
        0x1B => load(LoadOp::Ldr, &mut flags),
        0x1C => decode_mmi(func, rd, shamt, &mut flags),
        0x1E => load(LoadOp::Lq, &mut flags),
        0x1F => store(StoreOp::Sq, &mut flags),
        0x20 => load(LoadOp::Lb, &mut flags),
        0x21 => load(LoadOp::Lh, &mut flags),
        0x22 => load(LoadOp::Lwl, &mut flags),
        0x23 => load(LoadOp::Lw, &mut flags),
        0x24 => load(LoadOp::Lbu, &mut flags),
        0x25 => load(LoadOp::Lhu, &mut flags),
        0x26 => load(LoadOp::Lwr, &mut flags),
        0x27 => load(LoadOp::Lwu, &mut flags),
        0x28 => store(StoreOp::Sb, &mut flags),
        0x29 => store(StoreOp::Sh, &mut flags),
        0x2A => store(StoreOp::Swl, &mut flags),
        0x2B => store(StoreOp::Sw, &mut flags),
        0x2C => store(StoreOp::Sdl, &mut flags),
        0x2D => store(StoreOp::Sdr, &mut flags),
        0x2E => store(StoreOp::Swr, &mut flags),
        0x2F => {
            flags |= InstrFlags::READS_MEMORY;
            Opcode::Misc(MiscOp::Cache)
        }
        0x30 => load(LoadOp::Ll, &mut flags),
        0x31 => {
            flags |= InstrFlags::IS_COP1;
            load(LoadOp::Lwc1, &mut flags)
        }
        0x36 => {
            flags |= InstrFlags::IS_COP2;
            load(LoadOp::Lqc2, &mut flags)
        }
        0x35 => {
            flags |= InstrFlags::IS_COP1;
            load(LoadOp::Ldc1, &mut flags)
        }
        0x37 => load(LoadOp::Ld, &mut flags),
        0x38 => store(StoreOp::Sc, &mut flags),
        0x39 => {
            flags |= InstrFlags::IS_COP1;
            store(StoreOp::Swc1, &mut flags)
        }
        0x3D => {
            flags |= InstrFlags::IS_COP1;
            store(StoreOp::Sdc1, &mut flags)
        }
        0x3E => {
            flags |= InstrFlags::IS_COP2;
            store(StoreOp::Sqc2, &mut flags)
        }
        0x3F => store(StoreOp::Sd, &mut flags),
        _ => Opcode::Unknown(raw),
    };

    Instruction {
        address,
        raw,
        opcode,
        rs,
        rt,
        rd,
        shamt,
        imm,
        func,
        flags,
    }
}

fn branch(op: BranchOp, flags: &mut InstrFlags) -> Opcode {
    *flags |= InstrFlags::IS_BRANCH | InstrFlags::HAS_DELAY_SLOT | InstrFlags::MODIFIES_PC;
    Opcode::Branch(op)
}

fn load(op: LoadOp, flags: &mut InstrFlags) -> Opcode {
    *flags |= InstrFlags::READS_MEMORY;
    Opcode::Load(op)
}

fn store(op: StoreOp, flags: &mut InstrFlags) -> Opcode {
    *flags |= InstrFlags::WRITES_MEMORY;
    Opcode::Store(op)
}

fn decode_special(func: u8, rs: u8, rt: u8, rd: u8, shamt: u8, flags: &mut InstrFlags) -> Opcode {
    let _ = (rs, rt, rd, shamt);
    match func {
        0x00 => Opcode::Shift(ShiftOp::Sll),
        0x02 => Opcode::Shift(ShiftOp::Srl),
        0x03 => Opcode::Shift(ShiftOp::Sra),
        0x04 => Opcode::Shift(ShiftOp::Sllv),
        0x06 => Opcode::Shift(ShiftOp::Srlv),
        0x07 => Opcode::Shift(ShiftOp::Srav),
        0x08 => {
            *flags |=
                InstrFlags::IS_JUMP | InstrFlags::IS_RETURN | InstrFlags::MODIFIES_PC;
            if rt == 0 {
                *flags |= InstrFlags::HAS_DELAY_SLOT;
            }
            Opcode::Jump(JumpOp::Jr)
        }
        0x09 => {
            *flags |= InstrFlags::IS_JUMP
                | InstrFlags::IS_CALL
                | InstrFlags::HAS_DELAY_SLOT
                | InstrFlags::MODIFIES_PC;
            Opcode::Jump(JumpOp::Jalr)
        }
        0x0A => Opcode::Alu(AluOp::Movz),
        0x0B => Opcode::Alu(AluOp::Movn),
        0x0C => Opcode::Misc(MiscOp::Syscall),
        0x0D => Opcode::Misc(MiscOp::Break),
        0x0F => Opcode::Misc(MiscOp::Sync),
        0x10 => Opcode::MulDiv(MulDivOp::Mfhi),
        0x11 => Opcode::MulDiv(MulDivOp::Mthi),
        0x12 => Opcode::MulDiv(MulDivOp::Mflo),
        0x13 => Opcode::MulDiv(MulDivOp::Mtlo),
        0x14 => Opcode::Shift(ShiftOp::Dsllv),
        0x16 => Opcode::Shift(ShiftOp::Dsrlv),
        0x17 => Opcode::Shift(ShiftOp::Dsrav),
        0x18 => Opcode::MulDiv(MulDivOp::Mult),
        0x19 => Opcode::MulDiv(MulDivOp::Multu),
        0x1A => Opcode::MulDiv(MulDivOp::Div),
        0x1B => Opcode::MulDiv(MulDivOp::Divu),
        0x20 => alu_overflow(AluOp::Add),
        0x21 => Opcode::Alu(AluOp::Addu),
        0x22 => alu_overflow(AluOp::Sub),
        0x23 => Opcode::Alu(AluOp::Subu),
        0x24 => Opcode::Alu(AluOp::And),
        0x25 => Opcode::Alu(AluOp::Or),
        0x26 => Opcode::Alu(AluOp::Xor),
        0x27 => Opcode::Alu(AluOp::Nor),
        0x28 => Opcode::Misc(MiscOp::Mfsa),
        0x29 => Opcode::Misc(MiscOp::Mtsa),
        0x2A => Opcode::Alu(AluOp::Slt),
        0x2B => Opcode::Alu(AluOp::Sltu),
        0x2C => Opcode::Alu(AluOp::Dadd),
        0x2D => Opcode::Alu(AluOp::Daddu),
        0x2E => Opcode::Alu(AluOp::Dsub),
        0x2F => Opcode::Alu(AluOp::Dsubu),
        0x30 => Opcode::Trap(TrapOp::Tge),
        0x31 => Opcode::Trap(TrapOp::Tgeu),
        0x32 => Opcode::Trap(TrapOp::Tlt),
        0x33 => Opcode::Trap(TrapOp::Tltu),
        0x34 => Opcode::Trap(TrapOp::Teq),
        0x36 => Opcode::Trap(TrapOp::Tne),
        0x38 => Opcode::Shift(ShiftOp::Dsll),
        0x3A => Opcode::Shift(ShiftOp::Dsrl),
        0x3B => Opcode::Shift(ShiftOp::Dsra),
        0x3C => Opcode::Shift(ShiftOp::Dsll32),
        0x3E => Opcode::Shift(ShiftOp::Dsrl32),
        0x3F => Opcode::Shift(ShiftOp::Dsra32),
        other => Opcode::Unknown(other as u32),
    }
}

fn alu_overflow(op: AluOp) -> Opcode {
    Opcode::Alu(op)
}

fn decode_regimm(rt: u8, flags: &mut InstrFlags) -> Opcode {
    match rt {
        0x00 => branch(BranchOp::Bltz, flags),
        0x01 => branch(BranchOp::Bgez, flags),
        0x02 => branch(BranchOp::Bltzl, flags),
        0x03 => branch(BranchOp::Bgezl, flags),
        0x08 => Opcode::Trap(TrapOp::Tgei),
        0x09 => Opcode::Trap(TrapOp::Tgeiu),
        0x0A => Opcode::Trap(TrapOp::Tlti),
        0x0B => Opcode::Trap(TrapOp::Tltiu),
        0x0C => Opcode::Trap(TrapOp::Teqi),
        0x0E => Opcode::Trap(TrapOp::Tnei),
        0x10 => {
            *flags |= InstrFlags::IS_CALL;
            branch(BranchOp::Bltzal, flags)
        }
        0x11 => {
            *flags |= InstrFlags::IS_CALL;
            branch(BranchOp::Bgezal, flags)
        }
        0x12 => {
            *flags |= InstrFlags::IS_CALL;
            branch(BranchOp::Bltzall, flags)
        }
        0x13 => {
            *flags |= InstrFlags::IS_CALL;
            branch(BranchOp::Bgezall, flags)
        }
        0x18 => Opcode::Misc(MiscOp::Mtsab),
        0x19 => Opcode::Misc(MiscOp::Mtsah),
        other => Opcode::Unknown(other as u32),
    }
}

fn decode_cop0(rs: u8, func: u8, flags: &mut InstrFlags) -> Opcode {
    let _ = flags;
    match rs {
        0x00 => Opcode::Cop0(Cop0Op::Mfc0),
        0x04 => Opcode::Cop0(Cop0Op::Mtc0),
        0x10 => match func {
            0x01 => Opcode::Cop0(Cop0Op::Tlbr),
            0x02 => Opcode::Cop0(Cop0Op::Tlbwi),
            0x06 => Opcode::Cop0(Cop0Op::Tlbwr),
            0x08 => Opcode::Cop0(Cop0Op::Tlbp),
            0x18 => {
                *flags |= InstrFlags::MODIFIES_PC;
                Opcode::Cop0(Cop0Op::Eret)
            }
            0x38 => Opcode::Cop0(Cop0Op::Ei),
            0x39 => Opcode::Cop0(Cop0Op::Di),
            other => Opcode::Cop0(Cop0Op::Unknown(other)),
        },
        other => Opcode::Cop0(Cop0Op::Unknown(other)),
    }
}

fn decode_cop1(rs: u8, rt: u8, func: u8, flags: &mut InstrFlags) -> Opcode {
    *flags |= InstrFlags::IS_COP1;
    match rs {
        0x00 => Opcode::Cop1(Cop1Op::Mfc1),
        0x02 => Opcode::Cop1(Cop1Op::Cfc1),
        0x04 => Opcode::Cop1(Cop1Op::Mtc1),
        0x06 => Opcode::Cop1(Cop1Op::Ctc1),
        0x08 => {
            *flags |= InstrFlags::IS_BRANCH | InstrFlags::HAS_DELAY_SLOT | InstrFlags::MODIFIES_PC;
            match rt {
                0x00 => Opcode::Cop1(Cop1Op::Bc1f),
                0x01 => Opcode::Cop1(Cop1Op::Bc1t),
                0x02 => Opcode::Cop1(Cop1Op::Bc1fl),
                _ => Opcode::Cop1(Cop1Op::Bc1tl),
            }
        }
        0x10 => {
            if func & 0x30 == 0x30 {
                Opcode::Cop1(Cop1Op::Compare(Fcond::from_bits(func)))
            } else {
                match func {
                    0x00 => Opcode::Cop1(Cop1Op::AddS),
                    0x01 => Opcode::Cop1(Cop1Op::SubS),
                    0x02 => Opcode::Cop1(Cop1Op::MulS),
                    0x03 => Opcode::Cop1(Cop1Op::DivS),
                    0x04 => Opcode::Cop1(Cop1Op::SqrtS),
                    0x05 => Opcode::Cop1(Cop1Op::AbsS),
                    0x06 => Opcode::Cop1(Cop1Op::MovS),
                    0x07 => Opcode::Cop1(Cop1Op::NegS),
                    0x24 => Opcode::Cop1(Cop1Op::CvtWS),
                    0x20 => Opcode::Cop1(Cop1Op::CvtSW),
                    other => Opcode::Cop1(Cop1Op::Unknown(other)),
                }
            }
        }
        other => Opcode::Cop1(Cop1Op::Unknown(other)),
    }
}

fn decode_cop2(rs: u8, rt: u8, func: u8, flags: &mut InstrFlags) -> Opcode {
    *flags |= InstrFlags::IS_COP2;
    match rs {
        0x00 => Opcode::Cop2(Cop2Op::Qmfc2),
        0x01 => Opcode::Cop2(Cop2Op::Cfc2),
        0x02 => Opcode::Cop2(Cop2Op::Qmtc2),
        0x05 => Opcode::Cop2(Cop2Op::Ctc2),
        0x08 => {
            *flags |= InstrFlags::IS_BRANCH | InstrFlags::HAS_DELAY_SLOT | InstrFlags::MODIFIES_PC;
            match rt {
                0x00 => Opcode::Cop2(Cop2Op::Bc2f),
                0x01 => Opcode::Cop2(Cop2Op::Bc2t),
                0x02 => Opcode::Cop2(Cop2Op::Bc2fl),
                _ => Opcode::Cop2(Cop2Op::Bc2tl),
            }
        }
        r if r & 0x10 != 0 => match func {
            0x00 | 0x01 | 0x02 | 0x03 => Opcode::Cop2(Cop2Op::Vadd),
            0x04 | 0x05 | 0x06 | 0x07 => Opcode::Cop2(Cop2Op::Vsub),
            0x08 | 0x09 | 0x0A | 0x0B => Opcode::Cop2(Cop2Op::Vmadd),
            0x0C | 0x0D | 0x0E | 0x0F => Opcode::Cop2(Cop2Op::Vmsub),
            0x10 | 0x11 | 0x12 | 0x13 => Opcode::Cop2(Cop2Op::Vmax),
            0x14 | 0x15 | 0x16 | 0x17 => Opcode::Cop2(Cop2Op::Vmini),
            0x18 => Opcode::Cop2(Cop2Op::Viadd),
            0x19 => Opcode::Cop2(Cop2Op::Visub),
            0x1A => Opcode::Cop2(Cop2Op::Viand),
            0x1B => Opcode::Cop2(Cop2Op::Vior),
            0x1E => Opcode::Cop2(Cop2Op::Vcallms),
            0x1F => Opcode::Cop2(Cop2Op::Vcallmsr),
            0x28 => Opcode::Cop2(Cop2Op::Vadd), // VADDA family, treated as accumulating add
            0x2A => Opcode::Cop2(Cop2Op::Vmul),
            0x2E => Opcode::Cop2(Cop2Op::Vmove),
            0x2F => Opcode::Cop2(Cop2Op::Vmr32),
            0x30 => Opcode::Cop2(Cop2Op::Vsqrt),
            0x31 => Opcode::Cop2(Cop2Op::Vrsqrt),
            0x32 => Opcode::Cop2(Cop2Op::Vdiv),
            0x34 => Opcode::Cop2(Cop2Op::Vmtir),
            0x35 => Opcode::Cop2(Cop2Op::Vmfir),
            0x36 => Opcode::Cop2(Cop2Op::Vilwr),
            0x37 => Opcode::Cop2(Cop2Op::Viswr),
            0x3B => Opcode::Cop2(Cop2Op::Vclip),
            0x2B => Opcode::Cop2(Cop2Op::Vnop),
            other => Opcode::Cop2(Cop2Op::Unknown(other)),
        },
        other => Opcode::Cop2(Cop2Op::Unknown(other)),
    }
}

fn decode_mmi(func: u8, rd: u8, shamt: u8, flags: &mut InstrFlags) -> Opcode {
    *flags |= InstrFlags::IS_MMI;
    match func {
        0x00 => Opcode::MulDiv(MulDivOp::Madd),
        0x01 => Opcode::MulDiv(MulDivOp::Maddu),
        0x04 => Opcode::Mmi(MmiOp::Plzcw),
        0x08 => decode_mmi0(shamt),
        0x09 => decode_mmi2(shamt, rd),
        0x10 => Opcode::MulDiv(MulDivOp::Mfhi1),
        0x11 => Opcode::MulDiv(MulDivOp::Mthi1),
        0x12 => Opcode::MulDiv(MulDivOp::Mflo1),
        0x13 => Opcode::MulDiv(MulDivOp::Mtlo1),
        0x18 => Opcode::MulDiv(MulDivOp::Mult1),
        0x19 => Opcode::MulDiv(MulDivOp::Multu1),
        0x1A => Opcode::MulDiv(MulDivOp::Div1),
        0x1B => Opcode::MulDiv(MulDivOp::Divu1),
        0x28 => decode_mmi1(shamt),
        0x29 => decode_mmi3(shamt, rd),
        other => Opcode::Mmi(MmiOp::Unknown(other)),
    }
}

fn decode_mmi0(shamt: u8) -> Opcode {
    Opcode::Mmi(match shamt {
        0x00 => MmiOp::Paddw,
        0x01 => MmiOp::Psubw,
        0x02 => MmiOp::Pcgtw,
        0x03 => MmiOp::Pmaxw,
        0x04 => MmiOp::Paddh,
        0x05 => MmiOp::Psubh,
        0x06 => MmiOp::Pcgth,
        0x07 => MmiOp::Pmaxh,
        0x08 => MmiOp::Paddb,
        0x09 => MmiOp::Psubb,
        0x0A => MmiOp::Pcgtb,
        0x10 => MmiOp::Paddsw,
        0x11 => MmiOp::Psubsw,
        0x12 => MmiOp::Pextlw,
        0x13 => MmiOp::Ppacw,
        other => MmiOp::Unknown(other),
    })
}

fn decode_mmi1(shamt: u8) -> Opcode {
    Opcode::Mmi(match shamt {
        0x02 => MmiOp::Pabsw,
        0x03 => MmiOp::Pminw,
        0x06 => MmiOp::Pabsh,
        0x07 => MmiOp::Pminh,
        0x12 => MmiOp::Pextuw,
        other => MmiOp::Unknown(other),
    })
}

fn decode_mmi2(shamt: u8, rd: u8) -> Opcode {
    let _ = rd;
    Opcode::Mmi(match shamt {
        0x00 => MmiOp::Pmaddw,
        0x02 => MmiOp::Psllvw,
        0x03 => MmiOp::Psrlvw,
        0x08 => MmiOp::Pmsubw,
        0x0C => MmiOp::Pmultw,
        0x0D => MmiOp::Pdivbw,
        0x0E => MmiOp::Pcpyld,
        0x10 => MmiOp::Pand,
        0x11 => MmiOp::Pxor,
        0x1A => MmiOp::Pinteh,
        0x1E => MmiOp::Pcpyh,
        other => MmiOp::Unknown(other),
    })
}

fn decode_mmi3(shamt: u8, rd: u8) -> Opcode {
    let _ = rd;
    Opcode::Mmi(match shamt {
        0x00 => MmiOp::Pmadduw,
        0x03 => MmiOp::Psravw,
        0x08 => MmiOp::Pmultuw,
        0x09 => MmiOp::Pdivuw,
        0x0E => MmiOp::Pcpyud,
        0x12 => MmiOp::Por,
        0x13 => MmiOp::Pnor,
        0x1A => MmiOp::Qfsrv,
        other => MmiOp::Unknown(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc_rtype(func: u8, rs: u8, rt: u8, rd: u8, shamt: u8) -> u32 {
        ((rs as u32) << 21)
            | ((rt as u32) << 16)
            | ((rd as u32) << 11)
            | ((shamt as u32) << 6)
            | func as u32
    }

    fn enc_itype(op: u8, rs: u8, rt: u8, imm: u16) -> u32 {
        ((op as u32) << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | imm as u32
    }

    #[test]
    fn roundtrips_raw_word() {
        let raw = enc_rtype(0x21, 4, 5, 6, 0); // ADDU $6, $4, $5
        let i = decode(raw, 0x1000);
        assert_eq!(i.raw, raw);
    }

    #[test]
    fn decodes_addu() {
        let raw = enc_rtype(0x21, 4, 5, 6, 0);
        let i = decode(raw, 0x1000);
        assert_eq!(i.opcode, Opcode::Alu(AluOp::Addu));
        assert_eq!(i.rs, 4);
        assert_eq!(i.rt, 5);
        assert_eq!(i.rd, 6);
    }

    #[test]
    fn decodes_beq_as_branch_with_delay_slot() {
        let raw = enc_itype(0x04, 1, 2, 0x10);
        let i = decode(raw, 0x2000);
        assert_eq!(i.opcode, Opcode::Branch(BranchOp::Beq));
        assert!(i.is_branch());
        assert!(i.has_delay_slot());
        assert!(i.modifies_pc());
        assert_eq!(i.branch_target(), Some(0x2000 + 4 + (0x10 << 2)));
    }

    #[test]
    fn decodes_jr_ra_as_return() {
        let raw = enc_rtype(0x08, 31, 0, 0, 0);
        let i = decode(raw, 0x3000);
        assert_eq!(i.opcode, Opcode::Jump(JumpOp::Jr));
        assert!(i.flags.contains(InstrFlags::IS_RETURN));
        assert!(i.has_delay_slot());
    }

    #[test]
    fn decodes_syscall() {
        let raw = enc_rtype(0x0C, 0, 0, 0, 0);
        let i = decode(raw, 0x4000);
        assert_eq!(i.opcode, Opcode::Misc(MiscOp::Syscall));
    }

    #[test]
    fn decodes_mmi_pextlw() {
        // MMI opcode 0x1C, func 0x08 (MMI0), shamt 0x12 (PEXTLW).
        let raw = ((0x1Cu32) << 26) | enc_rtype(0x08, 1, 2, 3, 0x12);
        let i = decode(raw, 0x5000);
        assert_eq!(i.opcode, Opcode::Mmi(MmiOp::Pextlw));
        assert!(i.flags.contains(InstrFlags::IS_MMI));
    }

    #[test]
    fn unknown_primary_opcode_does_not_modify_pc() {
        let raw = (0x3Bu32) << 26; // unused primary opcode
        let i = decode(raw, 0x6000);
        assert!(matches!(i.opcode, Opcode::Unknown(_)));
        assert!(!i.modifies_pc());
    }

    #[test]
    fn j_target_uses_segment_of_following_instruction() {
        let raw = ((0x02u32) << 26) | 0x100;
        let i = decode(raw, 0x8000_0000);
        assert_eq!(i.jump_target(), Some(0x8000_0000 | (0x100 << 2)));
    }

    #[test]
    fn cop1_compare_decodes_condition() {
        let raw = ((0x11u32) << 26) | enc_rtype(0x32, 0x10, 1, 2, 0);
        let i = decode(raw, 0x9000);
        assert_eq!(
            i.opcode,
            Opcode::Cop1(Cop1Op::Compare(Fcond::from_bits(0x32)))
        );
        assert!(i.flags.contains(InstrFlags::IS_COP1));
    }
}
