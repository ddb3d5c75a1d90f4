//! Jump-table detection (§4.3 step 4): recognizes the canonical
//! `lui/addiu/sll/addu/lw/jr` compiler idiom used to lower a C `switch`.

use crate::types::{Function, JumpTable};
use ps2recomp_decoder::{AluOp, ImmOp, Instruction, JumpOp, Opcode, ShiftOp};

/// Scans `function` for the jump-table idiom and resolves each table entry
/// via `read_word`, which the caller wires up to the ELF image (or test
/// fixture). Table scanning stops at the first entry that falls outside
/// `function`'s enclosing module (the caller decides the valid code range
/// by having `read_word` return `None`) or after `max_entries`.
pub fn detect_jump_tables(
    function: &Function,
    function_id: u32,
    read_word: impl Fn(u32) -> Option<u32>,
    max_entries: usize,
) -> Vec<JumpTable> {
    let mut tables = Vec::new();
    let instrs = &function.instructions;

    for (i, inst) in instrs.iter().enumerate() {
        if !matches!(inst.opcode, Opcode::Jump(JumpOp::Jr)) {
            continue;
        }
        if let Some(table) = try_match_pattern(instrs, i, inst, function_id, &read_word, max_entries) {
            tables.push(table);
        }
    }
    tables
}

/// Walks backward from a `jr $rX` looking for:
/// `lui $base, hi` ; `addiu $base, $base, lo` ; `sll $idx, $idx, 2` ;
/// `addu $t, $base, $idx` ; `lw $rX, 0($t)` ; `jr $rX`
/// allowing the instructions to appear in any order within the few
/// instructions preceding the jump (compilers reorder these freely), as
/// long as the register def/use chain connects.
fn try_match_pattern(
    instrs: &[Instruction],
    jr_idx: usize,
    jr: &Instruction,
    function_id: u32,
    read_word: &impl Fn(u32) -> Option<u32>,
    max_entries: usize,
) -> Option<JumpTable> {
    let target_reg = jr.rs;
    let window_start = jr_idx.saturating_sub(8);
    let window = &instrs[window_start..jr_idx];

    let lw = window
        .iter()
        .rev()
        .find(|i| matches!(i.opcode, Opcode::Load(ps2recomp_decoder::LoadOp::Lw)) && i.rt == target_reg)?;
    let table_base_reg = lw.rs;

    let addu = window
        .iter()
        .rev()
        .find(|i| matches!(i.opcode, Opcode::Alu(AluOp::Addu)) && i.rd == table_base_reg)?;
    let (base_reg_candidate_a, base_reg_candidate_b) = (addu.rs, addu.rt);

    let sll = window
        .iter()
        .rev()
        .find(|i| {
            matches!(i.opcode, Opcode::Shift(ShiftOp::Sll))
                && (i.rd == base_reg_candidate_a || i.rd == base_reg_candidate_b)
                && i.shamt == 2
        })?;
    let _ = sll;

    let addiu = window.iter().rev().find(|i| {
        matches!(i.opcode, Opcode::Imm(ImmOp::Addiu))
            && (i.rt == base_reg_candidate_a || i.rt == base_reg_candidate_b)
    })?;

    let lui = window
        .iter()
        .rev()
        .find(|i| matches!(i.opcode, Opcode::Imm(ImmOp::Lui)) && i.rt == addiu.rs)?;

    let hi = (lui.imm as u16 as u32) << 16;
    let table_address = hi.wrapping_add(addiu.imm as i32 as u32);

    let mut entries = Vec::new();
    let mut addr = table_address;
    while entries.len() < max_entries {
        match read_word(addr) {
            Some(w) => entries.push(w),
            None => break,
        }
        addr = addr.wrapping_add(4);
    }

    if entries.is_empty() {
        return None;
    }

    Some(JumpTable {
        address: table_address,
        base: table_address,
        entries,
        function_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionCategory;
    use ps2recomp_decoder::decode;
    use std::collections::HashMap;

    fn enc_itype(op: u8, rs: u8, rt: u8, imm: u16) -> u32 {
        ((op as u32) << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | imm as u32
    }
    fn enc_rtype(func: u8, rs: u8, rt: u8, rd: u8, shamt: u8) -> u32 {
        ((rs as u32) << 21) | ((rt as u32) << 16) | ((rd as u32) << 11) | ((shamt as u32) << 6) | func as u32
    }

    #[test]
    fn detects_canonical_lui_addiu_sll_addu_lw_jr_pattern() {
        // $4 = index
        // lui  $3, hi(table)
        // addiu $3, $3, lo(table)
        // sll  $5, $4, 2
        // addu $6, $3, $5
        // lw   $2, 0($6)
        // jr   $2
        let table_addr: u32 = 0x0020_1000;
        let hi = (table_addr >> 16) as u16;
        let lo = (table_addr & 0xFFFF) as u16;
        let words = [
            enc_itype(0x0F, 0, 3, hi),         // lui $3, hi
            enc_itype(0x09, 3, 3, lo),         // addiu $3, $3, lo
            enc_rtype(0x00, 0, 4, 5, 2),       // sll $5, $4, 2
            enc_rtype(0x21, 3, 5, 6, 0),       // addu $6, $3, $5
            enc_itype(0x23, 6, 2, 0),          // lw $2, 0($6)
            enc_rtype(0x08, 2, 0, 0, 0),       // jr $2
            0,                                  // delay slot
        ];
        let start = 0x1000;
        let instructions: Vec<_> = words
            .iter()
            .enumerate()
            .map(|(i, &w)| decode(w, start + (i as u32) * 4))
            .collect();
        let function = Function {
            name: "switchy".into(),
            start,
            end: start + words.len() as u32 * 4,
            is_leaf: true,
            stack_frame_size: 0,
            instructions,
            category: FunctionCategory::Normal,
        };

        let mut memory: HashMap<u32, u32> = HashMap::new();
        memory.insert(table_addr, 0x1100_0000);
        memory.insert(table_addr + 4, 0x1100_0010);
        memory.insert(table_addr + 8, 0x1100_0020);

        let tables = detect_jump_tables(&function, 0, |a| memory.get(&a).copied(), 16);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].address, table_addr);
        assert_eq!(tables[0].entries, vec![0x1100_0000, 0x1100_0010, 0x1100_0020]);
    }

    #[test]
    fn plain_jr_ra_is_not_mistaken_for_a_table() {
        let words = [enc_rtype(0x08, 31, 0, 0, 0), 0];
        let start = 0x2000;
        let instructions: Vec<_> = words
            .iter()
            .enumerate()
            .map(|(i, &w)| decode(w, start + (i as u32) * 4))
            .collect();
        let function = Function {
            name: "leaf".into(),
            start,
            end: start + words.len() as u32 * 4,
            is_leaf: true,
            stack_frame_size: 0,
            instructions,
            category: FunctionCategory::Normal,
        };
        let tables = detect_jump_tables(&function, 0, |_| None, 16);
        assert!(tables.is_empty());
    }
}
