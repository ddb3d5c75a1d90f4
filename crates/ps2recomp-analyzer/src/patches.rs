//! Patch identification (§4.3 step 6): instructions that must be replaced
//! before code generation, either because the user's config asked for a
//! whole class of instruction neutralized (`patch_syscalls`/`patch_cop0`/
//! `patch_cache`) or because the config names an exact address.

use crate::heuristics::should_skip_for_patch_density;
use crate::types::{Function, Patch};
use ps2recomp_config::RecompilerConfig;
use ps2recomp_decoder::{AluOp, ImmOp, Instruction, Opcode};

const NOP: u32 = 0;

/// Resolves the constant formed by a `lui`/`addiu`|`ori` pair feeding
/// register `reg`, scanning backward from `upto_idx` (exclusive). Returns
/// `None` if no such chain is found.
pub fn try_resolve_base_plus_offset(instructions: &[Instruction], upto_idx: usize, reg: u8) -> Option<u32> {
    let addiu = instructions[..upto_idx]
        .iter()
        .rev()
        .find(|i| matches!(i.opcode, Opcode::Imm(ImmOp::Addiu) | Opcode::Imm(ImmOp::Ori)) && i.rt == reg)?;
    let hi = try_resolve_lui_base(instructions, upto_idx, addiu.rs)?;
    Some(hi.wrapping_add(addiu.imm as i32 as u32))
}

/// Resolves a bare `lui $reg, hi` feeding register `reg`.
pub fn try_resolve_lui_base(instructions: &[Instruction], upto_idx: usize, reg: u8) -> Option<u32> {
    instructions[..upto_idx]
        .iter()
        .rev()
        .find(|i| matches!(i.opcode, Opcode::Imm(ImmOp::Lui)) && i.rt == reg)
        .map(|lui| (lui.imm as u16 as u32) << 16)
}

/// Produces the set of instruction-level patches for `function` given the
/// recompiler config: config-class patches (syscall/cop0/cache) plus
/// explicit `[[patches.instructions]]` entries whose address falls inside
/// the function. Library-ish functions that are dense in patches are left
/// to the caller to re-categorize via [`should_skip_for_patch_density`].
pub fn identify_patches(function: &Function, config: &RecompilerConfig) -> Vec<Patch> {
    let mut patches = Vec::new();

    for inst in &function.instructions {
        if config.general.patch_syscalls && matches!(inst.opcode, Opcode::Misc(ps2recomp_decoder::MiscOp::Syscall)) {
            patches.push(Patch {
                address: inst.address,
                replacement_word: NOP,
                reason: "syscall neutralized by patch_syscalls".into(),
            });
        }
        if config.general.patch_cop0 && matches!(inst.opcode, Opcode::Cop0(_)) {
            patches.push(Patch {
                address: inst.address,
                replacement_word: NOP,
                reason: "cop0 instruction neutralized by patch_cop0".into(),
            });
        }
        if config.general.patch_cache && matches!(inst.opcode, Opcode::Misc(ps2recomp_decoder::MiscOp::Cache)) {
            patches.push(Patch {
                address: inst.address,
                replacement_word: NOP,
                reason: "cache instruction neutralized by patch_cache".into(),
            });
        }
    }

    for entry in &config.patches.instructions {
        let addr: u32 = entry.address.into();
        if function.contains(addr) {
            patches.push(Patch {
                address: addr,
                replacement_word: entry.value.into(),
                reason: "explicit patch entry in config".into(),
            });
        }
    }

    patches.sort_by_key(|p| p.address);
    patches.dedup_by_key(|p| p.address);
    patches
}

/// Whether `candidate_reg`'s value at `instructions[idx]` was formed from a
/// constant address, irrespective of the alu op used to combine it — used
/// by the self-modifying-code heuristic to follow simple `add`/`addu`
/// rebases on top of a `lui` base.
pub fn resolves_to_constant_after_add(instructions: &[Instruction], idx: usize, candidate_reg: u8) -> Option<u32> {
    let add = instructions[..idx]
        .iter()
        .rev()
        .find(|i| matches!(i.opcode, Opcode::Alu(AluOp::Addu) | Opcode::Alu(AluOp::Add)) && i.rd == candidate_reg)?;
    try_resolve_lui_base(instructions, idx, add.rs).or_else(|| try_resolve_lui_base(instructions, idx, add.rt))
}

pub use should_skip_for_patch_density as patch_density_exceeds_threshold;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionCategory;
    use ps2recomp_config::{GeneralConfig, PatchEntry, PatchesSection};
    use ps2recomp_decoder::decode;
    use std::collections::BTreeMap;

    fn enc_rtype(func: u8, rs: u8, rt: u8, rd: u8, shamt: u8) -> u32 {
        ((rs as u32) << 21) | ((rt as u32) << 16) | ((rd as u32) << 11) | ((shamt as u32) << 6) | func as u32
    }

    fn test_config() -> RecompilerConfig {
        RecompilerConfig {
            general: GeneralConfig {
                input: "game.elf".into(),
                ghidra_output: None,
                output: "out".into(),
                functions_file: None,
                single_file_output: false,
                patch_syscalls: true,
                patch_cop0: false,
                patch_cache: false,
                stubs: vec![],
                skip: vec![],
                force_recompile: vec![],
            },
            patches: PatchesSection { instructions: vec![] },
            mmio: BTreeMap::new(),
        }
    }

    #[test]
    fn patches_syscalls_when_enabled() {
        let raw = enc_rtype(0x0C, 0, 0, 0, 0);
        let start = 0x1000;
        let instructions = vec![decode(raw, start)];
        let function = Function {
            name: "f".into(),
            start,
            end: start + 4,
            is_leaf: true,
            stack_frame_size: 0,
            instructions,
            category: FunctionCategory::Normal,
        };
        let config = test_config();
        let patches = identify_patches(&function, &config);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].address, start);
        assert_eq!(patches[0].replacement_word, 0);
    }

    #[test]
    fn explicit_config_patch_applies_within_function_range() {
        let raw = enc_rtype(0x21, 1, 2, 3, 0);
        let start = 0x2000;
        let instructions = vec![decode(raw, start)];
        let function = Function {
            name: "f".into(),
            start,
            end: start + 4,
            is_leaf: true,
            stack_frame_size: 0,
            instructions,
            category: FunctionCategory::Normal,
        };
        let mut config = test_config();
        config.general.patch_syscalls = false;
        config.patches.instructions.push(PatchEntry {
            address: start.into(),
            value: 0x0000_0000u32.into(),
        });
        let patches = identify_patches(&function, &config);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].reason, "explicit patch entry in config");
    }
}
