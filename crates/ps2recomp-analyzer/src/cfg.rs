use crate::types::{Cfg, CfgNode, Function};
use ps2recomp_decoder::{JumpOp, Opcode};
use std::collections::BTreeSet;

/// Builds the per-function CFG (§4.3 step 3, §8 invariant 2): basic blocks
/// split at every branch target and at the instruction after a
/// branch-plus-delay-slot pair, so the branch and its delay slot stay in
/// the same block — matching how the code generator emits them together
/// (§4.4: "emit the delay-slot instruction first ... then the branch").
pub fn build_cfg(function: &Function) -> Cfg {
    let mut leaders: BTreeSet<u32> = BTreeSet::new();
    leaders.insert(function.start);

    for inst in &function.instructions {
        if inst.is_branch() || inst.is_jump() {
            if let Some(target) = inst.branch_target().or_else(|| inst.jump_target()) {
                if function.contains(target) {
                    leaders.insert(target);
                }
            }
            if inst.has_delay_slot() {
                let after = inst.address.wrapping_add(8);
                if function.contains(after) {
                    leaders.insert(after);
                }
            }
        }
    }

    let mut sorted_leaders: Vec<u32> = leaders.into_iter().collect();
    sorted_leaders.sort_unstable();

    let mut cfg: Cfg = Cfg::new();
    for (i, &start) in sorted_leaders.iter().enumerate() {
        let end = sorted_leaders.get(i + 1).copied().unwrap_or(function.end);
        let node = CfgNode {
            start,
            end,
            is_entry: start == function.start,
            ..Default::default()
        };
        cfg.insert(start, node);
    }

    // Resolve successors using the last instruction of each block.
    let addr_to_starts: Vec<u32> = sorted_leaders.clone();
    for (idx, &start) in addr_to_starts.iter().enumerate() {
        let end = cfg[&start].end;
        let Some(last) = function
            .instructions
            .iter()
            .rev()
            .find(|i| i.address < end && i.address >= start)
        else {
            continue;
        };

        let is_call = last.flags.contains(ps2recomp_decoder::InstrFlags::IS_CALL);
        let is_conditional_branch = last.is_branch();
        let is_plain_jump = matches!(last.opcode, Opcode::Jump(JumpOp::J));
        let is_dynamic_jump = matches!(last.opcode, Opcode::Jump(JumpOp::Jr) | Opcode::Jump(JumpOp::Jalr))
            && !is_call;

        let fallthrough = addr_to_starts.get(idx + 1).copied();
        let mut successors = BTreeSet::new();
        let mut is_exit = false;

        if is_conditional_branch {
            if let Some(t) = last.branch_target() {
                if function.contains(t) {
                    successors.insert(t);
                }
            }
            if let Some(ft) = fallthrough {
                successors.insert(ft);
            } else {
                is_exit = true;
            }
        } else if is_call {
            if let Some(ft) = fallthrough {
                successors.insert(ft);
            } else {
                is_exit = true;
            }
        } else if is_plain_jump {
            if let Some(t) = last.jump_target() {
                if function.contains(t) {
                    successors.insert(t);
                } else {
                    is_exit = true;
                }
            } else {
                is_exit = true;
            }
        } else if is_dynamic_jump {
            is_exit = true;
        } else if let Some(ft) = fallthrough {
            successors.insert(ft);
        } else {
            is_exit = true;
        }

        if let Some(node) = cfg.get_mut(&start) {
            node.successors = successors;
            node.is_exit = is_exit;
        }
    }

    // Predecessors + loop-header detection (back edge: predecessor start >= node start).
    let edges: Vec<(u32, u32)> = cfg
        .iter()
        .flat_map(|(&s, n)| n.successors.iter().map(move |&t| (s, t)))
        .collect();
    for (from, to) in edges {
        if let Some(node) = cfg.get_mut(&to) {
            node.predecessors.insert(from);
            if from >= to {
                node.is_loop_header = true;
            }
        }
    }

    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionCategory;
    use ps2recomp_decoder::decode;

    fn enc_itype(op: u8, rs: u8, rt: u8, imm: u16) -> u32 {
        ((op as u32) << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | imm as u32
    }
    fn enc_rtype(func: u8, rs: u8, rt: u8, rd: u8, shamt: u8) -> u32 {
        ((rs as u32) << 21) | ((rt as u32) << 16) | ((rd as u32) << 11) | ((shamt as u32) << 6) | func as u32
    }

    fn make_function(words: &[u32], start: u32) -> Function {
        let instructions = words
            .iter()
            .enumerate()
            .map(|(i, &w)| decode(w, start + (i as u32) * 4))
            .collect::<Vec<_>>();
        Function {
            name: "f".into(),
            start,
            end: start + words.len() as u32 * 4,
            is_leaf: true,
            stack_frame_size: 0,
            instructions,
            category: FunctionCategory::Normal,
        }
    }

    #[test]
    fn covers_function_range_without_overlap() {
        // beq $0,$0,+1 ; nop(delay) ; nop ; nop ; jr $ra ; nop(delay)
        let words = [
            enc_itype(0x04, 0, 0, 1),
            0, // delay slot
            0,
            0,
            enc_rtype(0x08, 31, 0, 0, 0),
            0,
        ];
        let func = make_function(&words, 0x1000);
        let cfg = build_cfg(&func);

        let mut covered = Vec::new();
        for node in cfg.values() {
            covered.push((node.start, node.end));
        }
        covered.sort();
        assert_eq!(covered.first().unwrap().0, func.start);
        assert_eq!(covered.last().unwrap().1, func.end);
        for w in covered.windows(2) {
            assert_eq!(w[0].1, w[1].0, "blocks must be contiguous, no gaps/overlaps");
        }
    }

    #[test]
    fn conditional_branch_has_two_successors() {
        let words = [enc_itype(0x04, 0, 0, 1), 0, 0, 0, enc_rtype(0x08, 31, 0, 0, 0), 0];
        let func = make_function(&words, 0x2000);
        let cfg = build_cfg(&func);
        let entry = &cfg[&func.start];
        assert_eq!(entry.successors.len(), 2);
    }

    #[test]
    fn jr_ra_block_is_exit() {
        let words = [enc_rtype(0x08, 31, 0, 0, 0), 0];
        let func = make_function(&words, 0x3000);
        let cfg = build_cfg(&func);
        let node = cfg.values().find(|n| n.start == func.start).unwrap();
        assert!(node.is_exit);
        assert!(node.successors.is_empty());
    }
}
