//! Translates analyzed functions into Rust source text (§4.4): one host
//! function per guest function, mid-function entry stubs for indirect
//! branch targets that land inside another function, and a
//! `register_functions` routine wiring every emitted entry point into the
//! runtime's function table.

mod instr;

use ps2recomp_analyzer::{AnalysisResult, Cfg, Function, FunctionCategory};
use ps2recomp_decoder::{BranchOp, Cop1Op, Cop2Op, InstrFlags, JumpOp, Opcode};
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// A guest address that is the target of some indirect branch but is not a
/// function start: the generator needs a stub for it (§4.4 "mid-function
/// entry").
pub fn find_mid_function_entries(result: &AnalysisResult) -> BTreeSet<u32> {
    let function_starts: BTreeSet<u32> = result.functions.iter().map(|f| f.start).collect();
    let mut entries = BTreeSet::new();

    for table in &result.jump_tables {
        for &target in &table.entries {
            if !function_starts.contains(&target) {
                if let Some(f) = result.functions.iter().find(|f| f.contains(target)) {
                    entries.insert(target);
                    let _ = f;
                }
            }
        }
    }
    entries
}

pub fn function_symbol(f: &Function) -> String {
    let sanitized: String = f
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("fn_{:08x}_{}", f.start, sanitized)
}

/// Emits the Rust source for a single guest function's body (§4.4).
pub fn generate_function(f: &Function, cfg: &Cfg) -> String {
    let mut out = String::new();
    let sym = function_symbol(f);

    writeln!(
        out,
        "pub fn {sym}(rdram: &mut ps2recomp_runtime::GuestMemory, ctx: &mut ps2recomp_runtime::R5900Context, runtime: &ps2recomp_runtime::PS2Runtime) -> Result<(), ps2recomp_runtime::MemoryError> {{"
    )
    .unwrap();
    writeln!(out, "    let mut __block: u32 = ctx.pc;").unwrap();
    writeln!(out, "    'dispatch: loop {{").unwrap();
    writeln!(out, "        match __block {{").unwrap();

    for (start, node) in cfg {
        writeln!(out, "            {start:#010x} => {{").unwrap();
        let block_instrs: Vec<_> = f
            .instructions
            .iter()
            .filter(|i| i.address >= node.start && i.address < node.end)
            .collect();

        let mut j = 0;
        while j < block_instrs.len() {
            let inst = block_instrs[j];
            let is_control = inst.is_branch() || inst.is_jump();

            if !is_control {
                writeln!(out, "                {}", instr::translate_non_control(inst)).unwrap();
                j += 1;
                continue;
            }

            // Materialise the delay slot before the branch/jump itself.
            if inst.has_delay_slot() && j + 1 < block_instrs.len() {
                let delay = block_instrs[j + 1];
                if !(delay.is_branch() || delay.is_jump()) {
                    writeln!(out, "                {}", instr::translate_non_control(delay)).unwrap();
                }
            }

            emit_control_flow(&mut out, f, inst, node);
            j += if inst.has_delay_slot() { 2 } else { 1 };
        }

        if node.successors.len() == 1 && !node.is_exit {
            let target = *node.successors.iter().next().unwrap();
            writeln!(out, "                __block = {target:#010x}; continue 'dispatch;").unwrap();
        } else if node.successors.is_empty() && !node.is_exit {
            writeln!(out, "                return Ok(());").unwrap();
        }

        writeln!(out, "            }}").unwrap();
    }

    writeln!(
        out,
        "            other => {{ runtime.mid_function_miss({:#010x}, other); return Ok(()); }}",
        f.start
    )
    .unwrap();
    writeln!(out, "        }}").unwrap();
    writeln!(out, "    }}").unwrap();
    writeln!(out, "}}").unwrap();
    out
}

fn emit_control_flow(
    out: &mut String,
    f: &Function,
    inst: &ps2recomp_decoder::Instruction,
    node: &ps2recomp_analyzer::CfgNode,
) {
    match inst.opcode {
        Opcode::Jump(JumpOp::Jal) => {
            let target = inst.jump_target().unwrap_or(0);
            writeln!(out, "                ctx.set_gpr_u64(31, (ctx.pc.wrapping_add(8)) as u64);").unwrap();
            emit_call(out, f, target);
        }
        Opcode::Jump(JumpOp::J) => {
            let target = inst.jump_target().unwrap_or(0);
            if f.contains(target) {
                writeln!(out, "                __block = {target:#010x}; continue 'dispatch;").unwrap();
            } else {
                emit_call(out, f, target);
                writeln!(out, "                return Ok(());").unwrap();
            }
        }
        Opcode::Jump(JumpOp::Jr) => {
            // Covers both `jr $ra` (return) and computed `jr` (jump table):
            // control always leaves this function back to the dispatcher.
            writeln!(out, "                ctx.pc = ctx.gpr_u32({});", inst.rs).unwrap();
            writeln!(out, "                return Ok(());").unwrap();
        }
        Opcode::Jump(JumpOp::Jalr) => {
            writeln!(
                out,
                "                ctx.set_gpr_u64({}, (ctx.pc.wrapping_add(8)) as u64);",
                inst.rd
            )
            .unwrap();
            writeln!(out, "                let __target = ctx.gpr_u32({});", inst.rs).unwrap();
            writeln!(out, "                ctx.pc = __target;").unwrap();
            writeln!(
                out,
                "                if let Some(callee) = runtime.lookup_function(__target) {{ callee(rdram, ctx, runtime)?; }} else {{ runtime.unknown_function(__target); }}"
            )
            .unwrap();
            writeln!(out, "                return Ok(());").unwrap();
        }
        Opcode::Branch(op) => emit_branch(out, f, inst, op, node),
        Opcode::Cop1(Cop1Op::Bc1f) | Opcode::Cop1(Cop1Op::Bc1t) | Opcode::Cop1(Cop1Op::Bc1fl) | Opcode::Cop1(Cop1Op::Bc1tl) => {
            let cond = matches!(inst.opcode, Opcode::Cop1(Cop1Op::Bc1t) | Opcode::Cop1(Cop1Op::Bc1tl));
            let target = inst.branch_target().unwrap_or(0);
            writeln!(
                out,
                "                if (ctx.fcr31 & (1 << 23) != 0) == {cond} {{"
            )
            .unwrap();
            emit_branch_taken(out, f, target);
            writeln!(out, "                }}").unwrap();
        }
        Opcode::Cop2(Cop2Op::Bc2f) | Opcode::Cop2(Cop2Op::Bc2t) | Opcode::Cop2(Cop2Op::Bc2fl) | Opcode::Cop2(Cop2Op::Bc2tl) => {
            let cond = matches!(inst.opcode, Opcode::Cop2(Cop2Op::Bc2t) | Opcode::Cop2(Cop2Op::Bc2tl));
            let target = inst.branch_target().unwrap_or(0);
            writeln!(out, "                if (ctx.cf[0] != 0) == {cond} {{").unwrap();
            emit_branch_taken(out, f, target);
            writeln!(out, "                }}").unwrap();
        }
        _ => {
            writeln!(out, "                /* unhandled control-flow opcode */").unwrap();
        }
    }
}

fn emit_call(out: &mut String, f: &Function, target: u32) {
    let _ = f;
    writeln!(
        out,
        "                if let Some(callee) = runtime.lookup_function({target:#010x}) {{ callee(rdram, ctx, runtime)?; }} else {{ runtime.unknown_function({target:#010x}); }}"
    )
    .unwrap();
}

fn emit_branch_taken(out: &mut String, f: &Function, target: u32) {
    if f.contains(target) {
        writeln!(out, "                    __block = {target:#010x}; continue 'dispatch;").unwrap();
    } else {
        writeln!(out, "                    ctx.pc = {target:#010x}; return Ok(());").unwrap();
    }
}

fn branch_condition(op: BranchOp, rs: u8, rt: u8) -> String {
    match op {
        BranchOp::Beq | BranchOp::Beql => format!("ctx.gpr_u64({rs}) == ctx.gpr_u64({rt})"),
        BranchOp::Bne | BranchOp::Bnel => format!("ctx.gpr_u64({rs}) != ctx.gpr_u64({rt})"),
        BranchOp::Blez | BranchOp::Blezl => format!("ctx.gpr_s64({rs}) <= 0"),
        BranchOp::Bgtz | BranchOp::Bgtzl => format!("ctx.gpr_s64({rs}) > 0"),
        BranchOp::Bltz | BranchOp::Bltzl => format!("ctx.gpr_s64({rs}) < 0"),
        BranchOp::Bgez | BranchOp::Bgezl => format!("ctx.gpr_s64({rs}) >= 0"),
        BranchOp::Bltzal | BranchOp::Bltzall => format!("ctx.gpr_s64({rs}) < 0"),
        BranchOp::Bgezal | BranchOp::Bgezall => format!("ctx.gpr_s64({rs}) >= 0"),
    }
}

fn emit_branch(
    out: &mut String,
    f: &Function,
    inst: &ps2recomp_decoder::Instruction,
    op: BranchOp,
    _node: &ps2recomp_analyzer::CfgNode,
) {
    let target = inst.branch_target().unwrap_or(0);
    let cond = branch_condition(op, inst.rs, inst.rt);
    if inst.flags.contains(InstrFlags::IS_CALL) {
        writeln!(out, "                if {cond} {{").unwrap();
        writeln!(out, "                    ctx.set_gpr_u64(31, (ctx.pc.wrapping_add(8)) as u64);").unwrap();
        emit_call(out, f, target);
        writeln!(out, "                }}").unwrap();
        return;
    }
    writeln!(out, "                if {cond} {{").unwrap();
    emit_branch_taken(out, f, target);
    writeln!(out, "                }}").unwrap();
}

/// Emits `register_functions`: one call per recompiled entry point, in
/// deterministic address order so repeated runs produce byte-identical
/// output.
pub fn generate_register_functions(result: &AnalysisResult) -> String {
    let mut out = String::new();
    writeln!(out, "pub fn register_functions(runtime: &mut ps2recomp_runtime::PS2Runtime) {{").unwrap();
    let mut funcs: Vec<&Function> = result
        .functions
        .iter()
        .filter(|f| f.category != FunctionCategory::Skipped && f.category != FunctionCategory::Stub)
        .collect();
    funcs.sort_by_key(|f| f.start);
    for f in funcs {
        writeln!(
            out,
            "    runtime.register_function({:#010x}, {});",
            f.start,
            function_symbol(f)
        )
        .unwrap();
    }
    writeln!(out, "}}").unwrap();
    out
}

/// Partitions generated function source by address band (e.g.
/// `recomp_0021xxxx`) so the emitted translation units stay compiler-memory
/// bounded (§4.4 "Output organisation").
pub fn partition_by_band(result: &AnalysisResult, band_bits: u32) -> Vec<(String, String)> {
    let mut bands: std::collections::BTreeMap<u32, String> = std::collections::BTreeMap::new();
    for f in &result.functions {
        if f.category == FunctionCategory::Skipped || f.category == FunctionCategory::Stub {
            continue;
        }
        let Some(cfg) = result.cfgs.get(&f.start) else {
            continue;
        };
        let band = f.start >> band_bits;
        let src = bands.entry(band).or_default();
        src.push_str(&generate_function(f, cfg));
        src.push('\n');
    }
    bands
        .into_iter()
        .map(|(band, src)| (format!("recomp_{band:04x}", band = band), src))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps2recomp_analyzer::{cfg::build_cfg, types::FunctionCategory};
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
            .collect();
        Function {
            name: "do_thing".into(),
            start,
            end: start + words.len() as u32 * 4,
            is_leaf: true,
            stack_frame_size: 0,
            instructions,
            category: FunctionCategory::Normal,
        }
    }

    #[test]
    fn generates_dispatch_loop_with_block_per_cfg_node() {
        let words = [
            enc_itype(0x04, 0, 0, 1), // beq $0,$0,+1
            0,
            0,
            0,
            enc_rtype(0x08, 31, 0, 0, 0), // jr $ra
            0,
        ];
        let f = make_function(&words, 0x1000);
        let cfg = build_cfg(&f);
        let src = generate_function(&f, &cfg);
        assert!(src.contains("fn fn_00001000_do_thing"));
        assert!(src.contains("'dispatch: loop"));
        assert!(src.contains("return Ok(())"));
    }

    #[test]
    fn symbol_name_is_sanitized_and_unique_per_address() {
        let f = make_function(&[0], 0x2000);
        assert_eq!(function_symbol(&f), "fn_00002000_do_thing");
    }
}
