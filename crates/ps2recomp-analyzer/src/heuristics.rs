//! Classification heuristics (§4.3 step 2), exposed as free functions so
//! they are directly unit-testable without constructing a whole analyzer.

use crate::types::Function;
use ps2recomp_decoder::{Instruction, InstrFlags, LoadOp, Opcode, StoreOp};
use ps2recomp_elf::Section;

const KNOWN_LIBRARY_PREFIXES: &[&str] = &[
    "sce", "Sce", "SCE", "_sce", "SifLoadModule", "SIF", "sif",
    "memcpy", "memset", "memmove", "strcpy", "strncpy", "strlen", "strcmp",
    "malloc", "free", "calloc", "realloc",
    "pad", "scePad", "sceGs", "sceCd", "sceDma", "sceVu", "sceMc",
    "printf", "sprintf", "__", "_gp_disp",
];

const KNOWN_BROKEN_OR_BOOT_STUBS: &[&str] = &[
    "_start", "start", "_init", "_fini", "__libc_init", "InitializeSystem",
    "FlushCache", "ResetEE", "SetGsCrt", "audsrv_init",
];

/// Non-empty, non-numeric, not a synthetic disassembler-generated label
/// (`sub_`, `FUN_`, `loc_`, `lbl_`, `0x...`, or a bare hex digit string).
pub fn is_reliable_symbol_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let synthetic_prefixes = ["sub_", "FUN_", "loc_", "lbl_", "func_", "0x"];
    if synthetic_prefixes.iter().any(|p| name.starts_with(p)) {
        return false;
    }
    if name.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    true
}

pub fn is_system_symbol_name(name: &str) -> bool {
    name.starts_with("sce") || name.starts_with("Sce") || name.starts_with("SCE") || name.starts_with("__")
}

pub fn is_library_symbol_name(name: &str) -> bool {
    KNOWN_LIBRARY_PREFIXES.iter().any(|p| name.starts_with(p))
}

pub fn should_auto_skip_name(name: &str) -> bool {
    KNOWN_BROKEN_OR_BOOT_STUBS.contains(&name)
}

/// §3 MMIO ranges: IO registers `[0x10000000, 0x10010000)`, GS privileged
/// registers `[0x12000000, 0x12001000)`.
fn is_mmio_address(addr: u32) -> bool {
    (0x1000_0000..0x1001_0000).contains(&addr) || (0x1200_0000..0x1200_1000).contains(&addr)
}

/// Approximates constant-address formation via `lui`/`addiu`|`ori` pairs on
/// the same register, then checks whether a following load/store uses that
/// register as its base and the formed address falls in an MMIO range.
pub fn has_hardware_io_signal(instructions: &[Instruction]) -> bool {
    use ps2recomp_decoder::{AluOp, ImmOp};
    let mut hi_by_reg: std::collections::HashMap<u8, u32> = std::collections::HashMap::new();
    for inst in instructions {
        match inst.opcode {
            Opcode::Imm(ImmOp::Lui) => {
                hi_by_reg.insert(inst.rt, (inst.imm as u16 as u32) << 16);
            }
            Opcode::Imm(ImmOp::Addiu) | Opcode::Imm(ImmOp::Ori) => {
                if let Some(&hi) = hi_by_reg.get(&inst.rs) {
                    let addr = hi.wrapping_add(inst.imm as i32 as u32);
                    if is_mmio_address(addr) {
                        return true;
                    }
                    hi_by_reg.insert(inst.rt, addr);
                }
            }
            Opcode::Alu(AluOp::Addu) | Opcode::Alu(AluOp::Add) => {
                hi_by_reg.remove(&inst.rd);
            }
            Opcode::Load(_) | Opcode::Store(_) => {
                if let Some(&addr) = hi_by_reg.get(&inst.rs) {
                    if is_mmio_address(addr) {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

/// §4.3: "many MMI ops in a large function -> likely hand-written inner
/// loop; recompile with care."
pub fn has_large_complex_mmi_signal(instructions: &[Instruction], threshold: usize) -> bool {
    if instructions.len() < threshold {
        return false;
    }
    let mmi_count = instructions
        .iter()
        .filter(|i| i.flags.contains(InstrFlags::IS_MMI))
        .count();
    mmi_count * 10 >= instructions.len() // >= 10% MMI density
}

/// A store target lies within an executable section — approximated the
/// same way as `has_hardware_io_signal`, checking `lui`/`addiu` chains that
/// feed a store's base register.
pub fn has_self_modifying_signal(instructions: &[Instruction], sections: &[Section]) -> bool {
    use ps2recomp_decoder::ImmOp;
    let exec_sections: Vec<&Section> = sections.iter().filter(|s| s.is_executable()).collect();
    if exec_sections.is_empty() {
        return false;
    }
    let mut hi_by_reg: std::collections::HashMap<u8, u32> = std::collections::HashMap::new();
    for inst in instructions {
        match inst.opcode {
            Opcode::Imm(ImmOp::Lui) => {
                hi_by_reg.insert(inst.rt, (inst.imm as u16 as u32) << 16);
            }
            Opcode::Imm(ImmOp::Addiu) | Opcode::Imm(ImmOp::Ori) => {
                if let Some(&hi) = hi_by_reg.get(&inst.rs) {
                    hi_by_reg.insert(inst.rt, hi.wrapping_add(inst.imm as i32 as u32));
                }
            }
            Opcode::Store(_) => {
                if let Some(&base) = hi_by_reg.get(&inst.rs) {
                    let addr = base.wrapping_add(inst.imm as i32 as u32);
                    if exec_sections.iter().any(|s| s.contains(addr)) {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

/// §4.3 step 2: "if a function is dense in patches and library-like, stub
/// it instead."
pub fn should_skip_for_patch_density(
    _function_name: &str,
    function_size_bytes: u32,
    patch_count: usize,
    is_library_function: bool,
) -> bool {
    if !is_library_function || function_size_bytes == 0 {
        return false;
    }
    let instr_count = (function_size_bytes / 4).max(1) as f64;
    let density = patch_count as f64 / instr_count;
    density > 0.10
}

pub fn find_entry_function_index(functions: &[Function], entry_address: u32) -> Option<usize> {
    functions.iter().position(|f| f.start == entry_address)
}

pub fn find_fallback_entry_function_index(functions: &[Function]) -> Option<usize> {
    functions
        .iter()
        .position(|f| f.name == "_start" || f.name == "main")
        .or_else(|| {
            functions
                .iter()
                .enumerate()
                .min_by_key(|(_, f)| f.start)
                .map(|(i, _)| i)
        })
}

/// §4.3 step 5: recursive-function detection via Tarjan SCC over the call
/// graph, restricted to SCCs with size >= 2 or a direct self-loop.
pub fn find_recursive_functions(
    call_graph: &std::collections::HashMap<String, Vec<String>>,
) -> std::collections::HashSet<String> {
    struct Tarjan<'a> {
        graph: &'a std::collections::HashMap<String, Vec<String>>,
        index_counter: usize,
        stack: Vec<String>,
        indices: std::collections::HashMap<String, usize>,
        lowlink: std::collections::HashMap<String, usize>,
        on_stack: std::collections::HashSet<String>,
        sccs: Vec<Vec<String>>,
    }

    impl<'a> Tarjan<'a> {
        fn strongconnect(&mut self, v: &str) {
            self.indices.insert(v.to_string(), self.index_counter);
            self.lowlink.insert(v.to_string(), self.index_counter);
            self.index_counter += 1;
            self.stack.push(v.to_string());
            self.on_stack.insert(v.to_string());

            if let Some(successors) = self.graph.get(v) {
                for w in successors.clone() {
                    if !self.indices.contains_key(&w) {
                        self.strongconnect(&w);
                        let wl = self.lowlink[&w];
                        let vl = self.lowlink[v];
                        self.lowlink.insert(v.to_string(), vl.min(wl));
                    } else if self.on_stack.contains(&w) {
                        let wi = self.indices[&w];
                        let vl = self.lowlink[v];
                        self.lowlink.insert(v.to_string(), vl.min(wi));
                    }
                }
            }

            if self.lowlink[v] == self.indices[v] {
                let mut scc = Vec::new();
                loop {
                    let w = self.stack.pop().unwrap();
                    self.on_stack.remove(&w);
                    let is_v = w == v;
                    scc.push(w);
                    if is_v {
                        break;
                    }
                }
                self.sccs.push(scc);
            }
        }
    }

    let mut tarjan = Tarjan {
        graph: call_graph,
        index_counter: 0,
        stack: Vec::new(),
        indices: Default::default(),
        lowlink: Default::default(),
        on_stack: Default::default(),
        sccs: Vec::new(),
    };

    for node in call_graph.keys() {
        if !tarjan.indices.contains_key(node) {
            tarjan.strongconnect(node);
        }
    }

    let mut recursive = std::collections::HashSet::new();
    for scc in &tarjan.sccs {
        let self_loop = scc.len() == 1
            && call_graph
                .get(&scc[0])
                .map(|callees| callees.contains(&scc[0]))
                .unwrap_or(false);
        if scc.len() >= 2 || self_loop {
            for name in scc {
                recursive.insert(name.clone());
            }
        }
    }
    recursive
}

/// Best-effort classification used to annotate diagnostics; never changes
/// translation semantics (§C of SPEC_FULL.md).
pub fn identify_memcpy_pattern(function: &Function) -> bool {
    looks_like_copy_loop(function, true)
}

pub fn identify_memset_pattern(function: &Function) -> bool {
    function.name.contains("memset") || looks_like_copy_loop(function, false)
}

fn looks_like_copy_loop(function: &Function, needs_load: bool) -> bool {
    if function.name.to_ascii_lowercase().contains("memcpy") {
        return true;
    }
    let has_load = function
        .instructions
        .iter()
        .any(|i| matches!(i.opcode, Opcode::Load(LoadOp::Lb) | Opcode::Load(LoadOp::Lw)));
    let has_store = function
        .instructions
        .iter()
        .any(|i| matches!(i.opcode, Opcode::Store(StoreOp::Sb) | Opcode::Store(StoreOp::Sw)));
    let has_branch = function.instructions.iter().any(|i| i.is_branch());
    (!needs_load || has_load) && has_store && has_branch && function.instructions.len() < 64
}

pub fn identify_string_operation_pattern(function: &Function) -> bool {
    let n = function.name.to_ascii_lowercase();
    n.contains("strcpy") || n.contains("strlen") || n.contains("strcmp") || n.contains("strcat")
}

pub fn identify_math_pattern(function: &Function) -> bool {
    function
        .instructions
        .iter()
        .any(|i| i.flags.contains(InstrFlags::IS_COP1))
        && function.instructions.len() < 128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliable_name_rejects_synthetic_labels() {
        assert!(!is_reliable_symbol_name(""));
        assert!(!is_reliable_symbol_name("sub_00123456"));
        assert!(!is_reliable_symbol_name("FUN_00123456"));
        assert!(!is_reliable_symbol_name("deadbeef"));
        assert!(is_reliable_symbol_name("scePadRead"));
    }

    #[test]
    fn system_and_library_prefixes() {
        assert!(is_system_symbol_name("sceGsPutIMR"));
        assert!(is_library_symbol_name("memcpy"));
        assert!(!is_library_symbol_name("PlayerUpdate"));
    }

    #[test]
    fn auto_skip_boot_stub() {
        assert!(should_auto_skip_name("_start"));
        assert!(!should_auto_skip_name("PlayerUpdate"));
    }

    #[test]
    fn patch_density_only_flags_library_functions() {
        assert!(should_skip_for_patch_density("lib_fn", 40, 3, true));
        assert!(!should_skip_for_patch_density("lib_fn", 40, 3, false));
        assert!(!should_skip_for_patch_density("lib_fn", 400, 1, true));
    }

    #[test]
    fn recursive_functions_include_self_loop_and_cycle() {
        let mut graph = std::collections::HashMap::new();
        graph.insert("a".to_string(), vec!["a".to_string()]);
        graph.insert("b".to_string(), vec!["c".to_string()]);
        graph.insert("c".to_string(), vec!["b".to_string()]);
        graph.insert("d".to_string(), vec!["e".to_string()]);
        graph.insert("e".to_string(), vec![]);

        let recursive = find_recursive_functions(&graph);
        assert!(recursive.contains("a"));
        assert!(recursive.contains("b"));
        assert!(recursive.contains("c"));
        assert!(!recursive.contains("d"));
        assert!(!recursive.contains("e"));
    }

    #[test]
    fn entry_function_lookup() {
        use crate::types::FunctionCategory;
        let functions = vec![
            Function {
                name: "a".into(),
                start: 0x100,
                end: 0x110,
                is_leaf: true,
                stack_frame_size: 0,
                instructions: vec![],
                category: FunctionCategory::Normal,
            },
            Function {
                name: "_start".into(),
                start: 0x200,
                end: 0x210,
                is_leaf: true,
                stack_frame_size: 0,
                instructions: vec![],
                category: FunctionCategory::Normal,
            },
        ];
        assert_eq!(find_entry_function_index(&functions, 0x200), Some(1));
        assert_eq!(find_entry_function_index(&functions, 0x999), None);
        assert_eq!(find_fallback_entry_function_index(&functions), Some(1));
    }
}
