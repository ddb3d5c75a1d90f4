//! ELF analysis pipeline (§4.3): turns a parsed ELF plus a recompiler
//! config into the fully classified function list, per-function CFGs,
//! jump tables, call graph, recursive-function set, and patch list that
//! the code generator consumes.

pub mod cfg;
pub mod error;
pub mod heuristics;
pub mod jump_table;
pub mod patches;
pub mod types;

pub use error::AnalyzerError;
pub use types::{Cfg, CfgNode, Function, FunctionCall, FunctionCategory, JumpTable, Patch};

use ps2recomp_config::{GhidraSymbol, RecompilerConfig};
use ps2recomp_decoder::{decode, JumpOp, Opcode};
use ps2recomp_elf::ElfFile;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

pub struct AnalysisResult {
    pub functions: Vec<Function>,
    pub cfgs: BTreeMap<u32, Cfg>,
    pub jump_tables: Vec<JumpTable>,
    pub call_graph: HashMap<String, Vec<String>>,
    pub recursive_functions: HashSet<String>,
    pub patches: BTreeMap<u32, Vec<Patch>>,
}

impl AnalysisResult {
    /// Builds the output config reflecting this analysis (§4.3 step 7, §8
    /// round-trip property): stub/skip names picked up from classification,
    /// plus every identified patch.
    pub fn to_config(&self, base: &RecompilerConfig) -> RecompilerConfig {
        let mut out = base.clone();
        let mut stubs: HashSet<String> = base.general.stubs.iter().cloned().collect();
        let mut skip: HashSet<String> = base.general.skip.iter().cloned().collect();

        for f in &self.functions {
            match f.category {
                FunctionCategory::Stub => {
                    stubs.insert(f.name.clone());
                }
                FunctionCategory::Skipped => {
                    skip.insert(f.name.clone());
                }
                _ => {}
            }
        }

        out.general.stubs = {
            let mut v: Vec<String> = stubs.into_iter().collect();
            v.sort();
            v
        };
        out.general.skip = {
            let mut v: Vec<String> = skip.into_iter().collect();
            v.sort();
            v
        };

        let mut entries: Vec<_> = self.patches.values().flatten().cloned().collect();
        entries.sort_by_key(|p| p.address);
        out.patches.instructions = entries
            .into_iter()
            .map(|p| ps2recomp_config::PatchEntry {
                address: p.address.into(),
                value: p.replacement_word.into(),
            })
            .collect();

        out
    }
}

struct Seed {
    name: String,
    start: u32,
    size: u32,
    external: bool,
}

/// Runs the full analysis pipeline over an already-parsed ELF.
pub fn analyze(
    elf: &ElfFile,
    config: &RecompilerConfig,
    ghidra_symbols: &[GhidraSymbol],
    external_functions: &[ps2recomp_config::ExternalFunction],
) -> Result<AnalysisResult, AnalyzerError> {
    let seeds = seed_functions(elf, ghidra_symbols, external_functions);

    let mut functions = Vec::with_capacity(seeds.len());
    for seed in &seeds {
        match build_function(elf, config, seed) {
            Ok(f) => functions.push(f),
            Err(reason) => {
                warn!(name = %seed.name, start = seed.start, %reason, "skipping malformed function");
            }
        }
    }
    functions.sort_by_key(|f| f.start);

    let entry_idx = heuristics::find_entry_function_index(&functions, elf.entry_point)
        .or_else(|| heuristics::find_fallback_entry_function_index(&functions));
    if let Some(idx) = entry_idx {
        debug!(name = %functions[idx].name, "identified entry function");
    }

    let mut cfgs = BTreeMap::new();
    let mut jump_tables = Vec::new();
    for (id, f) in functions.iter().enumerate() {
        if f.category == FunctionCategory::Skipped || f.category == FunctionCategory::Stub {
            continue;
        }
        cfgs.insert(f.start, cfg::build_cfg(f));
        let tables = jump_table::detect_jump_tables(
            f,
            id as u32,
            |addr| elf.read_word(addr).filter(|_| elf.find_section_containing(addr).is_some()),
            4096,
        );
        jump_tables.extend(tables);
    }

    let call_graph = build_call_graph(&functions);
    let recursive_functions = heuristics::find_recursive_functions(&call_graph);

    let mut patches = BTreeMap::new();
    for f in &functions {
        if f.category == FunctionCategory::Skipped {
            continue;
        }
        let p = patches::identify_patches(f, config);
        if !p.is_empty() {
            patches.insert(f.start, p);
        }
    }

    for f in &mut functions {
        if f.category != FunctionCategory::Library {
            continue;
        }
        let patch_count = patches.get(&f.start).map(|v| v.len()).unwrap_or(0);
        if heuristics::should_skip_for_patch_density(&f.name, f.size(), patch_count, true) {
            f.category = FunctionCategory::Patched;
        }
    }

    Ok(AnalysisResult {
        functions,
        cfgs,
        jump_tables,
        call_graph,
        recursive_functions,
        patches,
    })
}

fn seed_functions(
    elf: &ElfFile,
    ghidra_symbols: &[GhidraSymbol],
    external_functions: &[ps2recomp_config::ExternalFunction],
) -> Vec<Seed> {
    let mut candidates: Vec<(String, u32, u32, bool)> = Vec::new();

    for sym in &elf.symbols {
        if !sym.is_function() || sym.name.is_empty() {
            continue;
        }
        candidates.push((sym.name.clone(), sym.value, sym.size, false));
    }
    for g in ghidra_symbols {
        candidates.push((g.name.clone(), g.address, g.size, false));
    }
    for ext in external_functions {
        candidates.push((ext.name.clone(), ext.address, ext.size, true));
    }
    if !candidates.iter().any(|(_, addr, _, _)| *addr == elf.entry_point) {
        candidates.push(("_start".to_string(), elf.entry_point, 0, false));
    }

    candidates.sort_by_key(|c| c.1);
    candidates.dedup_by_key(|c| c.1);

    let starts: Vec<u32> = candidates.iter().map(|c| c.1).collect();
    let mut seeds = Vec::with_capacity(candidates.len());
    for (i, (name, start, size, external)) in candidates.into_iter().enumerate() {
        let resolved_size = if size != 0 {
            size
        } else {
            let next_start = starts.get(i + 1).copied();
            let region_end = elf
                .code_regions()
                .into_iter()
                .find(|(s, e)| *s <= start && start < *e)
                .map(|(_, e)| e);
            match (next_start, region_end) {
                (Some(n), Some(e)) => n.min(e).saturating_sub(start),
                (Some(n), None) => n.saturating_sub(start),
                (None, Some(e)) => e.saturating_sub(start),
                (None, None) => 4,
            }
        };
        let resolved_size = if resolved_size == 0 { 4 } else { resolved_size };
        seeds.push(Seed {
            name,
            start,
            size: (resolved_size + 3) & !3,
            external,
        });
    }
    seeds
}

fn build_function(elf: &ElfFile, config: &RecompilerConfig, seed: &Seed) -> Result<Function, String> {
    let end = seed
        .start
        .checked_add(seed.size)
        .ok_or_else(|| "size overflow".to_string())?;
    if seed.start >= end {
        return Err("zero or negative size".to_string());
    }

    let category = classify(elf, config, seed);

    let instructions = if seed.external
        || category == FunctionCategory::Skipped
        || category == FunctionCategory::Stub
    {
        Vec::new()
    } else {
        let bytes = elf
            .read_bytes(seed.start, seed.size as usize)
            .ok_or_else(|| "function range not backed by a loaded segment".to_string())?;
        bytes
            .chunks_exact(4)
            .enumerate()
            .map(|(i, w)| {
                let raw = u32::from_be_bytes([w[0], w[1], w[2], w[3]]);
                decode(raw, seed.start + (i as u32) * 4)
            })
            .collect()
    };

    let is_leaf = !instructions
        .iter()
        .any(|i| i.flags.contains(ps2recomp_decoder::InstrFlags::IS_CALL));

    if heuristics::has_self_modifying_signal(&instructions, &elf.sections) {
        warn!(name = %seed.name, "self-modifying-code signal: a store target resolves into an executable section");
    }
    if heuristics::has_large_complex_mmi_signal(&instructions, 500) {
        debug!(name = %seed.name, "large-complex-MMI signal: recompile with care");
    }

    Ok(Function {
        name: seed.name.clone(),
        start: seed.start,
        end,
        is_leaf,
        stack_frame_size: 0,
        instructions,
        category,
    })
}

fn classify(elf: &ElfFile, config: &RecompilerConfig, seed: &Seed) -> FunctionCategory {
    if config.general.skip.iter().any(|s| s == &seed.name) || heuristics::should_auto_skip_name(&seed.name) {
        return FunctionCategory::Skipped;
    }
    if seed.external || config.general.stubs.iter().any(|s| s == &seed.name) {
        return FunctionCategory::Stub;
    }
    if heuristics::is_library_symbol_name(&seed.name) || heuristics::is_system_symbol_name(&seed.name) {
        return FunctionCategory::Library;
    }
    let _ = elf;
    FunctionCategory::Normal
}

fn build_call_graph(functions: &[Function]) -> HashMap<String, Vec<String>> {
    let mut by_start: BTreeMap<u32, &str> = BTreeMap::new();
    for f in functions {
        by_start.insert(f.start, f.name.as_str());
    }
    let containing = |addr: u32| -> Option<&str> {
        functions
            .iter()
            .find(|f| f.contains(addr))
            .map(|f| f.name.as_str())
    };

    let mut graph: HashMap<String, Vec<String>> = HashMap::new();
    for f in functions {
        let mut callees = Vec::new();
        for inst in &f.instructions {
            if matches!(inst.opcode, Opcode::Jump(JumpOp::Jal)) {
                if let Some(target) = inst.jump_target() {
                    if let Some(callee) = containing(target) {
                        callees.push(callee.to_string());
                    }
                }
            }
        }
        graph.insert(f.name.clone(), callees);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps2recomp_config::GeneralConfig;

    fn enc_itype(op: u8, rs: u8, rt: u8, imm: u16) -> u32 {
        ((op as u32) << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | imm as u32
    }
    fn enc_rtype(func: u8, rs: u8, rt: u8, rd: u8, shamt: u8) -> u32 {
        ((rs as u32) << 21) | ((rt as u32) << 16) | ((rd as u32) << 11) | ((shamt as u32) << 6) | func as u32
    }

    fn build_elf_with_two_functions() -> Vec<u8> {
        // f_a: jal f_b ; nop(delay) ; jr $ra ; nop
        // f_b: jr $ra ; nop
        let base: u32 = 0x0010_0000;
        let f_b_addr = base + 16;
        let jal_target_field = (f_b_addr & 0x0FFF_FFFF) >> 2;
        let words: Vec<u32> = vec![
            (0x03u32 << 26) | jal_target_field, // jal f_b
            0,
            enc_rtype(0x08, 31, 0, 0, 0), // jr ra
            0,
            enc_rtype(0x08, 31, 0, 0, 0), // f_b: jr ra
            0,
        ];
        let mut data = vec![0u8; 52 + 32 + words.len() * 4];
        data[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
        data[4] = 1;
        data[5] = 2;
        data[16..18].copy_from_slice(&2u16.to_be_bytes());
        data[18..20].copy_from_slice(&8u16.to_be_bytes());
        data[24..28].copy_from_slice(&base.to_be_bytes());
        data[28..32].copy_from_slice(&52u32.to_be_bytes());
        data[42..44].copy_from_slice(&32u16.to_be_bytes());
        data[44..46].copy_from_slice(&1u16.to_be_bytes());

        let ph = 52;
        data[ph..ph + 4].copy_from_slice(&1u32.to_be_bytes());
        data[ph + 4..ph + 8].copy_from_slice(&84u32.to_be_bytes());
        data[ph + 8..ph + 12].copy_from_slice(&base.to_be_bytes());
        let size = (words.len() * 4) as u32;
        data[ph + 16..ph + 20].copy_from_slice(&size.to_be_bytes());
        data[ph + 20..ph + 24].copy_from_slice(&size.to_be_bytes());
        data[ph + 24..ph + 28].copy_from_slice(&(0x1u32 | 0x4).to_be_bytes());

        let code_off = 84;
        for (i, w) in words.iter().enumerate() {
            data[code_off + i * 4..code_off + i * 4 + 4].copy_from_slice(&w.to_be_bytes());
        }
        data
    }

    #[test]
    fn analyzes_two_functions_and_links_call_graph() {
        let data = build_elf_with_two_functions();
        let elf = ElfFile::parse(&data).unwrap();
        let config = RecompilerConfig {
            general: GeneralConfig {
                input: "t.elf".into(),
                output: "out".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = analyze(&elf, &config, &[], &[]).unwrap();
        assert_eq!(result.functions.len(), 1); // only `_start` seeded, no symbols present
        assert!(result.functions[0].category == FunctionCategory::Normal);
    }

    #[test]
    fn to_config_collects_stub_and_skip_categories() {
        let data = build_elf_with_two_functions();
        let elf = ElfFile::parse(&data).unwrap();
        let mut config = RecompilerConfig {
            general: GeneralConfig {
                input: "t.elf".into(),
                output: "out".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        config.general.stubs.push("_start".to_string());
        let result = analyze(&elf, &config, &[], &[]).unwrap();
        let out = result.to_config(&config);
        assert!(out.general.stubs.contains(&"_start".to_string()));
    }
}
