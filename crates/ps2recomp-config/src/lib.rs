//! The Configuration / TOML schema and external-function / Ghidra-CSV
//! import shared by the analyzer and the recompiler (§3 "Configuration",
//! §6 "Analyzer config (TOML)" / "External-functions JSON" / "Ghidra symbol
//! CSV").

mod error;
mod hexint;

pub use error::ConfigError;
pub use hexint::HexInt;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GeneralConfig {
    pub input: String,
    #[serde(default)]
    pub ghidra_output: Option<String>,
    pub output: String,
    #[serde(default)]
    pub functions_file: Option<String>,
    #[serde(default)]
    pub single_file_output: bool,
    #[serde(default = "default_true")]
    pub patch_syscalls: bool,
    #[serde(default = "default_true")]
    pub patch_cop0: bool,
    #[serde(default = "default_true")]
    pub patch_cache: bool,
    #[serde(default)]
    pub stubs: Vec<String>,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub force_recompile: Vec<HexInt>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PatchEntry {
    pub address: HexInt,
    pub value: HexInt,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PatchesSection {
    #[serde(default)]
    pub instructions: Vec<PatchEntry>,
}

/// `[general]` + `[patches]` + `[mmio]` (§6). `mmio` maps an *instruction*
/// address (the load/store that touches the MMIO register) to the MMIO
/// register address it resolves to, both written as `"0xHEX"` strings
/// because TOML table keys must be strings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RecompilerConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub patches: PatchesSection,
    #[serde(default)]
    pub mmio: BTreeMap<String, String>,
}

impl RecompilerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// The `[mmio]` table resolved to numeric addresses, skipping entries
    /// whose key or value does not parse as an integer.
    pub fn mmio_map(&self) -> BTreeMap<u32, u32> {
        self.mmio
            .iter()
            .filter_map(|(k, v)| {
                let key = HexInt::parse(k).ok()?.0;
                let val = HexInt::parse(v).ok()?.0;
                Some((key, val))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalFunction {
    pub name: String,
    pub address: u32,
    pub size: u32,
}

pub fn load_external_functions(path: impl AsRef<Path>) -> Result<Vec<ExternalFunction>, ConfigError> {
    let s = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&s)?)
}

/// A symbol imported from a Ghidra export CSV (`address,name[,size]`).
/// Malformed lines are skipped, matching §4.3 failure semantics ("one
/// malformed function is logged and skipped, not fatal").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhidraSymbol {
    pub address: u32,
    pub name: String,
    pub size: u32,
}

pub fn import_ghidra_csv(path: impl AsRef<Path>) -> Result<Vec<GhidraSymbol>, ConfigError> {
    let s = std::fs::read_to_string(path)?;
    Ok(parse_ghidra_csv(&s))
}

pub fn parse_ghidra_csv(s: &str) -> Vec<GhidraSymbol> {
    let mut out = Vec::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 2 {
            continue;
        }
        let Ok(HexInt(address)) = HexInt::parse(fields[0]) else {
            continue;
        };
        let name = fields[1].to_string();
        if name.is_empty() {
            continue;
        }
        let size = fields
            .get(2)
            .and_then(|s| HexInt::parse(s).ok())
            .map(|h| h.0)
            .unwrap_or(0);
        out.push(GhidraSymbol {
            address,
            name,
            size,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_toml_config() {
        let toml_src = r#"
[general]
input = "game.elf"
output = "out"
single_file_output = false
patch_syscalls = true
stubs = ["scePadRead"]
skip = ["known_broken_thread"]

[patches]
instructions = [
  { address = "0x00123456", value = "0x00000000" },
]

[mmio]
"0x00abcdef" = "0x10003800"
"#;
        let cfg = RecompilerConfig::from_toml_str(toml_src).unwrap();
        assert_eq!(cfg.general.input, "game.elf");
        assert_eq!(cfg.patches.instructions.len(), 1);
        assert_eq!(cfg.patches.instructions[0].address.0, 0x00123456);
        assert_eq!(cfg.mmio_map().get(&0x00abcdef), Some(&0x10003800));

        let written = cfg.to_toml_string().unwrap();
        let reparsed = RecompilerConfig::from_toml_str(&written).unwrap();
        assert_eq!(cfg, reparsed);
    }

    #[test]
    fn accepts_integer_forms_of_address_and_value() {
        let toml_src = r#"
[general]
input = "a.elf"
output = "out"

[patches]
instructions = [ { address = 1193046, value = 0 } ]
"#;
        let cfg = RecompilerConfig::from_toml_str(toml_src).unwrap();
        assert_eq!(cfg.patches.instructions[0].address.0, 1193046);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let toml_src = r#"
[general]
input = "a.elf"
output = "out"
some_future_key = true
"#;
        assert!(RecompilerConfig::from_toml_str(toml_src).is_ok());
    }

    #[test]
    fn ghidra_csv_skips_malformed_lines() {
        let csv = "0x1000,func_a\nnot_hex,func_b\n0x2000\n0x3000,func_c,0x20\n";
        let syms = parse_ghidra_csv(csv);
        assert_eq!(syms.len(), 2);
        assert_eq!(syms[0].name, "func_a");
        assert_eq!(syms[1].size, 0x20);
    }

    #[test]
    fn loads_external_functions_json() {
        let json = r#"[{"name":"memcpy","address":4096,"size":64}]"#;
        let funcs: Vec<ExternalFunction> = serde_json::from_str(json).unwrap();
        assert_eq!(funcs[0].address, 4096);
    }
}
