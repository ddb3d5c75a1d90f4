#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("elf error: {0}")]
    Elf(#[from] ps2recomp_elf::ElfError),
    #[error("config error: {0}")]
    Config(#[from] ps2recomp_config::ConfigError),
    #[error("malformed function {name:?} at {start:#010x}: {reason}")]
    MalformedFunction {
        name: String,
        start: u32,
        reason: String,
    },
}
