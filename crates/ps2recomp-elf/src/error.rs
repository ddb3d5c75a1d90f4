use thiserror::Error;

/// Errors surfaced by [`crate::ElfFile::parse`].
///
/// These are fatal to the pipeline per spec §7: the caller aborts rather
/// than trying to recover from a malformed container.
#[derive(Debug, Error)]
pub enum ElfError {
    #[error("not a valid ELF32 big-endian MIPS executable: {0}")]
    InvalidElf(&'static str),

    #[error("truncated ELF: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("I/O error reading ELF: {0}")]
    Io(#[from] std::io::Error),
}
