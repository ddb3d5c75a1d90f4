use bitflags::bitflags;

bitflags! {
    /// Per-instruction flags (§3 "Instruction" `flags` field).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstrFlags: u16 {
        const IS_BRANCH       = 1 << 0;
        const IS_JUMP         = 1 << 1;
        const IS_CALL         = 1 << 2;
        const IS_RETURN       = 1 << 3;
        const HAS_DELAY_SLOT  = 1 << 4;
        const IS_MMI          = 1 << 5;
        const IS_COP1         = 1 << 6;
        const IS_COP2         = 1 << 7;
        const READS_MEMORY    = 1 << 8;
        const WRITES_MEMORY   = 1 << 9;
        const MODIFIES_PC     = 1 << 10;
    }
}
