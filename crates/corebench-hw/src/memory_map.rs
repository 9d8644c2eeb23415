//! Address map of the single-core test target.
//!
//! All memories are word-organised; the loader protocol addresses them in
//! 32-bit words, the core addresses them in bytes.

/// Instruction memory (BRAM, fetched one 32-bit word at a time)
pub mod imem {
    /// IMEM base address
    pub const BASE: u32 = 0x0000_0000;
    /// IMEM size in 32-bit words
    pub const WORDS: usize = 1024;
    /// Any bit in this mask set means the address is outside IMEM
    pub const OUT_OF_RANGE_MASK: u32 = 0xFFFF_F000;
    /// Trap vector programmed into `mtvec` (direct mode)
    pub const TRAP_VECTOR: u32 = 0x0000_0010;
}

/// Data memory
pub mod dmem {
    /// DMEM base address
    pub const BASE: u32 = 0x1000_0000;
    /// DMEM size in 32-bit words
    pub const WORDS: usize = 1024;
}

/// Scratch register file used by the stress loop
pub mod scratch {
    /// Scratch register base address
    pub const BASE: u32 = 0x0000_1000;
    /// Number of 32-bit scratch registers
    pub const COUNT: usize = 16;
    /// End of the scratch region (exclusive)
    pub const END: u32 = BASE + (COUNT as u32) * 4;
}

/// Diagnostics block written by the firmware at the start of DMEM.
///
/// The layout is a fixed contract with the host loader and test benches.
pub mod result {
    /// Byte address of word 0
    pub const BASE: u32 = super::dmem::BASE;
    /// Number of words in the block (words 1.. are cleared at start-up)
    pub const WORDS: usize = 16;

    /// Status word: `OK_FLAG` or `ERR_FLAG | code`
    pub const STATUS: usize = 0;
    /// Total interrupt dispatches
    pub const IRQ_COUNT: usize = 1;
    /// bad cause (lo16) | nested entries (hi16)
    pub const CAUSE_NESTED: usize = 2;
    /// MIE seen in handler (lo16) | misaligned mepc (hi16)
    pub const MIE_ALIGN: usize = 3;
    /// out-of-range mepc (lo16) | delta samples (hi16)
    pub const RANGE_SAMPLES: usize = 4;
    /// Last mcause
    pub const LAST_MCAUSE: usize = 5;
    /// Last mepc
    pub const LAST_MEPC: usize = 6;
    /// Minimum inter-interrupt delta
    pub const DELTA_MIN: usize = 7;
    /// Maximum inter-interrupt delta
    pub const DELTA_MAX: usize = 8;
    /// External interrupt dispatches
    pub const EXT_COUNT: usize = 9;
    /// Ticks generated
    pub const TICK_TOTAL: usize = 10;
    /// Button events generated
    pub const BUTTON_TOTAL: usize = 11;
    /// last GPIO status (lo16) | last source pin (hi16)
    pub const LAST_GPIO: usize = 12;
    /// First-cause latch
    pub const FIRST_CAUSE: usize = 13;
    /// Edges acknowledged while settling
    pub const IGNORED_EDGES: usize = 14;
}
