//! Core-local interruptor: free-running 64-bit `mtime` and the single
//! `mtimecmp` deadline, each exposed as two 32-bit halves.

/// CLINT MMIO region base address
pub const BASE: u32 = 0x0000_3000;

/// CLINT MMIO region end address (exclusive)
pub const END: u32 = 0x0000_3010;

/// CLINT register offsets (relative to `BASE`)
pub mod registers {
    /// `mtime[31:0]`
    pub const MTIME_LO: u32 = 0x00;
    /// `mtime[63:32]`
    pub const MTIME_HI: u32 = 0x04;
    /// `mtimecmp[31:0]`
    pub const MTIMECMP_LO: u32 = 0x08;
    /// `mtimecmp[63:32]`
    pub const MTIMECMP_HI: u32 = 0x0C;
}

/// Value of `mtimecmp` after reset (never fires)
pub const MTIMECMP_RESET: u64 = u64::MAX;
