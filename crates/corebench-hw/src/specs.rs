/// Machine-mode CSR numbers and bit positions
pub mod csr {
    pub const MSTATUS: u16 = 0x300;
    pub const MIE: u16 = 0x304;
    pub const MTVEC: u16 = 0x305;
    pub const MEPC: u16 = 0x341;
    pub const MCAUSE: u16 = 0x342;
    pub const MIP: u16 = 0x344;

    /// `mstatus.MIE`: global machine interrupt enable
    pub const MSTATUS_MIE: u32 = 1 << 3;
    /// `mstatus.MPIE`: MIE value before the last trap
    pub const MSTATUS_MPIE: u32 = 1 << 7;

    /// `mie.MTIE` / `mip.MTIP`
    pub const MTI: u32 = 1 << 7;
    /// `mie.MEIE` / `mip.MEIP`
    pub const MEI: u32 = 1 << 11;
}

/// `mcause` values
pub mod cause {
    /// Interrupt flag (bit 31)
    pub const INTERRUPT: u32 = 1 << 31;
    /// Machine timer interrupt
    pub const MACHINE_TIMER: u32 = INTERRUPT | 7;
    /// Machine external interrupt
    pub const MACHINE_EXTERNAL: u32 = INTERRUPT | 11;
}

/// Clocking and bench timing.
///
/// `mtime` advances once per core clock cycle.
pub mod timing {
    /// Core clock (FPGA board oscillator)
    pub const CORE_HZ: u64 = 50_000_000;
    /// Periodic tick period in clock ticks
    pub const TIMER_PERIOD: u32 = 3000;
    /// Spin budget for "interrupts must arrive" waits
    pub const IRQ_TIMEOUT: u32 = 2_500_000;
    /// Lead used when (re-)arming the first tick of a phase
    pub const ARM_LEAD: u32 = 64;
    /// Button settle window in clock ticks
    pub const DEBOUNCE_WINDOW: u32 = 5000;
    /// Scratch write/read iterations of the stress loop
    pub const STRESS_ITERATIONS: u32 = 2000;
}

/// Status sentinels written to the diagnostics block
pub mod status {
    /// Run passed
    pub const OK_FLAG: u32 = 0xDEAD_BEEF;
    /// Run failed; low 16 bits carry the code
    pub const ERR_FLAG: u32 = 0xBAD0_0000;
}

/// Failure codes reported as `ERR_FLAG | code`
pub mod codes {
    pub const BOTH_DISABLED: u16 = 0x0101;
    pub const LOCAL_ONLY: u16 = 0x0102;
    pub const GLOBAL_ENABLE: u16 = 0x0103;
    pub const GLOBAL_FROZEN: u16 = 0x0104;
    pub const GLOBAL_RESUME: u16 = 0x0105;
    pub const LOCAL_FROZEN: u16 = 0x0106;
    pub const LOCAL_RESUME: u16 = 0x0107;
    pub const PRIORITY_TIMEOUT: u16 = 0x0108;
    pub const PRIORITY_ORDER: u16 = 0x0109;
    pub const EXTERNAL_FROZEN: u16 = 0x010A;
    pub const EXTERNAL_RESUME: u16 = 0x010B;

    pub const BAD_CAUSE: u16 = 0x0201;
    pub const NESTED: u16 = 0x0202;
    pub const MIE_IN_HANDLER: u16 = 0x0203;
    pub const MEPC_ALIGN: u16 = 0x0204;
    pub const MEPC_RANGE: u16 = 0x0205;
    pub const DELTA_SAMPLES: u16 = 0x0206;
    pub const UNEXPECTED_TRAP: u16 = 0x0207;

    pub const DEBOUNCE_NO_EVENT: u16 = 0x0301;
    pub const DEBOUNCE_DOUBLE: u16 = 0x0302;
    pub const DEBOUNCE_GLITCH: u16 = 0x0303;
    pub const DEBOUNCE_TICK_STALL: u16 = 0x0304;
    pub const DEBOUNCE_REARM: u16 = 0x0305;

    pub const MONITOR_TIMEOUT: u16 = 0x0401;
}

/// Serial bootloader wire constants
pub mod loader {
    /// UART baud rate (fixed by the FPGA bootloader)
    pub const BAUD_RATE: u32 = 115_200;
    /// Addressable words (IMEM/DMEM window)
    pub const MAX_WORDS: u32 = 1024;
    /// Maximum data words per load transaction
    pub const CHUNK_WORDS: usize = 128;
    /// Per-word response timeout for reads
    pub const READ_TIMEOUT_MS: u64 = 1000;

    /// Header bit 31: 1 = load (host to target), 0 = read
    pub const DIR_LOAD: u32 = 1 << 31;
    /// Header bits 30..16: word address
    pub const ADDR_SHIFT: u32 = 16;
    pub const ADDR_MASK: u32 = 0x7FFF;
    /// Header bits 15..0: word count
    pub const COUNT_MASK: u32 = 0xFFFF;
}
