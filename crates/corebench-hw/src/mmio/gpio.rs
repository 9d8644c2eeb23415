/// GPIO MMIO region base address
pub const BASE: u32 = 0x0000_2000;

/// GPIO MMIO region end address (exclusive)
pub const END: u32 = 0x0000_2010;

/// GPIO register offsets (relative to `BASE`)
pub mod registers {
    /// Current input pin levels (read-only)
    pub const DATA_IN: u32 = 0x00;
    /// Output pin levels
    pub const DATA_OUT: u32 = 0x04;
    /// Per-pin rising-edge interrupt enable
    pub const IRQ_ENABLE: u32 = 0x08;
    /// Latched rising edges, write 1 to clear
    pub const IRQ_STATUS: u32 = 0x0C;
}

/// Pin assignments on the bench board
pub mod pins {
    /// Push button input (active high)
    pub const BUTTON: u32 = 1 << 0;
    /// Output pin wired back to `BUTTON` by the loopback jumper
    pub const LOOPBACK_OUT: u32 = 1 << 0;
    /// First LED output bit
    pub const LED_SHIFT: u32 = 8;
    /// LED output mask
    pub const LED_MASK: u32 = 0xFF << LED_SHIFT;
}
