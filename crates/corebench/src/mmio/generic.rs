//! Scratch register file.
//!
//! Sixteen plain read/write words with no side effects; the stress loop
//! uses them to put MMIO traffic on the bus while interrupts fire.

use corebench_hw::memory_map::scratch;
use tracing::{instrument, trace};

#[derive(Debug, Default)]
pub struct ScratchRegs {
    regs: [u32; scratch::COUNT],
}

impl ScratchRegs {
    #[instrument(level = "trace", skip(self))]
    pub fn read(&self, offset: u32) -> u32 {
        self.regs[(offset as usize / 4) % scratch::COUNT]
    }

    #[instrument(level = "trace", skip(self))]
    pub fn write(&mut self, offset: u32, value: u32) {
        trace!("Scratch write: offset={:#X}, value={:#X}", offset, value);
        self.regs[(offset as usize / 4) % scratch::COUNT] = value;
    }
}
