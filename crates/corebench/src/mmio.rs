//! Memory-mapped peripherals of the simulated target.
//!
//! # Memory Map
//! - `0x00001000-0x00001040`: scratch registers
//! - `0x00002000-0x00002010`: GPIO (button, loopback, LEDs)
//! - `0x00003000-0x00003010`: CLINT (`mtime`, `mtimecmp`)

use corebench_hw::memory_map::scratch;
use corebench_hw::mmio::{clint as hw_clint, gpio as hw_gpio};
use corebench_hw::specs::csr;

pub mod clint;
pub mod generic;
pub mod gpio;

pub use clint::ClintState;
pub use generic::ScratchRegs;
pub use gpio::{BounceConfig, GpioState};

#[derive(Debug)]
pub struct Peripherals {
    pub clint: ClintState,
    pub gpio: GpioState,
    pub scratch: ScratchRegs,
}

impl Peripherals {
    pub fn new(bounce: BounceConfig) -> Self {
        Self {
            clint: ClintState::new(),
            gpio: GpioState::new(bounce),
            scratch: ScratchRegs::default(),
        }
    }

    /// Moves every peripheral `cycles` clock ticks forward.
    pub fn advance(&mut self, cycles: u64) {
        self.clint.advance(cycles);
        self.gpio.advance(self.clint.mtime());
    }

    /// Pending interrupt bits as seen in `mip`
    pub fn mip(&self) -> u32 {
        let mut mip = 0;
        if self.clint.pending() {
            mip |= csr::MTI;
        }
        if self.gpio.line() {
            mip |= csr::MEI;
        }
        mip
    }

    /// `None` for an address no peripheral decodes
    pub fn read(&mut self, addr: u32) -> Option<u32> {
        match addr {
            hw_clint::BASE..hw_clint::END => Some(self.clint.read(addr - hw_clint::BASE)),
            hw_gpio::BASE..hw_gpio::END => Some(self.gpio.read(addr - hw_gpio::BASE)),
            scratch::BASE..scratch::END => Some(self.scratch.read(addr - scratch::BASE)),
            _ => None,
        }
    }

    /// `false` for an address no peripheral decodes
    pub fn write(&mut self, addr: u32, value: u32) -> bool {
        match addr {
            hw_clint::BASE..hw_clint::END => self.clint.write(addr - hw_clint::BASE, value),
            hw_gpio::BASE..hw_gpio::END => {
                let now = self.clint.mtime();
                self.gpio.write(addr - hw_gpio::BASE, value, now)
            }
            scratch::BASE..scratch::END => self.scratch.write(addr - scratch::BASE, value),
            _ => return false,
        }
        true
    }
}
