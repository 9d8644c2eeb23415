//! CLINT register model.
//!
//! `mtime` advances with the machine clock; `mtimecmp` is written one
//! 32-bit half at a time, exactly as the bus exposes it, so a driver that
//! updates the halves in the wrong order sees the resulting spurious
//! compare match.

use corebench_hw::mmio::clint::{MTIMECMP_RESET, registers as hw_regs};
use tracing::{instrument, trace, warn};

#[derive(Debug)]
pub struct ClintState {
    mtime: u64,
    mtimecmp: u64,
}

impl ClintState {
    #[expect(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Clock preset to `mtime`, e.g. just below a low-half rollover
    pub fn starting_at(mtime: u64) -> Self {
        Self {
            mtime,
            mtimecmp: MTIMECMP_RESET,
        }
    }

    pub fn advance(&mut self, cycles: u64) {
        self.mtime = self.mtime.wrapping_add(cycles);
    }

    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    pub fn mtimecmp(&self) -> u64 {
        self.mtimecmp
    }

    /// `mip.MTIP`
    pub fn pending(&self) -> bool {
        self.mtime >= self.mtimecmp
    }

    #[instrument(level = "trace", skip(self))]
    pub fn read(&self, offset: u32) -> u32 {
        let value = match offset {
            hw_regs::MTIME_LO => self.mtime as u32,
            hw_regs::MTIME_HI => (self.mtime >> 32) as u32,
            hw_regs::MTIMECMP_LO => self.mtimecmp as u32,
            hw_regs::MTIMECMP_HI => (self.mtimecmp >> 32) as u32,
            _ => {
                warn!("Unknown CLINT register read: offset={:#X}", offset);
                0
            }
        };
        trace!("CLINT read: offset={:#X}, value={:#X}", offset, value);
        value
    }

    #[instrument(level = "trace", skip(self))]
    pub fn write(&mut self, offset: u32, value: u32) {
        trace!("CLINT write: offset={:#X}, value={:#X}", offset, value);
        let value = u64::from(value);
        match offset {
            hw_regs::MTIME_LO => self.mtime = (self.mtime & !0xFFFF_FFFF) | value,
            hw_regs::MTIME_HI => self.mtime = (self.mtime & 0xFFFF_FFFF) | (value << 32),
            hw_regs::MTIMECMP_LO => self.mtimecmp = (self.mtimecmp & !0xFFFF_FFFF) | value,
            hw_regs::MTIMECMP_HI => {
                self.mtimecmp = (self.mtimecmp & 0xFFFF_FFFF) | (value << 32)
            }
            _ => warn!(
                "Unknown CLINT register write: offset={:#X}, value={:#X}",
                offset, value
            ),
        }
    }
}
