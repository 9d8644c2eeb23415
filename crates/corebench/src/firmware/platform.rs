//! The seam between firmware logic and the hart it runs on.
//!
//! Firmware never does address arithmetic on its own. Registers are reached
//! through the typed accessors in this module (and [`super::deadline`]),
//! which carry the access protocol of each peripheral.

use corebench_hw::mmio::gpio::{self, pins, registers as regs};
use corebench_hw::specs::csr;

/// Machine-mode CSRs used by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Csr {
    Mstatus,
    Mie,
    Mtvec,
    Mepc,
    Mcause,
    Mip,
}

impl Csr {
    /// CSR number as encoded in `csrr`/`csrw`
    pub fn number(self) -> u16 {
        match self {
            Csr::Mstatus => csr::MSTATUS,
            Csr::Mie => csr::MIE,
            Csr::Mtvec => csr::MTVEC,
            Csr::Mepc => csr::MEPC,
            Csr::Mcause => csr::MCAUSE,
            Csr::Mip => csr::MIP,
        }
    }
}

/// Interrupt sources that have a local enable bit in `mie`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    External,
    Timer,
}

impl Source {
    pub fn mask(self) -> u32 {
        match self {
            Source::External => csr::MEI,
            Source::Timer => csr::MTI,
        }
    }
}

/// Code run by the hart on a trap, with the hart handed back to it.
pub trait TrapHandler<P: ?Sized> {
    fn on_trap(&mut self, platform: &mut P);
}

/// A single machine-mode hart with its memory-mapped peripherals.
///
/// Interrupts are only ever taken at an instruction boundary, which the
/// firmware reaches through [`Platform::retire`], [`Platform::nop`] and
/// [`Platform::wfi`]. The handler to run is passed in at that point.
pub trait Platform {
    fn csr_read(&mut self, csr: Csr) -> u32;
    fn csr_write(&mut self, csr: Csr, value: u32);

    /// `csrs`
    fn csr_set(&mut self, csr: Csr, mask: u32) {
        let value = self.csr_read(csr);
        self.csr_write(csr, value | mask);
    }

    /// `csrc`
    fn csr_clear(&mut self, csr: Csr, mask: u32) {
        let value = self.csr_read(csr);
        self.csr_write(csr, value & !mask);
    }

    fn read32(&mut self, addr: u32) -> u32;
    fn write32(&mut self, addr: u32, value: u32);

    /// Ends the current instruction; a pending enabled interrupt is taken
    /// before the next one starts.
    fn retire<H: TrapHandler<Self>>(&mut self, handler: &mut H)
    where
        Self: Sized;

    /// One busy-loop iteration.
    fn nop<H: TrapHandler<Self>>(&mut self, handler: &mut H)
    where
        Self: Sized;

    /// Low-power wait until any locally enabled interrupt is pending.
    fn wfi<H: TrapHandler<Self>>(&mut self, handler: &mut H)
    where
        Self: Sized;
}

/// GPIO block accessor
pub struct Gpio<'a, P> {
    platform: &'a mut P,
}

impl<'a, P: Platform> Gpio<'a, P> {
    pub fn new(platform: &'a mut P) -> Self {
        Self { platform }
    }

    fn read(&mut self, offset: u32) -> u32 {
        self.platform.read32(gpio::BASE + offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        self.platform.write32(gpio::BASE + offset, value);
    }

    /// Current input levels
    pub fn levels(&mut self) -> u32 {
        self.read(regs::DATA_IN)
    }

    pub fn is_pressed(&mut self) -> bool {
        self.levels() & pins::BUTTON != 0
    }

    /// Latched rising edges
    pub fn status(&mut self) -> u32 {
        self.read(regs::IRQ_STATUS)
    }

    /// Clears the latched edges in `mask`
    pub fn acknowledge(&mut self, mask: u32) {
        self.write(regs::IRQ_STATUS, mask);
    }

    pub fn irq_enabled(&mut self) -> u32 {
        self.read(regs::IRQ_ENABLE)
    }

    pub fn enable_irq(&mut self, mask: u32) {
        let enabled = self.irq_enabled();
        self.write(regs::IRQ_ENABLE, enabled | mask);
    }

    pub fn disable_irq(&mut self, mask: u32) {
        let enabled = self.irq_enabled();
        self.write(regs::IRQ_ENABLE, enabled & !mask);
    }

    /// Drives the output pins in `mask` high or low
    pub fn drive(&mut self, mask: u32, high: bool) {
        let out = self.read(regs::DATA_OUT);
        let out = if high { out | mask } else { out & !mask };
        self.write(regs::DATA_OUT, out);
    }

    pub fn set_leds(&mut self, value: u8) {
        let out = self.read(regs::DATA_OUT) & !pins::LED_MASK;
        self.write(regs::DATA_OUT, out | (u32::from(value) << pins::LED_SHIFT));
    }
}
