//! Simulated single-hart target.
//!
//! [`Machine`] is the [`Platform`] the bench firmware runs on. Every
//! firmware action is charged to the clock through the [`Scheduler`], and
//! pending interrupts are delivered at instruction boundaries, one trap per
//! boundary.

use corebench_hw::memory_map::dmem;
use tracing::{trace, warn};

use crate::firmware::platform::{Csr, Platform, TrapHandler};
use crate::firmware::wait;
use crate::hart::{Hart, HartFaults};
use crate::memory::Memory;
use crate::mmio::{BounceConfig, Peripherals};
use crate::scheduler::{Scheduler, SchedulerConfig, SleepResult};

#[derive(Debug, Clone, Default)]
pub struct MachineConfig {
    pub scheduler: SchedulerConfig,
    pub bounce: BounceConfig,
    pub faults: HartFaults,
}

#[derive(Debug)]
pub struct Machine {
    hart: Hart,
    peripherals: Peripherals,
    memory: Memory,
    scheduler: Scheduler,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            hart: Hart::new(config.faults),
            peripherals: Peripherals::new(config.bounce),
            memory: Memory::new(),
            scheduler: Scheduler::new(config.scheduler),
        }
    }

    pub fn hart(&self) -> &Hart {
        &self.hart
    }

    pub fn peripherals(&self) -> &Peripherals {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals {
        &mut self.peripherals
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current clock, read directly
    pub fn now(&self) -> u64 {
        self.peripherals.clint.mtime()
    }

    /// Bench presses the button at absolute time `at` for `hold` ticks.
    pub fn schedule_press(&mut self, at: u64, hold: u64) {
        self.peripherals.gpio.schedule_press(at, hold);
    }

    /// Words of the diagnostics block as currently in DMEM
    pub fn dmem_words(&self, count: usize) -> &[u32] {
        let dmem = self.memory.dmem();
        &dmem[..count.min(dmem.len())]
    }

    fn elapse(&mut self, cycles: u64) {
        self.scheduler.charge(cycles);
        self.peripherals.advance(cycles);
    }

    fn mip(&self) -> u32 {
        self.peripherals.mip()
    }

    /// Interrupt the hart would take at the next boundary
    pub fn pending_cause(&self) -> Option<u32> {
        self.hart.select(self.mip())
    }

    /// Enters a trap with `mcause`, runs `handler` and returns with `mret`.
    pub fn trap<H: TrapHandler<Self>>(&mut self, mcause: u32, handler: &mut H) {
        let cycles = self.scheduler.config().trap_entry_cycles;
        self.elapse(cycles);
        trace!(mcause = format!("0x{mcause:08x}"), now = self.now(), "trap entry");
        let resume = self.hart.enter_trap(mcause);
        handler.on_trap(self);
        self.hart.mret(resume);
        self.scheduler.record_trap();
    }
}

impl Platform for Machine {
    fn csr_read(&mut self, csr: Csr) -> u32 {
        let value = self.hart.read_csr(csr, self.mip());
        self.elapse(self.scheduler.config().cycles_per_instruction);
        value
    }

    fn csr_write(&mut self, csr: Csr, value: u32) {
        self.hart.write_csr(csr, value);
        self.elapse(self.scheduler.config().cycles_per_instruction);
    }

    fn read32(&mut self, addr: u32) -> u32 {
        let value = match self.memory.read(addr) {
            Some(value) => value,
            None => self.peripherals.read(addr).unwrap_or_else(|| {
                warn!("Unmapped read: addr={:#X}", addr);
                0
            }),
        };
        self.elapse(self.scheduler.config().mmio_access_cycles);
        value
    }

    fn write32(&mut self, addr: u32, value: u32) {
        let handled = if self.memory.contains(addr) {
            self.memory.write(addr, value)
        } else {
            self.peripherals.write(addr, value)
        };
        if !handled && !self.memory.contains(addr) {
            warn!("Unmapped write: addr={:#X}, value={:#X}", addr, value);
        }
        if (dmem::BASE..dmem::BASE + 4).contains(&addr) {
            trace!("Status word written: {:#010X}", value);
        }
        self.elapse(self.scheduler.config().mmio_access_cycles);
    }

    fn retire<H: TrapHandler<Self>>(&mut self, handler: &mut H) {
        self.hart.retire();
        if let Some(mcause) = self.hart.take_exception() {
            self.trap(mcause, handler);
        } else if let Some(mcause) = self.pending_cause() {
            self.trap(mcause, handler);
        }
    }

    fn nop<H: TrapHandler<Self>>(&mut self, handler: &mut H) {
        self.elapse(self.scheduler.config().cycles_per_instruction);
        self.retire(handler);
    }

    fn wfi<H: TrapHandler<Self>>(&mut self, handler: &mut H) {
        let quantum = self.scheduler.config().wfi_quantum;
        let step = self.scheduler.config().cycles_per_instruction.max(1);
        let woke = wait::bounded(quantum, || {
            if self.hart.wake_pending(self.mip()) {
                return Some(());
            }
            self.scheduler.charge_idle(step);
            self.peripherals.advance(step);
            None
        });
        let result = match woke {
            Ok(()) => SleepResult::Woke,
            Err(_) => SleepResult::QuantumElapsed,
        };
        self.scheduler.record_sleep(result);
        self.retire(handler);
    }
}
