//! Time accounting for the simulated hart.
//!
//! The machine has no instruction decoder; firmware code runs natively and
//! only its observable actions (instructions retired, bus accesses, trap
//! entries, sleeps) are charged clock ticks here.

use corebench_hw::specs::timing;

/// Clock ticks per busy-loop instruction
pub const CYCLES_PER_INSTRUCTION: u64 = 4;

/// Clock ticks per MMIO or memory access
pub const MMIO_ACCESS_CYCLES: u64 = 1;

/// Clock ticks from interrupt acceptance to the first handler instruction
pub const TRAP_ENTRY_CYCLES: u64 = 8;

/// Longest `wfi` sleep, in instructions
pub const WFI_QUANTUM: u32 = timing::IRQ_TIMEOUT;

/// How a `wfi` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepResult {
    /// An enabled interrupt became pending
    Woke,
    /// Nothing arrived within the quantum
    QuantumElapsed,
}

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub cycles_per_instruction: u64,
    pub mmio_access_cycles: u64,
    pub trap_entry_cycles: u64,
    pub wfi_quantum: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycles_per_instruction: CYCLES_PER_INSTRUCTION,
            mmio_access_cycles: MMIO_ACCESS_CYCLES,
            trap_entry_cycles: TRAP_ENTRY_CYCLES,
            wfi_quantum: WFI_QUANTUM,
        }
    }
}

#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    total_cycles: u64,
    idle_cycles: u64,
    traps: u64,
    sleeps: u64,
    empty_sleeps: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            total_cycles: 0,
            idle_cycles: 0,
            traps: 0,
            sleeps: 0,
            empty_sleeps: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn charge(&mut self, cycles: u64) {
        self.total_cycles += cycles;
    }

    pub fn charge_idle(&mut self, cycles: u64) {
        self.total_cycles += cycles;
        self.idle_cycles += cycles;
    }

    pub fn record_trap(&mut self) {
        self.traps += 1;
    }

    pub fn record_sleep(&mut self, result: SleepResult) {
        self.sleeps += 1;
        if result == SleepResult::QuantumElapsed {
            self.empty_sleeps += 1;
        }
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn idle_cycles(&self) -> u64 {
        self.idle_cycles
    }

    pub fn traps(&self) -> u64 {
        self.traps
    }

    pub fn sleeps(&self) -> u64 {
        self.sleeps
    }

    pub fn empty_sleeps(&self) -> u64 {
        self.empty_sleeps
    }

    /// Wall-clock time the charged cycles represent on the real core
    pub fn simulated_seconds(&self) -> f64 {
        self.total_cycles as f64 / timing::CORE_HZ as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting() {
        let mut scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.charge(10);
        scheduler.charge_idle(40);
        scheduler.record_trap();
        scheduler.record_sleep(SleepResult::Woke);
        scheduler.record_sleep(SleepResult::QuantumElapsed);
        assert_eq!(scheduler.total_cycles(), 50);
        assert_eq!(scheduler.idle_cycles(), 40);
        assert_eq!(scheduler.traps(), 1);
        assert_eq!(scheduler.sleeps(), 2);
        assert_eq!(scheduler.empty_sleeps(), 1);
    }

    #[test]
    fn test_simulated_seconds() {
        let mut scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.charge(timing::CORE_HZ / 2);
        assert!((scheduler.simulated_seconds() - 0.5).abs() < 1e-9);
    }
}
