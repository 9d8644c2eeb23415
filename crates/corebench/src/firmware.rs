//! Interrupt-driven bench firmware.
//!
//! Everything under this module is written against the [`Platform`] trait
//! only; it runs unchanged on the simulated [`crate::machine::Machine`] or
//! on any other hart that implements the trait.

pub mod deadline;
pub mod debounce;
pub mod monitor;
pub mod platform;
pub mod report;
pub mod shared;
pub mod suite;
pub mod tick;
pub mod trap;
pub mod wait;

use std::fmt;
use std::num::NonZeroU64;

use corebench_hw::memory_map::{imem, result};
use corebench_hw::mmio::gpio::pins;
use corebench_hw::specs::{csr, timing};
use tracing::{debug, error, info};

use deadline::timer;
use platform::{Csr, Gpio, Platform, Source};
use report::ResultBlock;
use shared::{Pending, SharedState};
use trap::{ExternalMode, TrapDispatcher};

/// A failed check, identified by its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure(pub u16);

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "check 0x{:04x} failed", self.0)
    }
}

impl std::error::Error for Failure {}

/// `Err(Failure(code))` unless `ok`
pub fn check(ok: bool, code: u16) -> Result<(), Failure> {
    if ok { Ok(()) } else { Err(Failure(code)) }
}

/// Firmware build-time parameters
#[derive(Debug, Clone)]
pub struct FirmwareConfig {
    /// Tick period in clock ticks
    pub period: u32,
    /// Button settle window in clock ticks
    pub debounce_window: u32,
    /// Budget of every bounded wait, in spin iterations
    pub irq_timeout: u32,
    /// Distance of the first deadline when (re-)arming the tick
    pub arm_lead: u32,
    pub stress_iterations: u32,
    /// Ticks the monitor runs for
    pub monitor_ticks: u32,
    pub external: ExternalMode,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            period: timing::TIMER_PERIOD,
            debounce_window: timing::DEBOUNCE_WINDOW,
            irq_timeout: timing::IRQ_TIMEOUT,
            arm_lead: timing::ARM_LEAD,
            stress_iterations: timing::STRESS_ITERATIONS,
            monitor_ticks: 50,
            external: ExternalMode::default(),
        }
    }
}

/// The firmware's view of the hart: the platform plus the installed trap
/// handler and the state it shares with the main line.
pub struct Kernel<P> {
    platform: P,
    dispatcher: TrapDispatcher,
    config: FirmwareConfig,
}

impl<P: Platform> Kernel<P> {
    pub fn new(platform: P, config: FirmwareConfig) -> Self {
        let period = NonZeroU64::new(u64::from(config.period)).unwrap_or(NonZeroU64::MIN);
        let shared = SharedState::new(period, u64::from(config.debounce_window));
        Self {
            platform,
            dispatcher: TrapDispatcher::new(shared, config.external),
            config,
        }
    }

    pub fn config(&self) -> &FirmwareConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn into_platform(self) -> P {
        self.platform
    }

    pub fn dispatcher(&self) -> &TrapDispatcher {
        &self.dispatcher
    }

    /// Inspection view of the shared state once the firmware has stopped.
    /// While it runs, the main line reads through [`Kernel::free`].
    pub fn shared(&self) -> &SharedState {
        self.dispatcher.shared()
    }

    /// Reset prologue: clears the diagnostics block, installs the trap
    /// vector and leaves every interrupt source masked.
    pub fn boot(&mut self) {
        for word in 1..result::WORDS as u32 {
            self.platform.write32(result::BASE + word * 4, 0);
        }
        self.platform.csr_write(Csr::Mtvec, imem::TRAP_VECTOR);
        self.platform.csr_clear(Csr::Mstatus, csr::MSTATUS_MIE);
        self.platform.csr_clear(Csr::Mie, csr::MTI | csr::MEI);

        let mut gpio = Gpio::new(&mut self.platform);
        gpio.disable_irq(pins::BUTTON);
        gpio.acknowledge(pins::BUTTON);

        let now = self.now();
        let shared = self.dispatcher.shared_mut();
        shared.tick.start(now);
        let next = shared.next_deadline();
        timer(&mut self.platform).set_deadline(next);
        info!(now, period = self.config.period, "booted");
    }

    pub fn now(&mut self) -> u64 {
        timer(&mut self.platform).now()
    }

    pub fn nop(&mut self) {
        self.platform.nop(&mut self.dispatcher);
    }

    pub fn wfi(&mut self) {
        self.platform.wfi(&mut self.dispatcher);
    }

    fn retire(&mut self) {
        self.platform.retire(&mut self.dispatcher);
    }

    /// `Err` once the handler has latched a fatal code
    pub fn halted(&mut self) -> Result<(), Failure> {
        match self.free(|shared, _| shared.fatal) {
            Some(code) => Err(Failure(code)),
            None => Ok(()),
        }
    }

    /// Busy-waits a fixed number of iterations.
    pub fn spin(&mut self, iterations: u32) -> Result<(), Failure> {
        for _ in 0..iterations {
            self.nop();
            self.halted()?;
        }
        Ok(())
    }

    /// Runs `f` with interrupts masked, restoring the previous global
    /// enable afterwards. An interrupt that became pending meanwhile is
    /// taken as soon as the enable is restored.
    pub fn free<R>(&mut self, f: impl FnOnce(&mut SharedState, &mut P) -> R) -> R {
        let was_enabled = self.platform.csr_read(Csr::Mstatus) & csr::MSTATUS_MIE != 0;
        self.platform.csr_clear(Csr::Mstatus, csr::MSTATUS_MIE);
        let result = f(self.dispatcher.shared_mut(), &mut self.platform);
        if was_enabled {
            self.platform.csr_set(Csr::Mstatus, csr::MSTATUS_MIE);
            self.retire();
        }
        result
    }

    /// Spins until `ready` holds, failing with `code` when `budget`
    /// iterations pass first.
    pub fn poll_until(
        &mut self,
        budget: u32,
        code: u16,
        mut ready: impl FnMut(&mut Self) -> bool,
    ) -> Result<(), Failure> {
        let outcome = wait::bounded(budget, || {
            if let Err(failure) = self.halted() {
                return Some(Err(failure));
            }
            if ready(&mut *self) {
                return Some(Ok(()));
            }
            self.nop();
            None
        });
        outcome.unwrap_or_else(|timeout| {
            error!(code = format!("0x{code:04x}"), budget = timeout.budget, "wait timed out");
            Err(Failure(code))
        })
    }

    /// [`Kernel::poll_until`] on the shared state
    pub fn wait_until(
        &mut self,
        budget: u32,
        code: u16,
        done: impl Fn(&SharedState) -> bool,
    ) -> Result<(), Failure> {
        self.poll_until(budget, code, |kernel| kernel.free(|shared, _| done(shared)))
    }

    /// Spins until `ticks` clock ticks have passed.
    pub fn delay(&mut self, ticks: u64, code: u16) -> Result<(), Failure> {
        let until = self.now().saturating_add(ticks);
        let budget = self.config.irq_timeout;
        self.poll_until(budget, code, |kernel| kernel.now() >= until)
    }

    pub fn enable_interrupts(&mut self) {
        self.platform.csr_set(Csr::Mstatus, csr::MSTATUS_MIE);
        self.retire();
    }

    pub fn disable_interrupts(&mut self) {
        self.platform.csr_clear(Csr::Mstatus, csr::MSTATUS_MIE);
    }

    pub fn enable_source(&mut self, source: Source) {
        self.platform.csr_set(Csr::Mie, source.mask());
        self.retire();
    }

    pub fn disable_source(&mut self, source: Source) {
        self.platform.csr_clear(Csr::Mie, source.mask());
    }

    /// Restarts the tick grid `lead` clock ticks from now.
    pub fn arm_tick(&mut self, lead: u32) {
        self.free(|shared, platform| {
            let mut clock = timer(platform);
            let now = clock.now();
            shared.tick.arm_at(now.saturating_add(u64::from(lead)));
            clock.set_deadline(shared.next_deadline());
            debug!(deadline = shared.tick.deadline(), "tick armed");
        });
    }

    /// Takes the events accumulated by the handler.
    pub fn drain(&mut self) -> Pending {
        self.free(|shared, _| shared.drain())
    }

    /// Writes the diagnostics block to DMEM, status word last.
    pub fn report(&mut self, outcome: &Result<(), Failure>) -> ResultBlock {
        let status = report::status_word(outcome);
        let block = self.free(|shared, _| ResultBlock::capture(status, shared));
        let words = block.to_words();
        for (index, word) in words.iter().enumerate().skip(1) {
            self.platform.write32(result::BASE + (index as u32) * 4, *word);
        }
        self.platform.write32(result::BASE, words[result::STATUS]);
        block
    }
}
