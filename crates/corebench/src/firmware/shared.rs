//! State shared between the trap handler and the main line.
//!
//! The handler owns every field while it runs. The main line only touches
//! this state through [`super::Kernel::free`], which masks interrupts for
//! the duration of the closure.

use std::num::NonZeroU64;

use super::deadline::merge;
use super::debounce::Debouncer;
use super::tick::TickGenerator;

/// Events produced by the handler, consumed by the main line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pending {
    pub buttons: u32,
    pub ticks: u32,
}

/// Handler-side counters, reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub irq_count: u32,
    pub timer_irqs: u32,
    pub external_irqs: u32,

    pub bad_mcause: u32,
    pub nested_irq: u32,
    pub bad_mie_in_handler: u32,
    pub bad_mepc_align: u32,
    pub bad_mepc_range: u32,

    pub delta_samples: u32,
    pub delta_min: u32,
    pub delta_max: u32,
    prev_mtime_lo: u32,

    pub last_mcause: u32,
    pub last_mepc: u32,
    pub last_gpio_status: u32,
    pub last_source: u32,

    pub tick_total: u32,
    pub button_total: u32,
    pub ignored_edges: u32,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            irq_count: 0,
            timer_irqs: 0,
            external_irqs: 0,
            bad_mcause: 0,
            nested_irq: 0,
            bad_mie_in_handler: 0,
            bad_mepc_align: 0,
            bad_mepc_range: 0,
            delta_samples: 0,
            delta_min: u32::MAX,
            delta_max: 0,
            prev_mtime_lo: 0,
            last_mcause: 0,
            last_mepc: 0,
            last_gpio_status: 0,
            last_source: 0,
            tick_total: 0,
            button_total: 0,
            ignored_edges: 0,
        }
    }
}

impl Diagnostics {
    /// Counts a timer dispatch and samples the delta to the previous one
    /// from the low clock half (wrapping subtraction).
    pub fn record_timer(&mut self, now_lo: u32) {
        if self.timer_irqs != 0 {
            let delta = now_lo.wrapping_sub(self.prev_mtime_lo);
            self.delta_min = self.delta_min.min(delta);
            self.delta_max = self.delta_max.max(delta);
            self.delta_samples += 1;
        }
        self.prev_mtime_lo = now_lo;
        self.timer_irqs += 1;
    }
}

/// Records the cause of the first dispatch after being armed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstCauseLatch {
    armed: bool,
    captured: Option<u32>,
}

impl FirstCauseLatch {
    pub fn arm(&mut self) {
        self.armed = true;
        self.captured = None;
    }

    /// Called by the handler on every dispatch; only the first one after
    /// [`FirstCauseLatch::arm`] sticks.
    pub fn capture(&mut self, mcause: u32) {
        if self.armed {
            self.captured = Some(mcause);
            self.armed = false;
        }
    }

    pub fn captured(&self) -> Option<u32> {
        self.captured
    }

    pub fn disarm(&mut self) -> Option<u32> {
        self.armed = false;
        self.captured
    }
}

#[derive(Debug, Clone)]
pub struct SharedState {
    pub tick: TickGenerator,
    pub debounce: Debouncer,
    pub pending: Pending,
    pub diag: Diagnostics,
    pub first_cause: FirstCauseLatch,
    /// Failure code latched by the handler; ends the run at the next check
    pub fatal: Option<u16>,
}

impl SharedState {
    pub fn new(period: NonZeroU64, debounce_window: u64) -> Self {
        Self {
            tick: TickGenerator::new(period),
            debounce: Debouncer::new(debounce_window),
            pending: Pending::default(),
            diag: Diagnostics::default(),
            first_cause: FirstCauseLatch::default(),
            fatal: None,
        }
    }

    /// Value the hardware deadline must hold
    pub fn next_deadline(&self) -> u64 {
        merge(self.tick.deadline(), self.debounce.expiry())
    }

    pub fn record_ticks(&mut self, ticks: u32) {
        self.pending.ticks = self.pending.ticks.saturating_add(ticks);
        self.diag.tick_total = self.diag.tick_total.wrapping_add(ticks);
    }

    pub fn record_button(&mut self) {
        self.pending.buttons = self.pending.buttons.saturating_add(1);
        self.diag.button_total = self.diag.button_total.wrapping_add(1);
    }

    /// Takes and clears the pending counters.
    pub fn drain(&mut self) -> Pending {
        std::mem::take(&mut self.pending)
    }
}
