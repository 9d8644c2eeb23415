//! Trap dispatcher: the single asynchronous entry point of the firmware.
//!
//! Every dispatch validates the trap state it was entered with, then
//! services exactly the cause it was entered for. The deadline is re-armed
//! from the merged software deadlines before returning from any timer
//! dispatch and whenever a debounce window opens.

use std::str::FromStr;

use corebench_hw::memory_map::imem;
use corebench_hw::mmio::gpio::pins;
use corebench_hw::specs::{cause, codes, csr};
use tracing::{error, instrument, trace, warn};

use super::debounce::Edge;
use super::deadline::timer;
use super::platform::{Csr, Gpio, Platform, TrapHandler};
use super::shared::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    External,
    Timer,
    Other(u32),
}

impl Cause {
    pub fn from_mcause(mcause: u32) -> Self {
        match mcause {
            cause::MACHINE_EXTERNAL => Cause::External,
            cause::MACHINE_TIMER => Cause::Timer,
            other => Cause::Other(other),
        }
    }

    /// `mie` bit that must be set for this cause to be legitimate
    fn enable_mask(self) -> Option<u32> {
        match self {
            Cause::External => Some(csr::MEI),
            Cause::Timer => Some(csr::MTI),
            Cause::Other(_) => None,
        }
    }
}

/// How external (button) interrupts are turned into button events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExternalMode {
    /// Settle window, level sampled at expiry
    #[default]
    Debounce,
    /// One event per latched edge
    Direct,
}

impl FromStr for ExternalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debounce" => Ok(ExternalMode::Debounce),
            "direct" => Ok(ExternalMode::Direct),
            other => Err(format!("unknown external mode '{other}' (expected debounce or direct)")),
        }
    }
}

#[derive(Debug)]
pub struct TrapDispatcher {
    shared: SharedState,
    mode: ExternalMode,
    depth: u32,
}

impl TrapDispatcher {
    pub fn new(shared: SharedState, mode: ExternalMode) -> Self {
        Self {
            shared,
            mode,
            depth: 0,
        }
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn shared_mut(&mut self) -> &mut SharedState {
        &mut self.shared
    }

    pub fn mode(&self) -> ExternalMode {
        self.mode
    }

    fn check_entry_state(&mut self, mstatus: u32, mepc: u32) {
        let diag = &mut self.shared.diag;
        if mstatus & csr::MSTATUS_MIE != 0 {
            diag.bad_mie_in_handler += 1;
            warn!(mstatus = format!("0x{mstatus:08x}"), "MIE still set inside handler");
        }
        if mepc & 1 != 0 {
            diag.bad_mepc_align += 1;
            warn!(mepc = format!("0x{mepc:08x}"), "misaligned mepc");
        }
        if mepc & imem::OUT_OF_RANGE_MASK != 0 {
            diag.bad_mepc_range += 1;
            warn!(mepc = format!("0x{mepc:08x}"), "mepc outside IMEM");
        }
    }

    #[instrument(level = "trace", skip(self, platform))]
    fn service_external<P: Platform>(&mut self, platform: &mut P, now: u64) {
        let shared = &mut self.shared;
        shared.diag.external_irqs += 1;

        let mut gpio = Gpio::new(platform);
        let status = gpio.status();
        shared.diag.last_gpio_status = status;
        if status != 0 {
            shared.diag.last_source = status.trailing_zeros();
        }
        gpio.acknowledge(status);

        if status & pins::BUTTON == 0 {
            shared.diag.ignored_edges += 1;
            return;
        }

        match self.mode {
            ExternalMode::Direct => shared.record_button(),
            ExternalMode::Debounce => match shared.debounce.on_edge(now) {
                Edge::Started { expiry } => {
                    gpio.disable_irq(pins::BUTTON);
                    trace!(expiry, "settle window opened");
                    let next = shared.next_deadline();
                    timer(platform).set_deadline(next);
                }
                Edge::Ignored => shared.diag.ignored_edges += 1,
            },
        }
    }

    #[instrument(level = "trace", skip(self, platform))]
    fn service_timer<P: Platform>(&mut self, platform: &mut P, now: u64) {
        let shared = &mut self.shared;
        shared.diag.record_timer(now as u32);

        let ticks = shared.tick.service(now);
        shared.record_ticks(ticks);

        if shared.debounce.expire(now) {
            let mut gpio = Gpio::new(platform);
            if gpio.is_pressed() {
                shared.record_button();
            }
            // Edges latched while masked are bounce of the settled press.
            gpio.acknowledge(pins::BUTTON);
            gpio.enable_irq(pins::BUTTON);
        }

        let next = shared.next_deadline();
        timer(platform).set_deadline(next);
    }
}

impl<P: Platform> TrapHandler<P> for TrapDispatcher {
    fn on_trap(&mut self, platform: &mut P) {
        self.depth += 1;
        if self.depth > 1 {
            self.shared.diag.nested_irq += 1;
        }

        let mcause = platform.csr_read(Csr::Mcause);
        self.shared.first_cause.capture(mcause);
        let mstatus = platform.csr_read(Csr::Mstatus);
        let mepc = platform.csr_read(Csr::Mepc);
        let mie = platform.csr_read(Csr::Mie);
        let now = timer(platform).now();
        trace!(
            mcause = format!("0x{mcause:08x}"),
            mepc = format!("0x{mepc:08x}"),
            now,
            "trap"
        );

        let diag = &mut self.shared.diag;
        diag.irq_count += 1;
        diag.last_mcause = mcause;
        diag.last_mepc = mepc;
        self.check_entry_state(mstatus, mepc);

        let cause = Cause::from_mcause(mcause);
        match cause.enable_mask() {
            Some(mask) if mie & mask != 0 => {}
            _ => {
                self.shared.diag.bad_mcause += 1;
                warn!(mcause = format!("0x{mcause:08x}"), mie = format!("0x{mie:08x}"), "cause not enabled");
            }
        }

        match cause {
            Cause::External => self.service_external(platform, now),
            Cause::Timer => self.service_timer(platform, now),
            Cause::Other(mcause) => {
                error!(mcause = format!("0x{mcause:08x}"), "unexpected trap");
                if self.shared.fatal.is_none() {
                    self.shared.fatal = Some(codes::UNEXPECTED_TRAP);
                }
            }
        }

        // Register restore ahead of `mret` runs with whatever MIE the core left.
        platform.retire(self);
        self.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;
    use crate::firmware::deadline::timer;
    use crate::hart::HartFaults;
    use crate::machine::{Machine, MachineConfig};

    fn dispatcher(mode: ExternalMode) -> TrapDispatcher {
        TrapDispatcher::new(
            SharedState::new(NonZeroU64::new(3000).unwrap(), 5000),
            mode,
        )
    }

    fn machine() -> Machine {
        let mut machine = Machine::new(MachineConfig::default());
        machine.csr_write(Csr::Mtvec, imem::TRAP_VECTOR);
        machine.csr_set(Csr::Mie, csr::MTI | csr::MEI);
        machine
    }

    #[test]
    fn test_timer_dispatch_rearms_ahead_of_clock() {
        let mut machine = machine();
        let mut dispatcher = dispatcher(ExternalMode::Debounce);
        dispatcher.shared_mut().tick.arm_at(0);

        machine.trap(cause::MACHINE_TIMER, &mut dispatcher);

        let shared = dispatcher.shared();
        assert_eq!(shared.diag.irq_count, 1);
        assert_eq!(shared.diag.timer_irqs, 1);
        assert!(shared.pending.ticks >= 1);
        let now = timer(&mut machine).now();
        assert!(machine.peripherals().clint.mtimecmp() > now);
        assert_eq!(machine.peripherals().clint.mtimecmp(), shared.tick.deadline());
    }

    #[test]
    fn test_clean_entry_has_no_violations() {
        let mut machine = machine();
        let mut dispatcher = dispatcher(ExternalMode::Debounce);
        dispatcher.shared_mut().tick.arm_at(0);
        machine.trap(cause::MACHINE_TIMER, &mut dispatcher);

        let diag = &dispatcher.shared().diag;
        assert_eq!(diag.bad_mcause, 0);
        assert_eq!(diag.nested_irq, 0);
        assert_eq!(diag.bad_mie_in_handler, 0);
        assert_eq!(diag.bad_mepc_align, 0);
        assert_eq!(diag.bad_mepc_range, 0);
    }

    #[test]
    fn test_cause_not_enabled_is_counted() {
        let mut machine = machine();
        machine.csr_clear(Csr::Mie, csr::MEI);
        let mut dispatcher = dispatcher(ExternalMode::Direct);
        machine.trap(cause::MACHINE_EXTERNAL, &mut dispatcher);
        assert_eq!(dispatcher.shared().diag.bad_mcause, 1);
        assert_eq!(dispatcher.shared().fatal, None);
    }

    #[test]
    fn test_unknown_cause_is_fatal() {
        let mut machine = machine();
        let mut dispatcher = dispatcher(ExternalMode::Debounce);
        machine.trap(2, &mut dispatcher);
        assert_eq!(dispatcher.shared().diag.bad_mcause, 1);
        assert_eq!(dispatcher.shared().fatal, Some(codes::UNEXPECTED_TRAP));
    }

    #[test]
    fn test_reentry_counts_nested() {
        let mut machine = machine();
        let mut dispatcher = dispatcher(ExternalMode::Debounce);
        dispatcher.shared_mut().tick.arm_at(0);
        dispatcher.depth = 1;
        machine.trap(cause::MACHINE_TIMER, &mut dispatcher);
        assert_eq!(dispatcher.shared().diag.nested_irq, 1);
        assert_eq!(dispatcher.depth, 1);
    }

    #[test]
    fn test_pending_timer_nests_into_epilogue() {
        let mut machine = Machine::new(MachineConfig {
            faults: HartFaults {
                keep_mie_on_trap: true,
                ..HartFaults::default()
            },
            ..MachineConfig::default()
        });
        machine.csr_write(Csr::Mtvec, imem::TRAP_VECTOR);
        machine.csr_set(Csr::Mie, csr::MTI | csr::MEI);
        let mut dispatcher = dispatcher(ExternalMode::Direct);
        dispatcher.shared_mut().tick.arm_at(0);
        timer(&mut machine).set_deadline(0);
        machine.peripherals_mut().gpio.force_level(true);
        Gpio::new(&mut machine).enable_irq(pins::BUTTON);
        machine.csr_set(Csr::Mstatus, csr::MSTATUS_MIE);

        machine.trap(cause::MACHINE_EXTERNAL, &mut dispatcher);

        let diag = &dispatcher.shared().diag;
        assert_eq!(diag.external_irqs, 1);
        assert_eq!(diag.timer_irqs, 1);
        assert_eq!(diag.nested_irq, 1);
        assert_eq!(diag.bad_mie_in_handler, 2);
        assert_eq!(dispatcher.depth, 0);
    }

        #[test]
    fn test_edge_opens_window_and_masks_source() {
        let mut machine = machine();
        let mut dispatcher = dispatcher(ExternalMode::Debounce);
        dispatcher.shared_mut().tick.start(0);
        machine.peripherals_mut().gpio.force_level(true);
        Gpio::new(&mut machine).enable_irq(pins::BUTTON);

        machine.trap(cause::MACHINE_EXTERNAL, &mut dispatcher);

        let shared = dispatcher.shared();
        assert!(shared.debounce.is_settling());
        assert_eq!(shared.pending.buttons, 0);
        let mut gpio = Gpio::new(&mut machine);
        assert_eq!(gpio.irq_enabled() & pins::BUTTON, 0);
        assert_eq!(gpio.status(), 0);
        // The tick is still earlier than the settle expiry.
        assert_eq!(machine.peripherals().clint.mtimecmp(), 3000);
    }

    #[test]
    fn test_direct_mode_counts_each_dispatch() {
        let mut machine = machine();
        let mut dispatcher = dispatcher(ExternalMode::Direct);
        for _ in 0..3 {
            machine.peripherals_mut().gpio.force_level(false);
            machine.peripherals_mut().gpio.force_level(true);
            machine.trap(cause::MACHINE_EXTERNAL, &mut dispatcher);
        }
        assert_eq!(dispatcher.shared().pending.buttons, 3);
        assert!(!dispatcher.shared().debounce.is_settling());
    }

    #[test]
    fn test_external_mode_from_str() {
        assert_eq!("direct".parse(), Ok(ExternalMode::Direct));
        assert_eq!("debounce".parse(), Ok(ExternalMode::Debounce));
        assert!("bouncy".parse::<ExternalMode>().is_err());
    }
}
