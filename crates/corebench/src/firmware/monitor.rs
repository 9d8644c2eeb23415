//! Tick/button monitor: sleeps between interrupts and mirrors the button
//! count on the LEDs until enough ticks have passed.

use corebench_hw::mmio::gpio::pins;
use corebench_hw::specs::codes;
use tracing::{debug, info};

use super::platform::{Gpio, Platform, Source};
use super::{Failure, Kernel, wait};

/// What the monitor observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub wakes: u32,
    pub ticks: u32,
    pub buttons: u32,
}

pub fn run<P: Platform>(kernel: &mut Kernel<P>) -> Result<MonitorSummary, Failure> {
    let target = kernel.config().monitor_ticks;
    let lead = kernel.config().arm_lead;

    kernel.free(|_, platform| {
        let mut gpio = Gpio::new(platform);
        gpio.acknowledge(pins::BUTTON);
        gpio.enable_irq(pins::BUTTON);
        gpio.set_leds(0);
    });
    kernel.enable_source(Source::Timer);
    kernel.enable_source(Source::External);
    kernel.arm_tick(lead);
    kernel.enable_interrupts();

    // Every tick wakes the hart at least once.
    let budget = target.saturating_mul(4).saturating_add(16);
    let mut summary = MonitorSummary::default();
    let outcome = wait::bounded(budget, || {
        if let Err(failure) = kernel.halted() {
            return Some(Err(failure));
        }
        if summary.ticks >= target {
            return Some(Ok(()));
        }

        kernel.wfi();
        summary.wakes += 1;
        let pending = kernel.drain();
        summary.ticks = summary.ticks.saturating_add(pending.ticks);
        if pending.buttons != 0 {
            summary.buttons = summary.buttons.saturating_add(pending.buttons);
            let leds = summary.buttons as u8;
            kernel.free(|_, platform| Gpio::new(platform).set_leds(leds));
            debug!(buttons = summary.buttons, "button");
        }
        None
    });

    match outcome {
        Ok(Ok(())) => {
            info!(
                ticks = summary.ticks,
                buttons = summary.buttons,
                wakes = summary.wakes,
                "monitor finished"
            );
            Ok(summary)
        }
        Ok(Err(failure)) => Err(failure),
        Err(_) => Err(Failure(codes::MONITOR_TIMEOUT)),
    }
}
