//! Priority and invariant suite.
//!
//! A strictly sequential script: every phase either completes or returns
//! the code that names it, and the first failure ends the run. Waits that
//! must be interrupt-free are fixed spins; waits for interrupts are
//! bounded by the configured timeout.

use corebench_hw::memory_map::scratch;
use corebench_hw::mmio::gpio::pins;
use corebench_hw::specs::{cause, codes, csr};
use tracing::{info, info_span, warn};

use super::platform::{Csr, Gpio, Platform, Source};
use super::trap::ExternalMode;
use super::{Failure, Kernel, check};

pub fn run<P: Platform>(kernel: &mut Kernel<P>) -> Result<(), Failure> {
    timer_phases(kernel)?;
    stress(kernel)?;
    resume_phases(kernel)?;
    external_phases(kernel)?;
    priority_phase(kernel)?;
    debounce_phases(kernel)?;
    final_checks(kernel)
}

fn irq_count<P: Platform>(kernel: &mut Kernel<P>) -> u32 {
    kernel.free(|shared, _| shared.diag.irq_count)
}

fn external_irqs<P: Platform>(kernel: &mut Kernel<P>) -> u32 {
    kernel.free(|shared, _| shared.diag.external_irqs)
}

fn button_latched<P: Platform>(kernel: &mut Kernel<P>) -> bool {
    kernel.free(|_, platform| Gpio::new(platform).status() & pins::BUTTON != 0)
}

/// Interrupts stay off unless both enables are set, and arrive once they are.
///
/// The button edge latched in the first phase stays pending, with only
/// `mie.MEIE` left to gate it, until [`external_phases`] unmasks it.
fn timer_phases<P: Platform>(kernel: &mut Kernel<P>) -> Result<(), Failure> {
    let config = kernel.config().clone();
    let quiet = config.period.saturating_mul(4);

    {
        let _phase = info_span!("phase", code = "0x0101").entered();
        kernel.disable_interrupts();
        kernel.disable_source(Source::Timer);
        kernel.disable_source(Source::External);
        kernel.free(|_, platform| {
            let mut gpio = Gpio::new(platform);
            gpio.acknowledge(pins::BUTTON);
            gpio.enable_irq(pins::BUTTON);
            gpio.drive(pins::LOOPBACK_OUT, true);
        });
        kernel.arm_tick(config.arm_lead);
        kernel.spin(quiet)?;
        check(irq_count(kernel) == 0, codes::BOTH_DISABLED)?;
        check(button_latched(kernel), codes::BOTH_DISABLED)?;
    }

    {
        let _phase = info_span!("phase", code = "0x0102").entered();
        kernel.enable_source(Source::Timer);
        kernel.arm_tick(config.arm_lead);
        kernel.spin(quiet)?;
        check(irq_count(kernel) == 0, codes::LOCAL_ONLY)?;
    }

    {
        let _phase = info_span!("phase", code = "0x0103").entered();
        kernel.enable_interrupts();
        kernel.arm_tick(config.arm_lead);
        kernel.wait_until(config.irq_timeout, codes::GLOBAL_ENABLE, |s| {
            s.diag.irq_count >= 8
        })?;
    }

    info!(irq_count = irq_count(kernel), "timer enable phases passed");
    Ok(())
}

/// Scratch-register traffic with the tick running underneath.
fn stress<P: Platform>(kernel: &mut Kernel<P>) -> Result<(), Failure> {
    let iterations = kernel.config().stress_iterations;
    for i in 0..iterations {
        let addr = scratch::BASE + (i & 0xF) * 4;
        let platform = kernel.platform_mut();
        platform.write32(addr, i ^ 0xA5A5_0000);
        platform.read32(addr);
        kernel.nop();
    }
    kernel.halted()
}

/// Masking freezes the interrupt count; unmasking resumes it.
fn resume_phases<P: Platform>(kernel: &mut Kernel<P>) -> Result<(), Failure> {
    let config = kernel.config().clone();
    let quiet = config.period.saturating_mul(6);

    {
        let _phase = info_span!("phase", code = "0x0104").entered();
        let before = irq_count(kernel);
        kernel.disable_interrupts();
        kernel.spin(quiet)?;
        check(irq_count(kernel) == before, codes::GLOBAL_FROZEN)?;
    }

    {
        let _phase = info_span!("phase", code = "0x0105").entered();
        let before = irq_count(kernel);
        kernel.enable_interrupts();
        kernel.arm_tick(config.arm_lead);
        kernel.wait_until(config.irq_timeout, codes::GLOBAL_RESUME, |s| {
            s.diag.irq_count >= before + 6
        })?;
    }

    {
        let _phase = info_span!("phase", code = "0x0106").entered();
        let before = irq_count(kernel);
        kernel.disable_source(Source::Timer);
        kernel.spin(quiet)?;
        check(irq_count(kernel) == before, codes::LOCAL_FROZEN)?;
    }

    {
        let _phase = info_span!("phase", code = "0x0107").entered();
        let before = irq_count(kernel);
        kernel.enable_source(Source::Timer);
        kernel.arm_tick(config.arm_lead);
        kernel.wait_until(config.irq_timeout, codes::LOCAL_RESUME, |s| {
            s.diag.irq_count >= before + 4
        })?;
    }

    info!(irq_count = irq_count(kernel), "mask/resume phases passed");
    Ok(())
}

/// A latched button edge waits out a cleared `mie.MEIE` with the timer
/// running, and is dispatched once the source is enabled.
fn external_phases<P: Platform>(kernel: &mut Kernel<P>) -> Result<(), Failure> {
    let config = kernel.config().clone();
    let quiet = config.period.saturating_mul(6);
    let before = external_irqs(kernel);

    {
        let _phase = info_span!("phase", code = "0x010A").entered();
        kernel.spin(quiet)?;
        check(external_irqs(kernel) == before, codes::EXTERNAL_FROZEN)?;
        check(button_latched(kernel), codes::EXTERNAL_FROZEN)?;
    }

    {
        let _phase = info_span!("phase", code = "0x010B").entered();
        kernel.enable_source(Source::External);
        kernel.wait_until(config.irq_timeout, codes::EXTERNAL_RESUME, |s| {
            s.diag.external_irqs > before
        })?;
        release(kernel, codes::EXTERNAL_RESUME)?;
    }

    info!(external_irqs = external_irqs(kernel), "external mask phases passed");
    Ok(())
}

/// With timer and external both pending when interrupts are unmasked, the
/// external one must be dispatched first.
fn priority_phase<P: Platform>(kernel: &mut Kernel<P>) -> Result<(), Failure> {
    let _phase = info_span!("phase", code = "0x0108").entered();
    let timeout = kernel.config().irq_timeout;

    kernel.disable_interrupts();
    kernel.enable_source(Source::Timer);
    kernel.enable_source(Source::External);
    kernel.free(|_, platform| {
        let mut gpio = Gpio::new(platform);
        gpio.acknowledge(pins::BUTTON);
        gpio.enable_irq(pins::BUTTON);
        gpio.drive(pins::LOOPBACK_OUT, true);
    });
    kernel.poll_until(timeout, codes::PRIORITY_TIMEOUT, |kernel| {
        Gpio::new(kernel.platform_mut()).status() & pins::BUTTON != 0
    })?;

    kernel.arm_tick(0);
    kernel.poll_until(timeout, codes::PRIORITY_TIMEOUT, |kernel| {
        kernel.platform_mut().csr_read(Csr::Mip) & csr::MTI != 0
    })?;

    kernel.free(|shared, _| shared.first_cause.arm());
    kernel.enable_interrupts();
    kernel.wait_until(timeout, codes::PRIORITY_TIMEOUT, |s| {
        s.first_cause.captured().is_some()
    })?;
    let first = kernel.free(|shared, _| shared.first_cause.disarm());
    info!(first_cause = format!("{first:x?}"), "priority arbitration");
    check(first == Some(cause::MACHINE_EXTERNAL), codes::PRIORITY_ORDER)?;

    release(kernel, codes::PRIORITY_TIMEOUT)
}

/// Drops the loopback line and waits for the bench to go quiet.
fn release<P: Platform>(kernel: &mut Kernel<P>, code: u16) -> Result<(), Failure> {
    let window = u64::from(kernel.config().debounce_window);
    let timeout = kernel.config().irq_timeout;
    kernel.free(|_, platform| Gpio::new(platform).drive(pins::LOOPBACK_OUT, false));
    kernel.delay(window, code)?;
    kernel.wait_until(timeout, code, |s| !s.debounce.is_settling())?;
    kernel.drain();
    Ok(())
}

fn press<P: Platform>(kernel: &mut Kernel<P>, high: bool) {
    kernel.free(|_, platform| Gpio::new(platform).drive(pins::LOOPBACK_OUT, high));
}

/// A bouncing press yields exactly one event, ticks keep flowing while
/// it settles, and a press shorter than the window yields none.
fn debounce_phases<P: Platform>(kernel: &mut Kernel<P>) -> Result<(), Failure> {
    if kernel.dispatcher().mode() != ExternalMode::Debounce {
        warn!("external mode is direct, skipping debounce phases");
        return Ok(());
    }
    let config = kernel.config().clone();
    let window = u64::from(config.debounce_window);
    let timeout = config.irq_timeout;
    kernel.drain();

    {
        let _phase = info_span!("phase", code = "0x0301").entered();
        press(kernel, true);
        kernel.wait_until(timeout, codes::DEBOUNCE_NO_EVENT, |s| {
            s.debounce.is_settling() || s.pending.buttons != 0
        })?;

        if config.debounce_window > config.period {
            let ticks = kernel.free(|shared, _| shared.diag.tick_total);
            kernel.wait_until(timeout, codes::DEBOUNCE_TICK_STALL, |s| {
                s.diag.tick_total != ticks
            })?;
            let settling = kernel.free(|shared, _| shared.debounce.is_settling());
            check(settling, codes::DEBOUNCE_TICK_STALL)?;
        }

        kernel.wait_until(timeout, codes::DEBOUNCE_NO_EVENT, |s| s.pending.buttons >= 1)?;
        kernel.delay(window.saturating_mul(2), codes::DEBOUNCE_DOUBLE)?;
        let buttons = kernel.free(|shared, _| shared.pending.buttons);
        check(buttons == 1, codes::DEBOUNCE_DOUBLE)?;

        let rearmed = kernel.free(|shared, platform| {
            !shared.debounce.is_settling() && Gpio::new(platform).irq_enabled() & pins::BUTTON != 0
        });
        check(rearmed, codes::DEBOUNCE_REARM)?;
        release(kernel, codes::DEBOUNCE_REARM)?;
    }

    {
        let _phase = info_span!("phase", code = "0x0303").entered();
        press(kernel, true);
        kernel.delay(window / 4, codes::DEBOUNCE_GLITCH)?;
        press(kernel, false);
        kernel.delay(window.saturating_mul(2), codes::DEBOUNCE_GLITCH)?;
        kernel.wait_until(timeout, codes::DEBOUNCE_GLITCH, |s| !s.debounce.is_settling())?;
        check(kernel.drain().buttons == 0, codes::DEBOUNCE_GLITCH)?;
    }

    let ignored_edges = kernel.free(|shared, _| shared.diag.ignored_edges);
    info!(ignored_edges, "debounce phases passed");
    Ok(())
}

fn final_checks<P: Platform>(kernel: &mut Kernel<P>) -> Result<(), Failure> {
    let diag = kernel.free(|shared, _| shared.diag.clone());
    check(diag.bad_mcause == 0, codes::BAD_CAUSE)?;
    check(diag.nested_irq == 0, codes::NESTED)?;
    check(diag.bad_mie_in_handler == 0, codes::MIE_IN_HANDLER)?;
    check(diag.bad_mepc_align == 0, codes::MEPC_ALIGN)?;
    check(diag.bad_mepc_range == 0, codes::MEPC_RANGE)?;
    check(diag.delta_samples >= 4, codes::DELTA_SAMPLES)?;
    Ok(())
}
