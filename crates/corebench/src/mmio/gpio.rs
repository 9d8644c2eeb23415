//! GPIO block with a mechanical button on pin 0.
//!
//! The button is either pressed by the bench (scheduled presses) or
//! driven through the loopback jumper from `DATA_OUT` bit 0. Every level
//! change is preceded by a burst of contact bounce. Rising edges latch in
//! `IRQ_STATUS` whether or not the pin is enabled; the interrupt line is
//! `IRQ_STATUS & IRQ_ENABLE`.

use corebench_hw::mmio::gpio::{pins, registers as hw_regs};
use tracing::{debug, instrument, trace, warn};

/// Contact bounce applied to every button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BounceConfig {
    /// Level flips before the contact settles
    pub count: u32,
    /// Clock ticks between flips
    pub spacing: u64,
}

impl Default for BounceConfig {
    fn default() -> Self {
        Self {
            count: 6,
            spacing: 150,
        }
    }
}

impl BounceConfig {
    /// Time from the first flip to the settled level
    pub fn duration(&self) -> u64 {
        u64::from(self.count) * self.spacing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Driver {
    Bench,
    Loopback,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    at: u64,
    level: bool,
    driver: Driver,
}

#[derive(Debug)]
pub struct GpioState {
    level: bool,
    data_out: u32,
    irq_enable: u32,
    irq_status: u32,
    bounce: BounceConfig,
    queue: Vec<Transition>,
    rising_edges: u64,
}

impl GpioState {
    pub fn new(bounce: BounceConfig) -> Self {
        Self {
            level: false,
            data_out: 0,
            irq_enable: 0,
            irq_status: 0,
            bounce,
            queue: Vec::new(),
            rising_edges: 0,
        }
    }

    pub fn level(&self) -> bool {
        self.level
    }

    /// Interrupt request line
    pub fn line(&self) -> bool {
        self.irq_status & self.irq_enable != 0
    }

    pub fn leds(&self) -> u8 {
        ((self.data_out & pins::LED_MASK) >> pins::LED_SHIFT) as u8
    }

    pub fn rising_edges(&self) -> u64 {
        self.rising_edges
    }

    /// Bench presses the button at `at` and releases it `hold` ticks later.
    pub fn schedule_press(&mut self, at: u64, hold: u64) {
        self.schedule(Driver::Bench, at, true);
        self.schedule(Driver::Bench, at.saturating_add(hold), false);
    }

    fn schedule(&mut self, driver: Driver, at: u64, level: bool) {
        for flip in 0..=self.bounce.count {
            let when = at.saturating_add(u64::from(flip) * self.bounce.spacing);
            // Even flips land on the target level, the last one always does.
            let bounced = flip % 2 == 1 && flip != self.bounce.count;
            let transition = Transition {
                at: when,
                level: level != bounced,
                driver,
            };
            let index = self.queue.partition_point(|queued| queued.at <= when);
            self.queue.insert(index, transition);
        }
    }

    /// Applies every transition due at `now`.
    pub fn advance(&mut self, now: u64) {
        while let Some(next) = self.queue.first()
            && next.at <= now
        {
            let transition = self.queue.remove(0);
            self.set_level(transition.level);
        }
    }

    /// Sets the pin level immediately, without bounce.
    pub fn force_level(&mut self, level: bool) {
        self.set_level(level);
    }

    fn set_level(&mut self, level: bool) {
        if level && !self.level {
            self.irq_status |= pins::BUTTON;
            self.rising_edges += 1;
            trace!("GPIO rising edge on button");
        }
        self.level = level;
    }

    #[instrument(level = "trace", skip(self))]
    pub fn read(&self, offset: u32) -> u32 {
        match offset {
            hw_regs::DATA_IN => {
                if self.level {
                    pins::BUTTON
                } else {
                    0
                }
            }
            hw_regs::DATA_OUT => self.data_out,
            hw_regs::IRQ_ENABLE => self.irq_enable,
            hw_regs::IRQ_STATUS => self.irq_status,
            _ => {
                warn!("Unknown GPIO register read: offset={:#X}", offset);
                0
            }
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn write(&mut self, offset: u32, value: u32, now: u64) {
        trace!("GPIO write: offset={:#X}, value={:#X}", offset, value);
        match offset {
            hw_regs::DATA_IN => warn!("Write to read-only GPIO DATA_IN: {:#X}", value),
            hw_regs::DATA_OUT => {
                let changed = self.data_out ^ value;
                self.data_out = value;
                if changed & pins::LOOPBACK_OUT != 0 {
                    self.queue.retain(|t| t.driver != Driver::Loopback);
                    self.schedule(Driver::Loopback, now, value & pins::LOOPBACK_OUT != 0);
                }
                if changed & pins::LED_MASK != 0 {
                    debug!("LEDs: {:#010b}", self.leds());
                }
            }
            hw_regs::IRQ_ENABLE => self.irq_enable = value & pins::BUTTON,
            hw_regs::IRQ_STATUS => self.irq_status &= !value,
            _ => warn!(
                "Unknown GPIO register write: offset={:#X}, value={:#X}",
                offset, value
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpio() -> GpioState {
        GpioState::new(BounceConfig {
            count: 4,
            spacing: 10,
        })
    }

    #[test]
    fn test_press_bounces_then_settles() {
        let mut gpio = gpio();
        gpio.schedule_press(100, 1000);
        gpio.advance(100);
        assert!(gpio.level());
        gpio.advance(110);
        assert!(!gpio.level());
        gpio.advance(139);
        assert!(!gpio.level());
        gpio.advance(140);
        assert!(gpio.level());
        // Rising edges at 100, 120 and 140.
        assert_eq!(gpio.rising_edges(), 3);
        gpio.advance(2000);
        assert!(!gpio.level());
        assert_eq!(gpio.rising_edges(), 3);
    }

    #[test]
    fn test_status_is_write_one_to_clear() {
        let mut gpio = gpio();
        gpio.force_level(true);
        assert_eq!(gpio.read(hw_regs::IRQ_STATUS), pins::BUTTON);
        gpio.write(hw_regs::IRQ_STATUS, 0, 0);
        assert_eq!(gpio.read(hw_regs::IRQ_STATUS), pins::BUTTON);
        gpio.write(hw_regs::IRQ_STATUS, pins::BUTTON, 0);
        assert_eq!(gpio.read(hw_regs::IRQ_STATUS), 0);
    }

    #[test]
    fn test_line_follows_enable() {
        let mut gpio = gpio();
        gpio.force_level(true);
        assert!(!gpio.line());
        gpio.write(hw_regs::IRQ_ENABLE, pins::BUTTON, 0);
        assert!(gpio.line());
        gpio.write(hw_regs::IRQ_ENABLE, 0, 0);
        assert!(!gpio.line());
        assert_eq!(gpio.read(hw_regs::IRQ_STATUS), pins::BUTTON);
    }

    #[test]
    fn test_loopback_drive() {
        let mut gpio = gpio();
        gpio.write(hw_regs::DATA_OUT, pins::LOOPBACK_OUT, 50);
        gpio.advance(50);
        assert!(gpio.level());
        gpio.advance(200);
        assert!(gpio.level());
        gpio.write(hw_regs::DATA_OUT, 0, 300);
        gpio.advance(400);
        assert!(!gpio.level());
    }

    #[test]
    fn test_redrive_cancels_pending_bounce() {
        let mut gpio = gpio();
        gpio.write(hw_regs::DATA_OUT, pins::LOOPBACK_OUT, 0);
        gpio.write(hw_regs::DATA_OUT, 0, 5);
        gpio.advance(1000);
        assert!(!gpio.level());
    }

    #[test]
    fn test_leds_do_not_touch_loopback() {
        let mut gpio = gpio();
        gpio.write(hw_regs::DATA_OUT, 0x2A << pins::LED_SHIFT, 0);
        assert_eq!(gpio.leds(), 0x2A);
        gpio.advance(1000);
        assert!(!gpio.level());
        assert_eq!(gpio.rising_edges(), 0);
    }
}
