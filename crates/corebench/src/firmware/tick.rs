//! Periodic tick generator.

use std::num::NonZeroU64;

/// Absolute-deadline periodic tick.
///
/// The deadline advances by whole periods from where it started, so tick
/// phase does not drift with handler latency. After [`TickGenerator::service`]
/// the deadline is always strictly ahead of the clock it was given.
#[derive(Debug, Clone)]
pub struct TickGenerator {
    period: NonZeroU64,
    deadline: u64,
}

impl TickGenerator {
    /// Unarmed generator
    pub fn new(period: NonZeroU64) -> Self {
        Self {
            period,
            deadline: u64::MAX,
        }
    }

    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline != u64::MAX
    }

    /// First tick one period after `now`
    pub fn start(&mut self, now: u64) {
        self.deadline = now.saturating_add(self.period.get());
    }

    /// First tick at an explicit time
    pub fn arm_at(&mut self, deadline: u64) {
        self.deadline = deadline;
    }

    /// Accounts every tick due at `now` and returns how many there were.
    ///
    /// Periods that elapsed while interrupts were held off are all
    /// counted here in one burst rather than dropped.
    pub fn service(&mut self, now: u64) -> u32 {
        let mut due = 0u32;
        while self.is_armed() && now >= self.deadline {
            self.deadline = self.deadline.saturating_add(self.period.get());
            due = due.saturating_add(1);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(period: u64) -> TickGenerator {
        TickGenerator::new(NonZeroU64::new(period).unwrap())
    }

    #[test]
    fn test_unarmed_never_ticks() {
        let mut tick = generator(100);
        assert_eq!(tick.service(u64::MAX - 1), 0);
        assert!(!tick.is_armed());
    }

    #[test]
    fn test_single_tick() {
        let mut tick = generator(100);
        tick.start(1000);
        assert_eq!(tick.service(1099), 0);
        assert_eq!(tick.service(1100), 1);
        assert_eq!(tick.deadline(), 1200);
    }

    #[test]
    fn test_catch_up_after_long_disable() {
        let mut tick = generator(3000);
        tick.arm_at(10_000);
        // Six and a bit periods late.
        let now = 10_000 + 6 * 3000 + 17;
        assert_eq!(tick.service(now), 7);
        assert!(tick.deadline() > now);
        assert_eq!(tick.deadline(), 10_000 + 7 * 3000);
    }

    #[test]
    fn test_deadline_stays_on_grid() {
        let mut tick = generator(50);
        tick.arm_at(0);
        let mut total = 0;
        for now in [3, 49, 50, 51, 260, 261] {
            total += tick.service(now);
            assert!(tick.deadline() > now);
            assert_eq!(tick.deadline() % 50, 0);
        }
        assert_eq!(total, 6);
    }
}
