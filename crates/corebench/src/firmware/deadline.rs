//! Driver for the split 64-bit CLINT deadline, and the merge of the two
//! software deadlines that share it.

use super::platform::Platform;
use corebench_hw::mmio::clint::{self, registers as regs};

/// Raw access to the four 32-bit CLINT halves.
pub trait TimerRegisters {
    fn mtime_lo(&mut self) -> u32;
    fn mtime_hi(&mut self) -> u32;
    fn set_mtimecmp_lo(&mut self, value: u32);
    fn set_mtimecmp_hi(&mut self, value: u32);
}

impl<R: TimerRegisters + ?Sized> TimerRegisters for &mut R {
    fn mtime_lo(&mut self) -> u32 {
        (**self).mtime_lo()
    }

    fn mtime_hi(&mut self) -> u32 {
        (**self).mtime_hi()
    }

    fn set_mtimecmp_lo(&mut self, value: u32) {
        (**self).set_mtimecmp_lo(value)
    }

    fn set_mtimecmp_hi(&mut self, value: u32) {
        (**self).set_mtimecmp_hi(value)
    }
}

/// CLINT halves reached through platform MMIO
pub struct Clint<'a, P> {
    platform: &'a mut P,
}

impl<'a, P: Platform> Clint<'a, P> {
    pub fn new(platform: &'a mut P) -> Self {
        Self { platform }
    }
}

impl<P: Platform> TimerRegisters for Clint<'_, P> {
    fn mtime_lo(&mut self) -> u32 {
        self.platform.read32(clint::BASE + regs::MTIME_LO)
    }

    fn mtime_hi(&mut self) -> u32 {
        self.platform.read32(clint::BASE + regs::MTIME_HI)
    }

    fn set_mtimecmp_lo(&mut self, value: u32) {
        self.platform.write32(clint::BASE + regs::MTIMECMP_LO, value);
    }

    fn set_mtimecmp_hi(&mut self, value: u32) {
        self.platform.write32(clint::BASE + regs::MTIMECMP_HI, value);
    }
}

/// The machine timer: a free-running clock and one compare register.
///
/// Clock reads never observe a stale high half across a low-half rollover,
/// and deadline writes never expose a half-updated compare value.
pub struct MachineTimer<R> {
    regs: R,
}

impl<R: TimerRegisters> MachineTimer<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Reads the 64-bit clock.
    pub fn now(&mut self) -> u64 {
        loop {
            let hi = self.regs.mtime_hi();
            let lo = self.regs.mtime_lo();
            // Low half wrapped between the two high reads.
            if self.regs.mtime_hi() == hi {
                return (u64::from(hi) << 32) | u64::from(lo);
            }
        }
    }

    /// Programs the compare register.
    ///
    /// The high half is parked at all-ones first, so neither
    /// (old high, new low) nor (new high, old low) is ever live.
    pub fn set_deadline(&mut self, deadline: u64) {
        self.regs.set_mtimecmp_hi(u32::MAX);
        self.regs.set_mtimecmp_lo(deadline as u32);
        self.regs.set_mtimecmp_hi((deadline >> 32) as u32);
    }

    /// Pushes the deadline out of reach.
    pub fn disable(&mut self) {
        self.set_deadline(clint::MTIMECMP_RESET);
    }

    pub fn into_inner(self) -> R {
        self.regs
    }
}

/// Machine timer of a platform
pub fn timer<P: Platform>(platform: &mut P) -> MachineTimer<Clint<'_, P>> {
    MachineTimer::new(Clint::new(platform))
}

/// The single value the hardware deadline must hold: the earlier of the
/// next periodic tick and the running debounce expiry, if any.
pub fn merge(tick: u64, debounce: Option<u64>) -> u64 {
    debounce.map_or(tick, |expiry| expiry.min(tick))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock that advances by `step` on every register read, recording
    /// every compare value the hardware would have seen.
    struct ScriptedClint {
        mtime: u64,
        step: u64,
        mtimecmp: u64,
        seen: Vec<u64>,
    }

    impl ScriptedClint {
        fn new(mtime: u64, step: u64) -> Self {
            Self {
                mtime,
                step,
                mtimecmp: u64::MAX,
                seen: Vec::new(),
            }
        }

        fn sample(&mut self) -> u64 {
            let value = self.mtime;
            self.mtime += self.step;
            value
        }
    }

    impl TimerRegisters for ScriptedClint {
        fn mtime_lo(&mut self) -> u32 {
            self.sample() as u32
        }

        fn mtime_hi(&mut self) -> u32 {
            (self.sample() >> 32) as u32
        }

        fn set_mtimecmp_lo(&mut self, value: u32) {
            self.mtimecmp = (self.mtimecmp & !0xFFFF_FFFF) | u64::from(value);
            self.seen.push(self.mtimecmp);
        }

        fn set_mtimecmp_hi(&mut self, value: u32) {
            self.mtimecmp = (self.mtimecmp & 0xFFFF_FFFF) | (u64::from(value) << 32);
            self.seen.push(self.mtimecmp);
        }
    }

    #[test]
    fn test_read_retries_across_low_rollover() {
        // hi read at 0xFFFF_FFFF, lo read after the wrap: a naive read
        // would return 0x0000_0000_0000_0000.
        let mut clint = ScriptedClint::new(0xFFFF_FFFF, 1);
        let now = MachineTimer::new(&mut clint).now();
        assert!(now >= 0x1_0000_0000, "stale high half: {now:#x}");
    }

    #[test]
    fn test_reads_are_monotonic() {
        let mut clint = ScriptedClint::new(0xFFFF_FFF0, 3);
        let mut timer = MachineTimer::new(&mut clint);
        let mut last = 0;
        for _ in 0..64 {
            let now = timer.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_deadline_write_order() {
        let mut clint = ScriptedClint::new(0, 0);
        clint.mtimecmp = 0x0000_0001_0000_0010;
        MachineTimer::new(&mut clint).set_deadline(0x0000_0002_0000_0020);
        assert_eq!(
            clint.seen,
            vec![
                0xFFFF_FFFF_0000_0010,
                0xFFFF_FFFF_0000_0020,
                0x0000_0002_0000_0020,
            ]
        );
    }

    #[test]
    fn test_disable_parks_deadline() {
        let mut clint = ScriptedClint::new(0, 0);
        clint.mtimecmp = 5;
        MachineTimer::new(&mut clint).disable();
        assert_eq!(clint.mtimecmp, u64::MAX);
    }

    #[test]
    fn test_merge_takes_earliest() {
        assert_eq!(merge(3000, None), 3000);
        assert_eq!(merge(3000, Some(5000)), 3000);
        assert_eq!(merge(9000, Some(5000)), 5000);
    }
}
