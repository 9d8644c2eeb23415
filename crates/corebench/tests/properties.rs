use corebench::bootloader::Bootloader;
use corebench::firmware::deadline::{MachineTimer, TimerRegisters};
use corebench::loader::{Direction, Header, Loader};
use corebench::memory::{Memory, TargetMemory};
use corebench_hw::memory_map::dmem;
use proptest::prelude::*;

/// Free-running counter that advances by `step` on every register read and
/// remembers every compare value it held.
struct Counter {
    mtime: u64,
    step: u64,
    mtimecmp: u64,
    history: Vec<u64>,
}

impl Counter {
    fn tick(&mut self) -> u64 {
        let value = self.mtime;
        self.mtime = self.mtime.wrapping_add(self.step);
        value
    }
}

impl TimerRegisters for Counter {
    fn mtime_lo(&mut self) -> u32 {
        self.tick() as u32
    }

    fn mtime_hi(&mut self) -> u32 {
        (self.tick() >> 32) as u32
    }

    fn set_mtimecmp_lo(&mut self, value: u32) {
        self.mtimecmp = (self.mtimecmp & !0xFFFF_FFFF) | u64::from(value);
        self.history.push(self.mtimecmp);
    }

    fn set_mtimecmp_hi(&mut self, value: u32) {
        self.mtimecmp = (self.mtimecmp & 0xFFFF_FFFF) | (u64::from(value) << 32);
        self.history.push(self.mtimecmp);
    }
}

/// One array behind both directions of the protocol.
struct FlatMemory(Vec<u32>);

impl TargetMemory for FlatMemory {
    fn load_word(&mut self, addr: u32, word: u32) {
        self.0[addr as usize] = word;
    }

    fn read_word(&self, addr: u32) -> u32 {
        self.0[addr as usize]
    }
}

proptest! {
    #[test]
    fn load_then_read_round_trips(addr in 0u32..1024, words in prop::collection::vec(any::<u32>(), 1..400)) {
        prop_assume!(addr as usize + words.len() <= 1024);
        let mut loader = Loader::new(Bootloader::new(FlatMemory(vec![0; 1024])));
        loader.load(addr, &words).unwrap();
        let read = loader.read(addr, words.len() as u32).unwrap();
        prop_assert_eq!(read, words);
    }

    #[test]
    fn header_fields_survive_encoding(addr in 0u32..0x8000, count in 0u32..0x1_0000, load: bool) {
        let header = if load { Header::load(addr, count) } else { Header::read(addr, count) };
        let decoded = Header::decode(header.encode());
        prop_assert_eq!(decoded, header);
        prop_assert_eq!(decoded.direction == Direction::Load, load);
    }

    #[test]
    fn loaded_words_land_in_imem(addr in 0u32..1024, words in prop::collection::vec(any::<u32>(), 1..300)) {
        prop_assume!(addr as usize + words.len() <= 1024);
        let mut memory = Memory::new();
        Loader::new(Bootloader::new(&mut memory)).load(addr, &words).unwrap();
        let start = addr as usize;
        prop_assert_eq!(&memory.imem()[start..start + words.len()], &words[..]);
    }

    #[test]
    fn read_returns_dmem(addr in 0u32..1024, values in prop::collection::vec(any::<u32>(), 1..64)) {
        prop_assume!(addr as usize + values.len() <= 1024);
        let mut memory = Memory::new();
        for (i, value) in values.iter().enumerate() {
            memory.write(dmem::BASE + (addr + i as u32) * 4, *value);
        }
        let words = Loader::new(Bootloader::new(&mut memory))
            .read(addr, values.len() as u32)
            .unwrap();
        prop_assert_eq!(words, values);
    }

    #[test]
    fn timer_reads_are_monotonic(start in 0u64..(1 << 40), step in 1u64..5000) {
        let mut timer = MachineTimer::new(Counter { mtime: start, step, mtimecmp: u64::MAX, history: Vec::new() });
        let mut last = timer.now();
        for _ in 0..64 {
            let now = timer.now();
            prop_assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn deadline_update_never_fires_early(now in 0u64..(1 << 62), old in 1u64..(1 << 62), new in 1u64..(1 << 62)) {
        let mut timer = MachineTimer::new(Counter {
            mtime: now,
            step: 0,
            mtimecmp: now + old,
            history: Vec::new(),
        });
        timer.set_deadline(now + new);
        let counter = timer.into_inner();
        prop_assert_eq!(counter.mtimecmp, now + new);
        prop_assert!(counter.history.iter().all(|&cmp| cmp > now));
    }
}
