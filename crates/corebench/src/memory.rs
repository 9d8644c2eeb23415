//! Target memories.
//!
//! IMEM and DMEM are word-organised. The core reaches them by byte
//! address; the serial bootloader reaches them by word address through
//! [`TargetMemory`], loading into IMEM and reading back from DMEM.

use corebench_hw::memory_map::{dmem, imem};
use tracing::{debug, warn};

/// Word store behind the serial bootloader
pub trait TargetMemory {
    /// Stores a word received by a load transaction.
    fn load_word(&mut self, addr: u32, word: u32);
    /// Word returned by a read transaction
    fn read_word(&self, addr: u32) -> u32;
}

impl<M: TargetMemory + ?Sized> TargetMemory for &mut M {
    fn load_word(&mut self, addr: u32, word: u32) {
        (**self).load_word(addr, word)
    }

    fn read_word(&self, addr: u32) -> u32 {
        (**self).read_word(addr)
    }
}

#[derive(Debug)]
pub struct Memory {
    imem: Vec<u32>,
    dmem: Vec<u32>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Word index of `addr` within a word-organised region
fn word_index(base: u32, words: usize, addr: u32) -> Option<usize> {
    let offset = addr.checked_sub(base)?;
    let index = (offset / 4) as usize;
    (offset % 4 == 0 && index < words).then_some(index)
}

impl Memory {
    pub fn new() -> Self {
        Self {
            imem: vec![0; imem::WORDS],
            dmem: vec![0; dmem::WORDS],
        }
    }

    pub fn imem(&self) -> &[u32] {
        &self.imem
    }

    pub fn dmem(&self) -> &[u32] {
        &self.dmem
    }

    /// Bus read; `None` outside both memories
    pub fn read(&self, addr: u32) -> Option<u32> {
        if let Some(index) = word_index(imem::BASE, imem::WORDS, addr) {
            return Some(self.imem[index]);
        }
        word_index(dmem::BASE, dmem::WORDS, addr).map(|index| self.dmem[index])
    }

    /// Bus write. IMEM is not writable from the data port.
    pub fn write(&mut self, addr: u32, value: u32) -> bool {
        match word_index(dmem::BASE, dmem::WORDS, addr) {
            Some(index) => {
                self.dmem[index] = value;
                true
            }
            None => {
                if word_index(imem::BASE, imem::WORDS, addr).is_some() {
                    warn!("Data write to IMEM ignored: addr={:#X}", addr);
                }
                false
            }
        }
    }

    pub fn contains(&self, addr: u32) -> bool {
        word_index(imem::BASE, imem::WORDS, addr).is_some()
            || word_index(dmem::BASE, dmem::WORDS, addr).is_some()
    }
}

impl TargetMemory for Memory {
    fn load_word(&mut self, addr: u32, word: u32) {
        match self.imem.get_mut(addr as usize) {
            Some(slot) => *slot = word,
            None => warn!("Load beyond IMEM dropped: word {:#X}", addr),
        }
        if addr == 0 {
            debug!("IMEM reset vector loaded: {:#010X}", word);
        }
    }

    fn read_word(&self, addr: u32) -> u32 {
        self.dmem.get(addr as usize).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_decode() {
        let mut memory = Memory::new();
        assert!(memory.write(dmem::BASE + 8, 0x1234));
        assert_eq!(memory.read(dmem::BASE + 8), Some(0x1234));
        assert_eq!(memory.read(dmem::BASE + 2), None);
        assert_eq!(memory.read(dmem::BASE + (dmem::WORDS as u32) * 4), None);
        assert_eq!(memory.read(0x0000_0FFC), Some(0));
        assert_eq!(memory.read(0x0000_1000), None);
    }

    #[test]
    fn test_imem_is_read_only_on_the_bus() {
        let mut memory = Memory::new();
        assert!(!memory.write(imem::BASE, 5));
        assert_eq!(memory.read(imem::BASE), Some(0));
    }

    #[test]
    fn test_loader_port_split() {
        let mut memory = Memory::new();
        memory.load_word(3, 0xCAFE_F00D);
        assert_eq!(memory.imem()[3], 0xCAFE_F00D);
        assert_eq!(memory.read_word(3), 0);
        memory.write(dmem::BASE + 12, 7);
        assert_eq!(memory.read_word(3), 7);
        assert_eq!(memory.read_word(5000), 0);
    }
}
