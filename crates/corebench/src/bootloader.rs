//! Target side of the serial bootloader.
//!
//! Consumes the byte stream from the host, assembles words and executes
//! load and read transactions against a [`TargetMemory`]. It doubles as an
//! in-process link: [`Bootloader`] implements [`Read`] and [`Write`], so a
//! [`crate::loader::Loader`] can talk to it directly, and reading from it
//! with nothing queued fails with [`io::ErrorKind::TimedOut`] the way a
//! silent serial port does.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use tracing::{debug, trace};

use crate::loader::{Direction, Header};
use crate::memory::TargetMemory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    Header,
    Data { addr: u32, remaining: u32 },
}

pub struct Bootloader<M> {
    memory: M,
    partial: Vec<u8>,
    state: RxState,
    tx: VecDeque<u8>,
}

impl<M: TargetMemory> Bootloader<M> {
    pub fn new(memory: M) -> Self {
        Self {
            memory,
            partial: Vec::with_capacity(4),
            state: RxState::Header,
            tx: VecDeque::new(),
        }
    }

    /// Feeds received bytes.
    pub fn receive(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.partial.push(byte);
            if self.partial.len() == 4 {
                let word = u32::from_le_bytes([
                    self.partial[0],
                    self.partial[1],
                    self.partial[2],
                    self.partial[3],
                ]);
                self.partial.clear();
                self.on_word(word);
            }
        }
    }

    fn on_word(&mut self, word: u32) {
        match self.state {
            RxState::Header => {
                let header = Header::decode(word);
                trace!(?header, "bootloader header");
                match header.direction {
                    Direction::Load if header.count > 0 => {
                        self.state = RxState::Data {
                            addr: header.addr,
                            remaining: header.count,
                        };
                    }
                    Direction::Load => {}
                    Direction::Read => {
                        for offset in 0..header.count {
                            let value = self.memory.read_word(header.addr + offset);
                            self.tx.extend(value.to_le_bytes());
                        }
                        debug!(addr = header.addr, count = header.count, "bootloader read");
                    }
                }
            }
            RxState::Data { addr, remaining } => {
                self.memory.load_word(addr, word);
                self.state = if remaining > 1 {
                    RxState::Data {
                        addr: addr + 1,
                        remaining: remaining - 1,
                    }
                } else {
                    RxState::Header
                };
            }
        }
    }
}

impl<M: TargetMemory> Write for Bootloader<M> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.receive(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<M: TargetMemory> Read for Bootloader<M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.tx.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "bootloader has nothing to send",
            ));
        }
        let n = buf.len().min(self.tx.len());
        for (slot, byte) in buf.iter_mut().zip(self.tx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::loader::{Loader, LoaderError};
    use crate::memory::Memory;
    use corebench_hw::memory_map::dmem;

    #[test]
    fn test_load_lands_in_imem() {
        let mut memory = Memory::new();
        let words: Vec<u32> = (1..=200).collect();
        Loader::new(Bootloader::new(&mut memory)).load(10, &words).unwrap();
        assert_eq!(&memory.imem()[10..210], words.as_slice());
        assert_eq!(memory.imem()[9], 0);
        assert_eq!(memory.imem()[210], 0);
    }

    #[test]
    fn test_read_comes_from_dmem() {
        let mut memory = Memory::new();
        memory.write(dmem::BASE, 0xDEAD_BEEF);
        memory.write(dmem::BASE + 4, 42);
        let mut loader = Loader::new(Bootloader::new(&mut memory));
        assert_eq!(loader.read(0, 2).unwrap(), vec![0xDEAD_BEEF, 42]);
    }

    #[test]
    fn test_bytes_may_arrive_split() {
        let mut memory = Memory::new();
        let mut bootloader = Bootloader::new(&mut memory);
        let mut stream = Header::load(0, 2).encode().to_le_bytes().to_vec();
        stream.extend(0x1122_3344u32.to_le_bytes());
        stream.extend(0x5566_7788u32.to_le_bytes());
        for byte in stream {
            bootloader.receive(&[byte]);
        }
        assert_eq!(&memory.imem()[..2], &[0x1122_3344, 0x5566_7788]);
    }

    #[test]
    fn test_silent_target_times_out() {
        let mut bootloader = Bootloader::new(Memory::new());
        let mut byte = [0u8; 1];
        let err = bootloader.read(&mut byte).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_truncated_reply_is_timeout() {
        // A target that forgot one word of its reply.
        struct Forgetful(Bootloader<Memory>);

        impl Read for Forgetful {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.tx.len() <= 4 {
                    return Err(io::ErrorKind::TimedOut.into());
                }
                self.0.read(buf)
            }
        }

        impl Write for Forgetful {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.write(buf)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut loader = Loader::new(Forgetful(Bootloader::new(Memory::new())))
            .with_word_timeout(Duration::ZERO);
        let err = loader.read(0, 3).unwrap_err();
        assert!(matches!(err, LoaderError::Timeout { index: 2 }));
    }
}
