//! Host side of the serial bootloader protocol.
//!
//! Every transaction starts with one header word; all words are 32-bit
//! little-endian. A load header is followed by up to [`CHUNK_WORDS`] data
//! words from the host. A read header is answered by the target with the
//! requested number of words.
//!
//! ```text
//!  31   30              16 15               0
//! +---+------------------+------------------+
//! |dir|   word address   |    word count    |
//! +---+------------------+------------------+
//! ```

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use corebench_hw::specs::loader::{
    ADDR_MASK, ADDR_SHIFT, CHUNK_WORDS, COUNT_MASK, DIR_LOAD, MAX_WORDS, READ_TIMEOUT_MS,
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("serial i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("timeout reading word {index}")]
    Timeout { index: u32 },
    #[error("address range 0x{addr:04x}+{count} exceeds {max} words")]
    OutOfRange { addr: u32, count: usize, max: u32 },
    #[error("read needs a non-zero word count")]
    EmptyRead,
    #[error("nothing to load")]
    EmptyLoad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Load,
    Read,
}

/// Transaction header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub direction: Direction,
    pub addr: u32,
    pub count: u32,
}

impl Header {
    pub fn load(addr: u32, count: u32) -> Self {
        Self {
            direction: Direction::Load,
            addr,
            count,
        }
    }

    pub fn read(addr: u32, count: u32) -> Self {
        Self {
            direction: Direction::Read,
            addr,
            count,
        }
    }

    pub fn encode(&self) -> u32 {
        let dir = match self.direction {
            Direction::Load => DIR_LOAD,
            Direction::Read => 0,
        };
        dir | ((self.addr & ADDR_MASK) << ADDR_SHIFT) | (self.count & COUNT_MASK)
    }

    pub fn decode(word: u32) -> Self {
        Self {
            direction: if word & DIR_LOAD != 0 {
                Direction::Load
            } else {
                Direction::Read
            },
            addr: (word >> ADDR_SHIFT) & ADDR_MASK,
            count: word & COUNT_MASK,
        }
    }
}

/// Rejects ranges past the addressable window before anything is sent.
pub fn check_range(addr: u32, count: usize) -> Result<(), LoaderError> {
    if u64::from(addr) + count as u64 > u64::from(MAX_WORDS) {
        return Err(LoaderError::OutOfRange {
            addr,
            count,
            max: MAX_WORDS,
        });
    }
    Ok(())
}

/// Drives the protocol over any byte link with a read timeout.
///
/// The link's own read timeout only bounds a single `read` call; every
/// response word gets its own deadline of `word_timeout` on top of that.
pub struct Loader<L> {
    link: L,
    word_timeout: Duration,
}

impl<L: Read + Write> Loader<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            word_timeout: Duration::from_millis(READ_TIMEOUT_MS),
        }
    }

    pub fn with_word_timeout(mut self, word_timeout: Duration) -> Self {
        self.word_timeout = word_timeout;
        self
    }

    pub fn into_inner(self) -> L {
        self.link
    }

    fn send(&mut self, word: u32) -> Result<(), LoaderError> {
        self.link.write_all(&word.to_le_bytes())?;
        Ok(())
    }

    /// Waits for response word `index`, failing once its deadline passes.
    fn receive(&mut self, index: u32) -> Result<u32, LoaderError> {
        let deadline = Instant::now() + self.word_timeout;
        let mut bytes = [0u8; 4];
        let mut filled = 0;
        loop {
            match self.link.read(&mut bytes[filled..]) {
                Ok(0) => return Err(LoaderError::Timeout { index }),
                Ok(n) => {
                    filled += n;
                    if filled == bytes.len() {
                        return Ok(u32::from_le_bytes(bytes));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
                Err(e) => return Err(e.into()),
            }
            if Instant::now() >= deadline {
                return Err(LoaderError::Timeout { index });
            }
        }
    }

    /// Loads `words` starting at word address `addr`, split into chunks.
    pub fn load(&mut self, addr: u32, words: &[u32]) -> Result<(), LoaderError> {
        if words.is_empty() {
            return Err(LoaderError::EmptyLoad);
        }
        check_range(addr, words.len())?;

        let mut chunk_addr = addr;
        for chunk in words.chunks(CHUNK_WORDS) {
            let header = Header::load(chunk_addr, chunk.len() as u32);
            debug!(addr = chunk_addr, count = chunk.len(), "load chunk");
            self.send(header.encode())?;
            for &word in chunk {
                self.send(word)?;
            }
            chunk_addr += chunk.len() as u32;
        }
        self.link.flush()?;
        info!(addr, words = words.len(), "load complete");
        Ok(())
    }

    /// Reads `count` words from word address `addr`, handing each to
    /// `on_word` with its address as it arrives.
    pub fn read_with(
        &mut self,
        addr: u32,
        count: u32,
        mut on_word: impl FnMut(u32, u32),
    ) -> Result<(), LoaderError> {
        if count == 0 {
            return Err(LoaderError::EmptyRead);
        }
        check_range(addr, count as usize)?;

        self.send(Header::read(addr, count).encode())?;
        self.link.flush()?;
        for index in 0..count {
            let word = self.receive(index)?;
            on_word(addr + index, word);
        }
        Ok(())
    }

    pub fn read(&mut self, addr: u32, count: u32) -> Result<Vec<u32>, LoaderError> {
        let mut words = Vec::with_capacity(count as usize);
        self.read_with(addr, count, |_, word| words.push(word))?;
        Ok(words)
    }
}

/// `dmem[0x0004]=0x6c6c6548, Hell`
pub fn format_word(addr: u32, word: u32) -> String {
    let text: String = word
        .to_le_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect();
    format!("dmem[0x{addr:04x}]=0x{word:08x}, {text}")
}
