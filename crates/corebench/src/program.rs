//! Program images in the bootloader's text format.
//!
//! An image file holds one or more hexadecimal words per line. `#` and `//`
//! start a comment that runs to the end of the line. A token that is not
//! a hex word ends parsing of its line.

use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("cannot read program: {0}")]
    Io(#[from] std::io::Error),
    #[error("program image is empty")]
    Empty,
    #[error("program of {words} words exceeds the {limit}-word limit")]
    TooLarge { words: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    words: Vec<u32>,
}

fn parse_word(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(digits, 16).ok()
}

impl ProgramImage {
    pub fn from_words(words: Vec<u32>) -> Result<Self, ProgramError> {
        if words.is_empty() {
            return Err(ProgramError::Empty);
        }
        Ok(Self { words })
    }

    /// Parses the text format.
    pub fn parse(text: &str) -> Result<Self, ProgramError> {
        let mut words = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let code = line
                .split('#')
                .next()
                .and_then(|code| code.split("//").next())
                .unwrap_or_default();
            for token in code.split_whitespace() {
                match parse_word(token) {
                    Some(word) => words.push(word),
                    None => {
                        warn!(line = number + 1, token, "not a hex word, rest of line skipped");
                        break;
                    }
                }
            }
        }
        debug!(words = words.len(), "program parsed");
        Self::from_words(words)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, ProgramError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Packs a raw little-endian binary into words, zero-padding the tail.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, ProgramError> {
        let words = bytes
            .chunks(4)
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(word)
            })
            .collect();
        Self::from_words(words)
    }

    /// Fails when the image does not fit in `limit` words.
    pub fn check_fits(&self, limit: usize) -> Result<(), ProgramError> {
        if self.words.len() > limit {
            return Err(ProgramError::TooLarge {
                words: self.words.len(),
                limit,
            });
        }
        Ok(())
    }

    /// Keeps at most `limit` words.
    pub fn truncate(&mut self, limit: usize) {
        self.words.truncate(limit.max(1));
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// One `%08x` word per line
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.words.len() * 9);
        for word in &self.words {
            let _ = writeln!(text, "{word:08x}");
        }
        text
    }
}
