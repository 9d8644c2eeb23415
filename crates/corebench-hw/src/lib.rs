//! Hardware definitions for the corebench target: memory map, peripheral
//! register offsets, CSR numbers, timing constants and result codes.
//!
//! This crate only carries numbers. Behaviour lives in `corebench`.

pub mod memory_map;
pub mod specs;

pub mod mmio {
    pub mod clint;
    pub mod gpio;
}
