#[macro_use]
extern crate static_assertions;

pub mod core;
pub mod decompress;
pub mod instruction;
pub mod registers;
pub mod trace;

pub use core::{Config, Core, Extensions, StepResult};

/// Collection of the units in which memory can be addressed (in bytes).
pub mod unit {
    /// A _byte_ is 8 bits.
    pub const BYTE: u32 = 1;
    /// A _halfword_ is 16 bits (2 bytes).
    pub const HALFWORD: u32 = 2;
    /// A _word_ is 32 bits (4 bytes).
    pub const WORD: u32 = 4;
}
