//! Structured per-instruction trace records and their exact textual rendering.
//!
//! > One line per retired instruction: `<cycle> <pc> <word> x<N> (<name>) <= 0x<val>` for
//! > register-writing instructions; `<cycle> <pc> <word> read 0x<addr>, x<N> (<name>) <= 0x<val>`
//! > for loads; `<cycle> <pc> <word> write 0x<addr> <= 0x<val>` for stores. Values are 8-hex-digit.

use crate::registers::Specifier;
use std::fmt;

/// The conventional ABI name for each `x` register, indexed by register number.
pub const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

pub fn abi_name(specifier: Specifier) -> &'static str {
    ABI_NAMES[usize::from(specifier)]
}

/// What, if anything, this instruction did that is worth recording beyond the bare fetch.
#[derive(Debug, Clone, Copy)]
pub enum Effect {
    /// No register write, no memory access (e.g. a branch that fell through, a store... no,
    /// stores are `Store`; this covers e.g. `fence`, a non-taken branch).
    None,
    /// A register write with no memory access.
    RegisterWrite { dest: Specifier, value: u32 },
    /// A load: a memory read followed by a register write.
    Load {
        address: u32,
        dest: Specifier,
        value: u32,
    },
    /// A store: a memory write, with no register write.
    Store { address: u32, value: u32 },
}

/// A single retired-instruction trace record.
#[derive(Debug, Clone, Copy)]
pub struct Record {
    pub cycle: u64,
    pub pc: u32,
    pub word: u32,
    pub effect: Effect,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:08x} {:08x}", self.cycle, self.pc, self.word)?;
        match self.effect {
            Effect::None => Ok(()),
            Effect::RegisterWrite { dest, value } => {
                write!(f, " {dest} ({}) <= 0x{value:08x}", abi_name(dest))
            }
            Effect::Load {
                address,
                dest,
                value,
            } => write!(
                f,
                " read 0x{address:08x}, {dest} ({}) <= 0x{value:08x}",
                abi_name(dest)
            ),
            Effect::Store { address, value } => {
                write!(f, " write 0x{address:08x} <= 0x{value:08x}")
            }
        }
    }
}

/// A sink that trace records are emitted to, one per retired instruction.
pub trait Sink: std::fmt::Debug {
    fn emit(&mut self, record: &Record);
}

/// A [`Sink`] that writes each record as a line to an arbitrary [`std::io::Write`] destination.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: std::io::Write + std::fmt::Debug> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: std::io::Write + std::fmt::Debug> Sink for WriterSink<W> {
    fn emit(&mut self, record: &Record) {
        let _ = writeln!(self.writer, "{record}");
    }
}

/// A [`Sink`] that discards every record; used when tracing is disabled.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn emit(&mut self, _record: &Record) {}
}

/// End-of-run statistics.
///
/// > End-of-run statistics: instruction count, cycle count, derived CPI, wall-clock seconds,
/// > derived MHz.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub instructions: u64,
    pub cycles: u64,
    pub wall_clock_seconds: f64,
}

impl Stats {
    pub fn cpi(&self) -> f64 {
        if self.instructions == 0 {
            0.0
        } else {
            self.cycles as f64 / self.instructions as f64
        }
    }

    pub fn mhz(&self) -> f64 {
        if self.wall_clock_seconds <= 0.0 {
            0.0
        } else {
            self.cycles as f64 / self.wall_clock_seconds / 1_000_000.0
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "instructions : {}", self.instructions)?;
        writeln!(f, "cycles       : {}", self.cycles)?;
        writeln!(f, "CPI          : {:.4}", self.cpi())?;
        writeln!(f, "time         : {:.3} s", self.wall_clock_seconds)?;
        write!(f, "frequency    : {:.3} MHz", self.mhz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_write_format() {
        let record = Record {
            cycle: 42,
            pc: 0x8000_0000,
            word: 0x0051_3023,
            effect: Effect::RegisterWrite {
                dest: Specifier::from_u5(10),
                value: 7,
            },
        };
        assert_eq!(
            "42 80000000 00513023 x10 (a0) <= 0x00000007",
            record.to_string()
        );
    }

    #[test]
    fn test_load_format() {
        let record = Record {
            cycle: 1,
            pc: 0x1000,
            word: 0xdeadbeef,
            effect: Effect::Load {
                address: 0x2000,
                dest: Specifier::from_u5(5),
                value: 0xFF,
            },
        };
        assert_eq!(
            "1 00001000 deadbeef read 0x00002000, x5 (t0) <= 0x000000ff",
            record.to_string()
        );
    }

    #[test]
    fn test_store_format() {
        let record = Record {
            cycle: 2,
            pc: 0x1004,
            word: 0x1234,
            effect: Effect::Store {
                address: 0x3000,
                value: 0x42,
            },
        };
        assert_eq!(
            "2 00001004 00001234 write 0x00003000 <= 0x00000042",
            record.to_string()
        );
    }

    #[test]
    fn test_cpi_and_mhz() {
        let stats = Stats {
            instructions: 100,
            cycles: 200,
            wall_clock_seconds: 0.0002,
        };
        assert!((stats.cpi() - 2.0).abs() < 1e-9);
        assert!((stats.mhz() - 1.0).abs() < 1e-6);
    }
}
