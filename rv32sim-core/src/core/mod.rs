//! The simulated hart: registers, CSR file, trap unit, memory, MMIO, and the per-instruction
//! step loop.

mod counters;
pub mod csr;
mod execute;
pub mod memory;
pub mod mmio;
mod status;
mod trap;

use crate::instruction::Instruction;
use crate::registers::{Registers, Specifier, E_LEN, LEN};
use crate::trace::{self, Effect as TraceEffect, Record};
use counters::Counters;
use memory::{MemoryError, Ram};
use mmio::Mmio;
use status::Status;
use std::sync::atomic::{AtomicBool, Ordering};
use trap::Trap;

/// Identifiers for the machine information registers. Arbitrary but stable values identifying
/// this simulator as the hardware platform.
const MVENDORID: u32 = 0;
const MARCHID: u32 = 0;
const MIMPID: u32 = 0;
const MHARTID: u32 = 0;

/// Which optional extensions beyond the RV32I base are enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extensions {
    /// M: integer multiply/divide.
    pub m: bool,
    /// C: 16-bit compressed instructions.
    pub c: bool,
    /// B: bit-manipulation subset (Zbb-style).
    pub b: bool,
    /// E: reduced 16-register file.
    pub e: bool,
}

impl Extensions {
    /// Computes the `misa` CSR value's extension bitmap (bits 25:0) for the enabled set. Base
    /// `I` is always present.
    fn misa_bits(self) -> u32 {
        let mut bits = 1 << (b'I' - b'A'); // RV32I base
        if self.m {
            bits |= 1 << (b'M' - b'A');
        }
        if self.c {
            bits |= 1 << (b'C' - b'A');
        }
        if self.e {
            bits |= 1 << (b'E' - b'A');
        }
        // The B extension has no reserved misa bit in the frozen base ISA manual; it is exposed
        // only through the configuration surface, not advertised in misa.
        bits
    }
}

/// Simulator configuration, set once at construction time (CLI flags map directly onto this).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Physical base address of the memory image.
    pub mem_base: u32,
    /// Size, in bytes, of the memory image.
    pub mem_size: u32,
    /// Base address of the MMIO window.
    pub mmio_base: u32,
    /// Cycles charged on every taken branch, unconditional jump, and trap/interrupt entry.
    pub branch_penalty: u32,
    /// Enable static branch prediction (backward taken, forward not-taken).
    pub predict: bool,
    /// Model a single shared RAM bank: loads/stores cost one extra cycle.
    pub single_ram: bool,
    pub extensions: Extensions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mem_base: 0x8000_0000,
            mem_size: 16 * 1024 * 1024,
            mmio_base: Mmio::BASE,
            branch_penalty: 2,
            predict: false,
            single_ram: false,
            extensions: Extensions::default(),
        }
    }
}

/// A synchronous exception, carrying the standard RISC-V cause number and an optional `mtval`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Exception {
    InstructionAddressMisaligned(u32),
    InstructionAccessFault(u32),
    IllegalInstruction(u32),
    Breakpoint,
    LoadAddressMisaligned(u32),
    LoadAccessFault(u32),
    StoreAddressMisaligned(u32),
    StoreAccessFault(u32),
    EnvironmentCallFromMMode,
}

impl Exception {
    pub fn cause(self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned(_) => 0,
            Self::InstructionAccessFault(_) => 1,
            Self::IllegalInstruction(_) => 2,
            Self::Breakpoint => 3,
            Self::LoadAddressMisaligned(_) => 4,
            Self::LoadAccessFault(_) => 5,
            Self::StoreAddressMisaligned(_) => 6,
            Self::StoreAccessFault(_) => 7,
            Self::EnvironmentCallFromMMode => 11,
        }
    }

    pub fn tval(self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned(v)
            | Self::InstructionAccessFault(v)
            | Self::IllegalInstruction(v)
            | Self::LoadAddressMisaligned(v)
            | Self::LoadAccessFault(v)
            | Self::StoreAddressMisaligned(v)
            | Self::StoreAccessFault(v) => v,
            Self::Breakpoint | Self::EnvironmentCallFromMMode => 0,
        }
    }
}

/// An enabled, pending machine-mode interrupt.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Interrupt {
    MachineSoftware,
    MachineTimer,
    MachineExternal,
}

impl Interrupt {
    pub fn cause(self) -> u32 {
        let code = match self {
            Self::MachineSoftware => 3,
            Self::MachineTimer => 7,
            Self::MachineExternal => 11,
        };
        (1 << 31) | code
    }

    fn mie_bit(self) -> u32 {
        match self {
            Self::MachineSoftware => 1 << 3,
            Self::MachineTimer => 1 << 7,
            Self::MachineExternal => 1 << 11,
        }
    }
}

/// Outcome of a single retired step.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StepResult {
    Continue,
    /// The guest requested termination through the `exit` MMIO port.
    Exited(u32),
}

#[derive(Debug)]
pub struct Core {
    registers: Registers,
    status: Status,
    trap: Trap,
    counters: Counters,
    mie: u32,
    mtvec: u32,
    ram: Ram,
    mmio: Mmio,
    config: Config,
    sink: Box<dyn trace::Sink>,

    /// mip bits computed at the end of the previous step; consulted at the start of this one,
    /// per the one-step interrupt-delivery delay.
    latched_mip: u32,
    /// Whether the previously retired instruction was compressed (16-bit); used to charge the
    /// compressed/non-compressed transition penalty.
    prev_was_compressed: bool,
    /// Whether the previously retired instruction redirected `pc` itself and already charged its
    /// own branch penalty (a taken branch, `jal`/`jalr`, or `mret`). Consulted only when an
    /// interrupt is taken right after it, so that interrupt entry does not charge a second
    /// `branch_penalty` on top of the one the redirecting instruction already paid.
    prev_was_branch: bool,
    /// Whether the instruction currently being executed was fetched as a compressed halfword.
    /// Consulted by [`execute::Executor`] to compute `pc + 2` vs `pc + 4` link values and branch
    /// fallthrough addresses, since `pc` itself is not advanced until the instruction redirects it.
    current_instruction_is_compressed: bool,
    /// The guest's requested exit status, latched the step the `exit` MMIO port is written.
    exited: Option<u32>,

    halt: AtomicBool,
    is_interrupted: AtomicBool,
    breakpoints: std::collections::BTreeSet<u32>,
}

impl Core {
    pub fn new(config: Config) -> Self {
        let register_count = if config.extensions.e { E_LEN } else { LEN };
        Self {
            registers: Registers::new(register_count, config.mem_base),
            status: Status::new(),
            trap: Trap::new(),
            counters: Counters::new(),
            mie: 0,
            mtvec: 0,
            ram: Ram::new(config.mem_base, config.mem_size),
            mmio: Mmio::new(config.mmio_base),
            config,
            sink: Box::new(trace::NullSink),
            latched_mip: 0,
            prev_was_compressed: false,
            prev_was_branch: false,
            current_instruction_is_compressed: false,
            exited: None,
            halt: AtomicBool::new(false),
            is_interrupted: AtomicBool::new(false),
            breakpoints: std::collections::BTreeSet::new(),
        }
    }

    /// Resets architectural state: all registers zero, `pc = mem_base`, counters zero,
    /// interrupts disabled. Memory contents and breakpoints are left untouched.
    pub fn reset(&mut self) {
        let register_count = if self.config.extensions.e { E_LEN } else { LEN };
        self.registers = Registers::new(register_count, self.config.mem_base);
        self.status = Status::new();
        self.trap = Trap::new();
        self.counters = Counters::new();
        self.mie = 0;
        self.mtvec = 0;
        self.latched_mip = 0;
        self.prev_was_compressed = false;
        self.prev_was_branch = false;
        self.exited = None;
    }

    pub fn set_sink(&mut self, sink: Box<dyn trace::Sink>) {
        self.sink = sink;
    }

    pub fn set_console(&mut self, console: Box<dyn mmio::Console>) {
        self.mmio.set_console(console);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pc(&self) -> u32 {
        self.registers.pc()
    }

    pub fn cycle(&self) -> u64 {
        self.counters.cycle64()
    }

    pub fn instret(&self) -> u64 {
        self.counters.instret64()
    }

    /// Requests the step loop pause before the next step. Safe to call from another task.
    pub fn request_halt(&self) {
        self.halt.store(true, Ordering::SeqCst);
    }

    pub fn clear_halt(&self) {
        self.halt.store(false, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    /// Signals that an out-of-band interrupt (e.g. Ctrl-C on the debug channel) should break an
    /// in-progress `continue` loop. Cleared once observed by [`Self::take_interrupted`].
    pub fn signal_interrupted(&self) {
        self.is_interrupted.store(true, Ordering::SeqCst);
    }

    pub fn take_interrupted(&self) -> bool {
        self.is_interrupted.swap(false, Ordering::SeqCst)
    }

    pub fn insert_breakpoint(&mut self, address: u32) {
        self.breakpoints.insert(address);
    }

    pub fn remove_breakpoint(&mut self, address: u32) {
        self.breakpoints.remove(&address);
    }

    pub fn has_breakpoint(&self, address: u32) -> bool {
        self.breakpoints.contains(&address)
    }

    pub fn read_register(&self, specifier: Specifier) -> u32 {
        self.registers.x(specifier)
    }

    pub fn write_register(&mut self, specifier: Specifier, value: u32) {
        self.registers.set_x(specifier, value)
    }

    /// Overwrites `pc` directly. Used by the debug REPL and the gdb remote-serial bridge; the
    /// step loop itself never calls this.
    pub fn set_pc(&mut self, value: u32) {
        *self.registers.pc_mut() = value;
    }

    /// Reads a CSR for the debug collaborator, bypassing the counter-read convention note (there
    /// is none to bypass: this calls the same masked dispatch the step loop uses).
    pub fn read_csr_debug(&self, specifier: csr::CsrSpecifier) -> Option<u32> {
        self.csr_read(specifier)
    }

    /// Writes a CSR for the debug collaborator with a full mask.
    pub fn write_csr_debug(&mut self, specifier: csr::CsrSpecifier, value: u32) -> bool {
        self.csr_write(specifier, value, 0xFFFF_FFFF)
    }

    /// Reads memory for the debug collaborator, going straight to RAM (no MMIO side effects).
    pub fn read_memory_debug(&self, address: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        self.ram.read(address, buf)
    }

    pub fn write_memory_debug(&mut self, address: u32, buf: &[u8]) -> Result<(), MemoryError> {
        self.ram.write(address, buf)
    }

    /// Loads an ELF segment's bytes into the memory image. Used by the ELF loader.
    pub fn load_segment(&mut self, address: u32, data: &[u8]) {
        self.ram.load(address, data);
    }

    fn recompute_latched_mip(&mut self) {
        let mut mip = 0;
        if self.mmio.software_interrupt_pending() {
            mip |= Interrupt::MachineSoftware.mie_bit();
        }
        if self.mmio.timer_pending() {
            mip |= Interrupt::MachineTimer.mie_bit();
        }
        if self.mmio.external_interrupt_pending() {
            mip |= Interrupt::MachineExternal.mie_bit();
        }
        self.latched_mip = mip;
    }

    /// Returns the highest-priority pending *and enabled* interrupt, using the flags latched at
    /// the end of the previous step. Priority order: external, software, timer.
    fn pending_enabled_interrupt(&self) -> Option<Interrupt> {
        if !self.status.mie() {
            return None;
        }
        for interrupt in [
            Interrupt::MachineExternal,
            Interrupt::MachineSoftware,
            Interrupt::MachineTimer,
        ] {
            if self.latched_mip & self.mie & interrupt.mie_bit() != 0 {
                return Some(interrupt);
            }
        }
        None
    }

    /// Enters a trap: charges the branch penalty, updates `mstatus`, `mcause`, `mtval`, `mepc`,
    /// and redirects `pc` per `mtvec`'s mode.
    ///
    /// Synchronous exceptions always charge the penalty. Interrupts charge it only when
    /// `prev_was_branch` is clear — an interrupt taken right after a taken branch, jump, or
    /// `mret` must not double-charge the penalty that instruction already paid.
    fn enter_trap(&mut self, cause: u32, tval: u32, epc: u32, is_interrupt: bool) {
        if !is_interrupt || !self.prev_was_branch {
            self.charge_branch_penalty();
        }
        self.status.set_mpie(self.status.mie());
        self.status.set_mie(false);
        self.trap.set_mcause(cause);
        self.trap.set_mtval(tval);
        self.trap.set_mepc(epc);
        let vectored = self.mtvec & 0b1 != 0;
        let base = self.mtvec & !0b11;
        *self.registers.pc_mut() = if vectored {
            base.wrapping_add((cause & !(1 << 31)).wrapping_mul(4))
        } else {
            base
        };
    }

    fn do_mret(&mut self) {
        self.charge_branch_penalty();
        *self.registers.pc_mut() = self.trap.read_mepc();
        self.status.set_mie(self.status.mpie());
        self.status.set_mpie(true);
    }

    fn charge_branch_penalty(&mut self) {
        for _ in 0..self.config.branch_penalty {
            self.counters.increment_cycle();
        }
    }

    /// CSR read, routed by specifier. Returns `None` for unsupported CSRs (illegal instruction).
    ///
    /// Counter CSRs report the count as of the instruction preceding this one: since this read
    /// runs before the current step's own counter increment, the stored value already reflects
    /// that state, so no adjustment is needed here.
    fn csr_read(&self, specifier: csr::CsrSpecifier) -> Option<u32> {
        if !csr::is_supported(specifier) {
            return None;
        }
        Some(match specifier {
            csr::MVENDORID => MVENDORID,
            csr::MARCHID => MARCHID,
            csr::MIMPID => MIMPID,
            csr::MHARTID => MHARTID,
            csr::MSTATUS => self.status.read(),
            csr::MISA => (0b01 << 30) | self.config.extensions.misa_bits(),
            csr::MIE => self.mie,
            csr::MTVEC => self.mtvec,
            csr::MSCRATCH => self.trap.read_mscratch(),
            csr::MEPC => self.trap.read_mepc(),
            csr::MCAUSE => self.trap.read_mcause(),
            csr::MTVAL => self.trap.read_mtval(),
            csr::MIP => self.latched_mip,
            csr::CYCLE => self.counters.read_mcycle(),
            csr::CYCLEH => self.counters.read_mcycleh(),
            csr::INSTRET => self.counters.read_minstret(),
            csr::INSTRETH => self.counters.read_minstreth(),
            _ => unreachable!("checked by is_supported above"),
        })
    }

    /// Masked CSR write, routed by specifier. Returns `false` for unsupported or read-only CSRs.
    fn csr_write(&mut self, specifier: csr::CsrSpecifier, value: u32, mask: u32) -> bool {
        if !csr::is_supported(specifier) || csr::is_read_only(specifier) {
            return false;
        }
        match specifier {
            csr::MSTATUS => self.status.write(value, mask),
            csr::MIE => self.mie = self.mie & !mask | value & mask,
            csr::MTVEC => self.mtvec = self.mtvec & !mask | value & mask,
            csr::MSCRATCH => self.trap.write_mscratch(value, mask),
            csr::MEPC => self.trap.write_mepc(value, mask),
            csr::MCAUSE => self.trap.write_mcause(value, mask),
            csr::MTVAL => self.trap.write_mtval(value, mask),
            csr::MIP => {} // mip bits are computed from MMIO state; direct writes are WARL no-ops.
            _ => return false,
        }
        true
    }

    fn read_u8_slice(&mut self, address: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        if self.ram.contains(address, buf.len() as u32) {
            self.ram.read(address, buf)
        } else {
            Err(MemoryError::AccessFault)
        }
    }

    fn fetch(&mut self, pc: u32) -> Result<(Instruction, u32, bool), Exception> {
        if self.config.extensions.c {
            if pc & 0b1 != 0 {
                return Err(Exception::InstructionAddressMisaligned(pc));
            }
            let mut low_buf = [0u8; 2];
            self.read_u8_slice(pc, &mut low_buf)
                .map_err(|_| Exception::InstructionAccessFault(pc))?;
            let low = u16::from_le_bytes(low_buf);
            if crate::decompress::is_compressed(low) {
                let word = crate::decompress::expand(low)
                    .map_err(|_| Exception::IllegalInstruction(u32::from(low)))?;
                let instruction = Instruction::decode(word)
                    .map_err(|_| Exception::IllegalInstruction(word))?;
                return Ok((instruction, word, true));
            }
            let mut high_buf = [0u8; 2];
            self.read_u8_slice(pc.wrapping_add(2), &mut high_buf)
                .map_err(|_| Exception::InstructionAccessFault(pc))?;
            let high = u16::from_le_bytes(high_buf);
            let word = (u32::from(high) << 16) | u32::from(low);
            return Instruction::decode(word)
                .map(|instruction| (instruction, word, false))
                .map_err(|_| Exception::IllegalInstruction(word));
        }
        if pc & 0b11 != 0 {
            return Err(Exception::InstructionAddressMisaligned(pc));
        }
        let mut buf = [0u8; 4];
        self.read_u8_slice(pc, &mut buf)
            .map_err(|_| Exception::InstructionAccessFault(pc))?;
        let word = u32::from_le_bytes(buf);
        Instruction::decode(word)
            .map(|instruction| (instruction, word, false))
            .map_err(|_| Exception::IllegalInstruction(word))
    }

    /// Runs a single step of the per-instruction state machine, emitting one trace record.
    pub fn step(&mut self) -> StepResult {
        if let Some(status) = self.exited {
            return StepResult::Exited(status);
        }

        let prev_pc = self.registers.pc();
        let prev_was_compressed = self.prev_was_compressed;
        let fetched = self.fetch(prev_pc);

        let is_system_instruction = matches!(
            fetched,
            Ok((
                Instruction::Ecall
                    | Instruction::Ebreak
                    | Instruction::Mret
                    | Instruction::Csr { .. }
                    | Instruction::Csri { .. },
                _,
                _,
            ))
        );

        if !is_system_instruction {
            if let Some(interrupt) = self.pending_enabled_interrupt() {
                self.enter_trap(interrupt.cause(), 0, self.registers.pc(), true);
                self.retire_step(prev_was_compressed, false, false, false);
                self.emit(prev_pc, 0, TraceEffect::None);
                return self.check_exit();
            }
        }

        match fetched {
            Ok((instruction, word, is_compressed)) => {
                self.current_instruction_is_compressed = is_compressed;
                let redirects_pc_itself = matches!(
                    instruction,
                    Instruction::Jal { .. }
                        | Instruction::Jalr { .. }
                        | Instruction::Branch { .. }
                        | Instruction::Mret
                );
                let outcome = execute::Executor::new(self).execute(instruction);
                match outcome {
                    Ok((effect, branched)) => {
                        if !redirects_pc_itself {
                            *self.registers.pc_mut() =
                                prev_pc.wrapping_add(if is_compressed { 2 } else { 4 });
                        }
                        if branched {
                            self.charge_branch_penalty();
                        }
                        let did_memory_access =
                            matches!(effect, TraceEffect::Load { .. } | TraceEffect::Store { .. });
                        // `branched` covers taken branches and jal/jalr; mret charges its own
                        // penalty inside `do_mret` but reports `branched = false`, so it is
                        // added back in here for the purposes of the next step's interrupt check.
                        let already_charged_penalty =
                            branched || matches!(instruction, Instruction::Mret);
                        self.retire_step(
                            prev_was_compressed,
                            is_compressed,
                            did_memory_access,
                            already_charged_penalty,
                        );
                        self.emit(prev_pc, word, effect);
                    }
                    Err(exception) => {
                        self.enter_trap(exception.cause(), exception.tval(), prev_pc, false);
                        self.retire_step(prev_was_compressed, is_compressed, false, false);
                        self.emit(prev_pc, word, TraceEffect::None);
                    }
                }
            }
            Err(exception) => {
                self.enter_trap(exception.cause(), exception.tval(), prev_pc, false);
                self.retire_step(prev_was_compressed, false, false, false);
                self.emit(prev_pc, 0, TraceEffect::None);
            }
        };

        self.check_exit()
    }

    /// Shared end-of-step bookkeeping: counters, `mtime`, the interrupt latch, the
    /// compressed-transition penalty, and the single-RAM load/store penalty.
    fn retire_step(
        &mut self,
        prev_was_compressed: bool,
        is_compressed: bool,
        did_memory_access: bool,
        already_charged_penalty: bool,
    ) {
        self.counters.increment_instret();
        self.counters.increment_cycle();
        if prev_was_compressed != is_compressed {
            self.counters.increment_cycle();
        }
        if self.config.single_ram && did_memory_access {
            self.counters.increment_cycle();
        }
        self.prev_was_compressed = is_compressed;
        self.prev_was_branch = already_charged_penalty;
        self.mmio.tick();
        self.recompute_latched_mip();
    }

    fn emit(&mut self, pc: u32, word: u32, effect: TraceEffect) {
        let record = Record {
            cycle: self.counters.cycle64(),
            pc,
            word,
            effect,
        };
        self.sink.emit(&record);
    }

    /// Routes an MMIO-bound load/store through [`Mmio`], recording an exit request if the guest
    /// just wrote the `exit` port.
    fn mmio_write(&mut self, offset: u32, value: u32) {
        if let mmio::Effect::Exit(status) = self.mmio.write_word(offset, value) {
            self.exited = Some(status);
        }
    }

    fn check_exit(&self) -> StepResult {
        match self.exited {
            Some(status) => StepResult::Exited(status),
            None => StepResult::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Specifier;

    fn make_core() -> Core {
        let config = Config {
            mem_base: 0,
            mem_size: 0x1000,
            ..Config::default()
        };
        Core::new(config)
    }

    fn store_word(core: &mut Core, address: u32, word: u32) {
        core.load_segment(address, &word.to_le_bytes());
    }

    #[test]
    fn test_add_sub_sanity() {
        let mut core = make_core();
        store_word(&mut core, 0, 0x0070_0293); // addi x5, x0, 7
        store_word(&mut core, 4, 0xFFD0_0313); // addi x6, x0, -3
        store_word(&mut core, 8, 0x0062_83B3); // add x7, x5, x6
        store_word(&mut core, 12, 0x4062_8433); // sub x8, x5, x6
        for _ in 0..4 {
            core.step();
        }
        assert_eq!(4, core.read_register(Specifier::from_u5(7)));
        assert_eq!(0xFFFF_FFFD, core.read_register(Specifier::from_u5(6)));
        assert_eq!(10, core.read_register(Specifier::from_u5(8)));
    }

    #[test]
    fn test_instret_increments_once_per_step() {
        let mut core = make_core();
        store_word(&mut core, 0, 0x0000_0013); // nop (addi x0, x0, 0)
        core.step();
        assert_eq!(1, core.instret());
        core.step();
        assert_eq!(2, core.instret());
    }

    #[test]
    fn test_x0_always_reads_zero() {
        let mut core = make_core();
        core.write_register(Specifier::X0, 0xDEAD_BEEF);
        assert_eq!(0, core.read_register(Specifier::X0));
    }

    #[test]
    fn test_csr_read_modify_write() {
        let mut core = make_core();
        // csrrsi x5, mstatus, 8
        store_word(
            &mut core,
            0,
            (8 << 15) | (0b110 << 12) | (5 << 7) | 0b111_0011 | (0x300 << 20),
        );
        // csrrci x6, mstatus, 8
        store_word(
            &mut core,
            4,
            (8 << 15) | (0b111 << 12) | (6 << 7) | 0b111_0011 | (0x300 << 20),
        );
        core.step();
        assert_eq!(0, core.read_register(Specifier::from_u5(5)));
        assert_eq!(8, core.csr_read(csr::MSTATUS).unwrap());
        core.step();
        assert_eq!(8, core.read_register(Specifier::from_u5(6)));
        assert_eq!(0, core.csr_read(csr::MSTATUS).unwrap());
    }

    #[test]
    fn test_misaligned_load_traps() {
        let mut core = make_core();
        // lh x5, 1(x0)
        store_word(
            &mut core,
            0,
            (1u32 << 20) | (0 << 15) | (0b001 << 12) | (5 << 7) | 0b000_0011,
        );
        core.step();
        assert_eq!(4, core.csr_read(csr::MCAUSE).unwrap());
        assert_eq!(1, core.csr_read(csr::MTVAL).unwrap());
    }

    #[test]
    fn test_mret_restores_pc() {
        let mut core = make_core();
        core.trap.set_mepc(0x40);
        store_word(&mut core, 0, 0x3020_0073); // mret
        core.step();
        assert_eq!(0x40, core.pc());
    }

    #[test]
    fn test_interrupt_right_after_taken_branch_does_not_double_charge_penalty() {
        let mut core = make_core();
        store_word(&mut core, 0, 0x0000_0463); // beq x0, x0, 8 (always taken)
        store_word(&mut core, 8, 0x0000_0013); // nop

        core.step();
        assert_eq!(8, core.pc());
        assert_eq!(1 + core.config.branch_penalty as u64, core.cycle());
        assert!(core.prev_was_branch);

        // Arm a pending, enabled machine-timer interrupt for the next step.
        core.status.set_mie(true);
        core.mie = Interrupt::MachineTimer.mie_bit();
        core.latched_mip = Interrupt::MachineTimer.mie_bit();
        core.mtvec = 0x100;

        let cycle_before_interrupt = core.cycle();
        core.step();
        assert_eq!(0x100, core.pc());
        assert_eq!((1u32 << 31) | 7, core.csr_read(csr::MCAUSE).unwrap());
        // The taken branch already paid the branch penalty; the interrupt that immediately
        // follows it must only add the one-cycle per-step bump, not a second penalty.
        assert_eq!(cycle_before_interrupt + 1, core.cycle());
        assert!(!core.prev_was_branch);
    }

    #[test]
    fn test_interrupt_after_ordinary_instruction_still_charges_penalty() {
        let mut core = make_core();
        store_word(&mut core, 0, 0x0000_0013); // nop
        core.step();
        assert!(!core.prev_was_branch);

        core.status.set_mie(true);
        core.mie = Interrupt::MachineTimer.mie_bit();
        core.latched_mip = Interrupt::MachineTimer.mie_bit();
        core.mtvec = 0x100;

        let cycle_before_interrupt = core.cycle();
        core.step();
        assert_eq!(0x100, core.pc());
        assert_eq!(
            cycle_before_interrupt + 1 + core.config.branch_penalty as u64,
            core.cycle()
        );
    }
}
