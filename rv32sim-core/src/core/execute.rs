//! Per-instruction execution, dispatched from [`super::Core::step`].

use log::trace;

use super::{Core, Exception};
use crate::instruction::{
    BranchCondition, CsrOp, Instruction, LoadWidth, RegImmOp, RegRegOp, RegShiftImmOp, RegUnaryOp,
    StoreWidth,
};
use crate::registers::Specifier;
use crate::trace::Effect as TraceEffect;

/// Outcome of executing one instruction: the trace effect to emit, and whether this instruction
/// counts as a taken branch/jump for the purpose of the branch-penalty cycle charge.
pub(super) type ExecutionResult = Result<(TraceEffect, bool), Exception>;

#[derive(Debug)]
pub(super) struct Executor<'c> {
    core: &'c mut Core,
}

impl<'c> Executor<'c> {
    pub fn new(core: &'c mut Core) -> Self {
        Self { core }
    }

    pub fn execute(&mut self, instruction: Instruction) -> ExecutionResult {
        trace!("Executing {instruction:?}");
        match instruction {
            Instruction::OpImm {
                op,
                dest,
                src,
                immediate,
            } => self.op_imm(op, dest, src, immediate),
            Instruction::OpShiftImm {
                op,
                dest,
                src,
                shift_amount_u5,
            } => self.op_shift_imm(op, dest, src, shift_amount_u5),
            Instruction::OpUnary { op, dest, src } => self.op_unary(op, dest, src),
            Instruction::Auipc { dest, immediate } => self.auipc(dest, immediate),
            Instruction::Lui { dest, immediate } => self.lui(dest, immediate),
            Instruction::Op {
                op,
                dest,
                src1,
                src2,
            } => self.op(op, dest, src1, src2),
            Instruction::Jal { dest, offset } => self.jal(dest, offset),
            Instruction::Jalr { dest, base, offset } => self.jalr(dest, base, offset),
            Instruction::Branch {
                condition,
                src1,
                src2,
                offset,
            } => self.branch(condition, src1, src2, offset),
            Instruction::Load {
                width,
                dest,
                base,
                offset,
            } => self.load(width, dest, base, offset),
            Instruction::Store {
                width,
                src,
                base,
                offset,
            } => self.store(width, src, base, offset),
            Instruction::Fence { .. } => Ok((TraceEffect::None, false)),
            Instruction::Ecall => Err(Exception::EnvironmentCallFromMMode),
            Instruction::Ebreak => Err(Exception::Breakpoint),
            Instruction::Mret => {
                self.core.do_mret();
                Ok((TraceEffect::None, false))
            }
            Instruction::Csr {
                op,
                dest,
                csr,
                src,
            } => {
                // CSRRW always writes, even when rs1=x0; CSRRS/CSRRC skip the write (and its
                // read-only check) when rs1=x0, treating the instruction as a pure read.
                let should_write = matches!(op, CsrOp::ReadWrite) || u8::from(src) != 0;
                let src_value = self.core.read_register(src);
                self.csr_op(op, dest, csr, src_value, should_write)
            }
            Instruction::Csri {
                op,
                dest,
                csr,
                immediate,
            } => {
                // Same rule as above, keyed on the 5-bit immediate field instead of a register.
                let should_write = matches!(op, CsrOp::ReadWrite) || immediate != 0;
                self.csr_op(op, dest, csr, immediate, should_write)
            }
        }
    }

    fn write_register(&mut self, dest: Specifier, value: u32) -> ExecutionResult {
        self.core.write_register(dest, value);
        Ok((TraceEffect::RegisterWrite { dest, value }, false))
    }

    fn op_imm(&mut self, op: RegImmOp, dest: Specifier, src: Specifier, immediate: i32) -> ExecutionResult {
        let s = self.core.read_register(src) as i32;
        let value = match op {
            RegImmOp::Addi => s.wrapping_add(immediate) as u32,
            RegImmOp::Slti => u32::from(s < immediate),
            RegImmOp::Sltiu => u32::from((s as u32) < (immediate as u32)),
            RegImmOp::Xori => (s ^ immediate) as u32,
            RegImmOp::Ori => (s | immediate) as u32,
            RegImmOp::Andi => (s & immediate) as u32,
        };
        self.write_register(dest, value)
    }

    fn op_shift_imm(
        &mut self,
        op: RegShiftImmOp,
        dest: Specifier,
        src: Specifier,
        shamt: u32,
    ) -> ExecutionResult {
        if op.is_b_extension() && !self.core.config.extensions.b {
            return Err(Exception::IllegalInstruction(0));
        }
        let s = self.core.read_register(src);
        let value = match op {
            RegShiftImmOp::Slli => s.wrapping_shl(shamt),
            RegShiftImmOp::Srli => s.wrapping_shr(shamt),
            RegShiftImmOp::Srai => (s as i32).wrapping_shr(shamt) as u32,
            RegShiftImmOp::Rori => s.rotate_right(shamt),
        };
        self.write_register(dest, value)
    }

    fn op_unary(&mut self, op: RegUnaryOp, dest: Specifier, src: Specifier) -> ExecutionResult {
        if !self.core.config.extensions.b {
            return Err(Exception::IllegalInstruction(0));
        }
        let s = self.core.read_register(src);
        let value = match op {
            RegUnaryOp::Clz => s.leading_zeros(),
            RegUnaryOp::Ctz => s.trailing_zeros(),
            RegUnaryOp::Cpop => s.count_ones(),
            RegUnaryOp::SextB => (s as i8) as i32 as u32,
            RegUnaryOp::SextH => (s as i16) as i32 as u32,
            RegUnaryOp::OrcB => {
                let bytes = s.to_le_bytes().map(|b| if b == 0 { 0 } else { 0xFF });
                u32::from_le_bytes(bytes)
            }
            RegUnaryOp::Rev8 => s.swap_bytes(),
        };
        self.write_register(dest, value)
    }

    fn auipc(&mut self, dest: Specifier, immediate: i32) -> ExecutionResult {
        let value = self.core.registers.pc().wrapping_add(immediate as u32);
        self.write_register(dest, value)
    }

    fn lui(&mut self, dest: Specifier, immediate: i32) -> ExecutionResult {
        self.write_register(dest, immediate as u32)
    }

    fn op(&mut self, op: RegRegOp, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        if op.is_m_extension() && !self.core.config.extensions.m {
            return Err(Exception::IllegalInstruction(0));
        }
        if op.is_b_extension() && !self.core.config.extensions.b {
            return Err(Exception::IllegalInstruction(0));
        }
        let a = self.core.read_register(src1);
        let b = self.core.read_register(src2);
        let value = match op {
            RegRegOp::Add => a.wrapping_add(b),
            RegRegOp::Slt => u32::from((a as i32) < (b as i32)),
            RegRegOp::Sltu => u32::from(a < b),
            RegRegOp::And => a & b,
            RegRegOp::Or => a | b,
            RegRegOp::Xor => a ^ b,
            RegRegOp::Sll => a.wrapping_shl(b & 0x1F),
            RegRegOp::Srl => a.wrapping_shr(b & 0x1F),
            RegRegOp::Sub => a.wrapping_sub(b),
            RegRegOp::Sra => (a as i32).wrapping_shr(b & 0x1F) as u32,
            RegRegOp::Mul => a.wrapping_mul(b),
            RegRegOp::Mulh => {
                let product = i64::from(a as i32) * i64::from(b as i32);
                (product >> 32) as u32
            }
            RegRegOp::Mulhsu => {
                let product = i64::from(a as i32) * (b as i64);
                (product >> 32) as u32
            }
            RegRegOp::Mulhu => {
                let product = u64::from(a) * u64::from(b);
                (product >> 32) as u32
            }
            RegRegOp::Div => {
                let (a, b) = (a as i32, b as i32);
                if b == 0 {
                    u32::MAX
                } else if a == i32::MIN && b == -1 {
                    a as u32
                } else {
                    (a / b) as u32
                }
            }
            RegRegOp::Divu => {
                if b == 0 {
                    u32::MAX
                } else {
                    a / b
                }
            }
            RegRegOp::Rem => {
                let (a, b) = (a as i32, b as i32);
                if b == 0 {
                    a as u32
                } else if a == i32::MIN && b == -1 {
                    0
                } else {
                    (a % b) as u32
                }
            }
            RegRegOp::Remu => {
                if b == 0 {
                    a
                } else {
                    a % b
                }
            }
            RegRegOp::Andn => a & !b,
            RegRegOp::Orn => a | !b,
            RegRegOp::Xnor => !(a ^ b),
            RegRegOp::Max => {
                if (a as i32) >= (b as i32) {
                    a
                } else {
                    b
                }
            }
            RegRegOp::Maxu => a.max(b),
            RegRegOp::Min => {
                if (a as i32) <= (b as i32) {
                    a
                } else {
                    b
                }
            }
            RegRegOp::Minu => a.min(b),
            RegRegOp::Rol => a.rotate_left(b & 0x1F),
            RegRegOp::Ror => a.rotate_right(b & 0x1F),
        };
        self.write_register(dest, value)
    }

    fn jal(&mut self, dest: Specifier, offset: i32) -> ExecutionResult {
        let pc = self.core.registers.pc();
        let target = pc.wrapping_add(offset as u32) & !0b1;
        let link = pc.wrapping_add(if self.core_last_fetch_was_compressed() { 2 } else { 4 });
        self.core.write_register(dest, link);
        *self.core.registers.pc_mut() = target;
        Ok((TraceEffect::RegisterWrite { dest, value: link }, true))
    }

    fn jalr(&mut self, dest: Specifier, base: Specifier, offset: i32) -> ExecutionResult {
        let pc = self.core.registers.pc();
        let base_value = self.core.read_register(base);
        let target = base_value.wrapping_add(offset as u32) & !0b1;
        let link = pc.wrapping_add(if self.core_last_fetch_was_compressed() { 2 } else { 4 });
        self.core.write_register(dest, link);
        *self.core.registers.pc_mut() = target;
        Ok((TraceEffect::RegisterWrite { dest, value: link }, true))
    }

    fn branch(
        &mut self,
        condition: BranchCondition,
        src1: Specifier,
        src2: Specifier,
        offset: i32,
    ) -> ExecutionResult {
        let a = self.core.read_register(src1);
        let b = self.core.read_register(src2);
        let taken = match condition {
            BranchCondition::Beq => a == b,
            BranchCondition::Bne => a != b,
            BranchCondition::Blt => (a as i32) < (b as i32),
            BranchCondition::Bge => (a as i32) >= (b as i32),
            BranchCondition::Bltu => a < b,
            BranchCondition::Bgeu => a >= b,
        };
        let pc = self.core.registers.pc();
        let is_backward = offset < 0;
        if taken {
            *self.core.registers.pc_mut() = pc.wrapping_add(offset as u32) & !0b1;
        } else {
            *self.core.registers.pc_mut() =
                pc.wrapping_add(if self.core_last_fetch_was_compressed() { 2 } else { 4 });
        }
        // Without static prediction, the penalty is charged whenever a branch is actually taken.
        // With prediction: backward branches are predicted taken, forward predicted not-taken, so
        // the penalty is charged only on misprediction.
        let charge_penalty = if self.core.config.predict {
            taken != is_backward
        } else {
            taken
        };
        Ok((TraceEffect::None, charge_penalty))
    }

    fn load(&mut self, width: LoadWidth, dest: Specifier, base: Specifier, offset: i32) -> ExecutionResult {
        let address = self.core.read_register(base).wrapping_add(offset as u32);
        let size = load_width_size(width);
        if size > 1 && address % size != 0 {
            return Err(Exception::LoadAddressMisaligned(address));
        }
        let raw = self
            .read_memory(address, size)
            .ok_or(Exception::LoadAccessFault(address))?;
        let value = match width {
            LoadWidth::Lb => (raw as i8) as i32 as u32,
            LoadWidth::Lh => (raw as i16) as i32 as u32,
            LoadWidth::Lw => raw,
            LoadWidth::Lbu => raw & 0xFF,
            LoadWidth::Lhu => raw & 0xFFFF,
        };
        self.core.write_register(dest, value);
        Ok((
            TraceEffect::Load {
                address,
                dest,
                value,
            },
            false,
        ))
    }

    fn store(&mut self, width: StoreWidth, src: Specifier, base: Specifier, offset: i32) -> ExecutionResult {
        let address = self.core.read_register(base).wrapping_add(offset as u32);
        let size = store_width_size(width);
        if size > 1 && address % size != 0 {
            return Err(Exception::StoreAddressMisaligned(address));
        }
        let value = self.core.read_register(src);
        let truncated = match width {
            StoreWidth::Sb => value & 0xFF,
            StoreWidth::Sh => value & 0xFFFF,
            StoreWidth::Sw => value,
        };
        self.write_memory(address, size, truncated)
            .ok_or(Exception::StoreAccessFault(address))?;
        Ok((
            TraceEffect::Store {
                address,
                value: truncated,
            },
            false,
        ))
    }

    /// Reads `size` bytes (1, 2, or 4) at `address`, routing through RAM or MMIO.
    fn read_memory(&mut self, address: u32, size: u32) -> Option<u32> {
        if self.core.ram.contains(address, size) {
            let mut buf = [0u8; 4];
            self.core.ram.read(address, &mut buf[..size as usize]).ok()?;
            return Some(u32::from_le_bytes(buf));
        }
        if self.core.mmio.contains(address, size) {
            let window_offset = address - self.core.mmio.base();
            let word_offset = window_offset & !0b11;
            let shift = (window_offset & 0b11) * 8;
            let word = self.core.mmio.read_word(word_offset);
            return Some(word >> shift);
        }
        None
    }

    /// Writes the low `size` bytes of `value` at `address`, routing through RAM or MMIO.
    fn write_memory(&mut self, address: u32, size: u32, value: u32) -> Option<()> {
        if self.core.ram.contains(address, size) {
            let buf = value.to_le_bytes();
            self.core.ram.write(address, &buf[..size as usize]).ok()?;
            return Some(());
        }
        if self.core.mmio.contains(address, size) {
            let window_offset = address - self.core.mmio.base();
            let word_offset = window_offset & !0b11;
            let shift = (window_offset & 0b11) * 8;
            let byte_mask = match size {
                1 => 0xFFu32,
                2 => 0xFFFF,
                _ => 0xFFFF_FFFF,
            } << shift;
            let existing = self.core.mmio.read_word(word_offset);
            let merged = (existing & !byte_mask) | ((value << shift) & byte_mask);
            self.core.mmio_write(word_offset, merged);
            return Some(());
        }
        None
    }

    fn csr_op(
        &mut self,
        op: CsrOp,
        dest: Specifier,
        csr: super::csr::CsrSpecifier,
        operand: u32,
        should_write: bool,
    ) -> ExecutionResult {
        let old = self
            .core
            .csr_read(csr)
            .ok_or(Exception::IllegalInstruction(0))?;
        if should_write {
            let (value, mask) = match op {
                CsrOp::ReadWrite => (operand, u32::MAX),
                CsrOp::ReadSet => (u32::MAX, operand),
                CsrOp::ReadClear => (0, operand),
            };
            if !self.core.csr_write(csr, value, mask) {
                return Err(Exception::IllegalInstruction(0));
            }
        }
        self.core.write_register(dest, old);
        Ok((TraceEffect::RegisterWrite { dest, value: old }, false))
    }

    /// Whether the instruction currently being executed was fetched as a compressed halfword.
    /// `pc` has not yet been advanced by the caller at this point, so link-register values for
    /// `jal`/`jalr` and branch fallthrough both need this to compute the correct `pc + 2` or
    /// `pc + 4`.
    fn core_last_fetch_was_compressed(&self) -> bool {
        self.core.current_instruction_is_compressed
    }
}

fn load_width_size(width: LoadWidth) -> u32 {
    match width {
        LoadWidth::Lb | LoadWidth::Lbu => 1,
        LoadWidth::Lh | LoadWidth::Lhu => 2,
        LoadWidth::Lw => 4,
    }
}

fn store_width_size(width: StoreWidth) -> u32 {
    match width {
        StoreWidth::Sb => 1,
        StoreWidth::Sh => 2,
        StoreWidth::Sw => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Config, Core, Extensions};
    use crate::registers::Specifier;

    fn make_core() -> Core {
        Core::new(Config {
            mem_base: 0,
            mem_size: 0x1000,
            extensions: Extensions {
                m: true,
                b: true,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_div_by_zero_returns_minus_one() {
        let mut core = make_core();
        core.write_register(Specifier::from_u5(1), 5);
        core.write_register(Specifier::from_u5(2), 0);
        // div x5, x1, x2
        core.load_segment(0, &(0b0000001_00010_00001_100_00101_0110011u32).to_le_bytes());
        core.step();
        assert_eq!(u32::MAX, core.read_register(Specifier::from_u5(5)));
    }

    #[test]
    fn test_div_int_min_by_neg_one() {
        let mut core = make_core();
        core.write_register(Specifier::from_u5(1), i32::MIN as u32);
        core.write_register(Specifier::from_u5(2), u32::MAX); // -1
        core.load_segment(0, &(0b0000001_00010_00001_100_00101_0110011u32).to_le_bytes());
        core.step();
        assert_eq!(i32::MIN as u32, core.read_register(Specifier::from_u5(5)));
    }

    #[test]
    fn test_rem_by_zero_returns_dividend() {
        let mut core = make_core();
        core.write_register(Specifier::from_u5(1), 7);
        core.write_register(Specifier::from_u5(2), 0);
        // rem x5, x1, x2
        core.load_segment(0, &(0b0000001_00010_00001_110_00101_0110011u32).to_le_bytes());
        core.step();
        assert_eq!(7, core.read_register(Specifier::from_u5(5)));
    }

    #[test]
    fn test_max_min() {
        let mut core = make_core();
        core.write_register(Specifier::from_u5(1), (-5i32) as u32);
        core.write_register(Specifier::from_u5(2), 3);
        // max x5, x1, x2: funct7=0000101, funct3=110
        core.load_segment(0, &(0b0000101_00010_00001_110_00101_0110011u32).to_le_bytes());
        core.step();
        assert_eq!(3, core.read_register(Specifier::from_u5(5)));
    }
}
