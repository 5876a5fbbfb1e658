//! Decoding of raw 32-bit instruction words into a tagged [`Instruction`] variant.
//!
//! Compressed (C-extension) halfwords are not decoded here; see [`crate::decompress`], which
//! expands a compressed halfword into the 32-bit word this module expects.

use crate::core::csr::CsrSpecifier;
use crate::registers::Specifier;
use log::trace;
use thiserror::Error;

/// Data structure that can hold any supported instruction in its decoded form.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Instruction {
    OpImm {
        op: RegImmOp,
        dest: Specifier,
        src: Specifier,
        immediate: i32,
    },
    OpShiftImm {
        op: RegShiftImmOp,
        dest: Specifier,
        src: Specifier,
        shift_amount_u5: u32,
    },
    /// Zbb unary bit-manipulation operations (`clz`, `ctz`, `cpop`, `sext.b`, `sext.h`, `orc.b`,
    /// `rev8`), all encoded in the OP-IMM opcode space.
    OpUnary {
        op: RegUnaryOp,
        dest: Specifier,
        src: Specifier,
    },
    Auipc {
        dest: Specifier,
        immediate: i32,
    },
    Lui {
        dest: Specifier,
        immediate: i32,
    },
    Op {
        op: RegRegOp,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    },
    Jal {
        dest: Specifier,
        offset: i32,
    },
    Jalr {
        dest: Specifier,
        base: Specifier,
        offset: i32,
    },
    Branch {
        condition: BranchCondition,
        src1: Specifier,
        src2: Specifier,
        offset: i32,
    },
    Load {
        width: LoadWidth,
        dest: Specifier,
        base: Specifier,
        offset: i32,
    },
    Store {
        width: StoreWidth,
        src: Specifier,
        base: Specifier,
        offset: i32,
    },
    Fence {
        predecessor: FenceOrderCombination,
        successor: FenceOrderCombination,
    },
    Ecall,
    Ebreak,
    Mret,
    Csr {
        op: CsrOp,
        dest: Specifier,
        csr: CsrSpecifier,
        src: Specifier,
    },
    Csri {
        op: CsrOp,
        dest: Specifier,
        csr: CsrSpecifier,
        immediate: u32,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegImmOp {
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegShiftImmOp {
    Slli,
    Srli,
    Srai,
    /// Zbb `rori`: rotate right by immediate.
    Rori,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegUnaryOp {
    /// Zbb `clz`: count leading zeros.
    Clz,
    /// Zbb `ctz`: count trailing zeros.
    Ctz,
    /// Zbb `cpop`: count set bits.
    Cpop,
    /// Zbb `sext.b`: sign-extend the low byte.
    SextB,
    /// Zbb `sext.h`: sign-extend the low halfword.
    SextH,
    /// Zbb `orc.b`: OR-combine each byte's bits into that byte.
    OrcB,
    /// Zbb `rev8`: reverse byte order.
    Rev8,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegRegOp {
    Add,
    Slt,
    Sltu,
    And,
    Or,
    Xor,
    Sll,
    Srl,
    Sub,
    Sra,
    // M extension
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    // Zbb (B extension subset)
    Andn,
    Orn,
    Xnor,
    Max,
    Maxu,
    Min,
    Minu,
    Rol,
    Ror,
}

impl RegRegOp {
    /// Returns `true` if this operation belongs to the M (multiply/divide) extension.
    pub fn is_m_extension(self) -> bool {
        matches!(
            self,
            Self::Mul | Self::Mulh | Self::Mulhsu | Self::Mulhu | Self::Div | Self::Divu | Self::Rem | Self::Remu
        )
    }

    /// Returns `true` if this operation belongs to the B (bit-manipulation) extension subset.
    pub fn is_b_extension(self) -> bool {
        matches!(
            self,
            Self::Andn | Self::Orn | Self::Xnor | Self::Max | Self::Maxu | Self::Min | Self::Minu | Self::Rol | Self::Ror
        )
    }
}

impl RegShiftImmOp {
    pub fn is_b_extension(self) -> bool {
        matches!(self, Self::Rori)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BranchCondition {
    Beq,
    Bne,
    Blt,
    Bltu,
    Bge,
    Bgeu,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadWidth {
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreWidth {
    Sb,
    Sh,
    Sw,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FenceOrderCombination {
    pub device_input: bool,
    pub device_output: bool,
    pub memory_reads: bool,
    pub memory_writes: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsrOp {
    /// Atomic Read/Write CSR.
    ReadWrite,
    /// Atomic Read and Set Bits in CSR.
    ReadSet,
    /// Atomic Read and Clear Bits in CSR.
    ReadClear,
}

impl Instruction {
    /// Decodes a full 32-bit instruction word.
    ///
    /// This recognizes the encodings of extensions regardless of whether they are actually
    /// enabled; it is up to the caller (see [`crate::core::Core::execute_instruction`]) to reject
    /// an operation belonging to a disabled extension with an illegal-instruction exception.
    pub fn decode(raw_instruction: u32) -> Result<Self, DecodeError> {
        trace!("Decoding instruction {raw_instruction:#010x}");
        match opcode(raw_instruction).ok_or(DecodeError::UnsupportedOpcode)? {
            Opcode::OpImm => match funct3(raw_instruction) {
                0b001 | 0b101 => decode_op_imm_shift_or_unary(raw_instruction),
                _ => match i_funct(raw_instruction) {
                    Some(op) => Ok(Self::OpImm {
                        op,
                        dest: rd(raw_instruction),
                        src: rs1(raw_instruction),
                        immediate: i_imm(raw_instruction),
                    }),
                    None => Err(DecodeError::IllegalInstruction),
                },
            },
            Opcode::Auipc => Ok(Self::Auipc {
                dest: rd(raw_instruction),
                immediate: u_imm(raw_instruction),
            }),
            Opcode::Lui => Ok(Self::Lui {
                dest: rd(raw_instruction),
                immediate: u_imm(raw_instruction),
            }),
            Opcode::Op => match r_funct(raw_instruction) {
                Some(op) => Ok(Self::Op {
                    op,
                    dest: rd(raw_instruction),
                    src1: rs1(raw_instruction),
                    src2: rs2(raw_instruction),
                }),
                None => Err(DecodeError::IllegalInstruction),
            },
            Opcode::Jal => Ok(Self::Jal {
                dest: rd(raw_instruction),
                offset: j_imm(raw_instruction),
            }),
            Opcode::Jalr => {
                if funct3(raw_instruction) != 0b000 {
                    return Err(DecodeError::IllegalInstruction);
                }
                Ok(Self::Jalr {
                    dest: rd(raw_instruction),
                    base: rs1(raw_instruction),
                    offset: i_imm(raw_instruction),
                })
            }
            Opcode::Branch => match b_funct(raw_instruction) {
                Some(condition) => Ok(Self::Branch {
                    condition,
                    src1: rs1(raw_instruction),
                    src2: rs2(raw_instruction),
                    offset: b_imm(raw_instruction),
                }),
                None => Err(DecodeError::IllegalInstruction),
            },
            Opcode::Load => match i_width(raw_instruction) {
                Some(width) => Ok(Self::Load {
                    width,
                    dest: rd(raw_instruction),
                    base: rs1(raw_instruction),
                    offset: i_imm(raw_instruction),
                }),
                None => Err(DecodeError::IllegalInstruction),
            },
            Opcode::Store => match s_width(raw_instruction) {
                Some(width) => Ok(Self::Store {
                    width,
                    src: rs2(raw_instruction),
                    base: rs1(raw_instruction),
                    offset: s_imm(raw_instruction),
                }),
                None => Err(DecodeError::IllegalInstruction),
            },
            Opcode::MiscMem => match i_mem(raw_instruction) {
                Some(MemFunct::Fence) => {
                    let predecessor = FenceOrderCombination {
                        device_input: (raw_instruction >> 27) & 0b1 == 1,
                        device_output: (raw_instruction >> 26) & 0b1 == 1,
                        memory_reads: (raw_instruction >> 25) & 0b1 == 1,
                        memory_writes: (raw_instruction >> 24) & 0b1 == 1,
                    };
                    let successor = FenceOrderCombination {
                        device_input: (raw_instruction >> 23) & 0b1 == 1,
                        device_output: (raw_instruction >> 22) & 0b1 == 1,
                        memory_reads: (raw_instruction >> 21) & 0b1 == 1,
                        memory_writes: (raw_instruction >> 20) & 0b1 == 1,
                    };
                    // All unused fields (fm, rd, rs1) are reserved for future use and are treated
                    // as an ordinary fence for forward compatibility.
                    Ok(Self::Fence {
                        predecessor,
                        successor,
                    })
                }
                None => Err(DecodeError::IllegalInstruction),
            },
            Opcode::System => match i_sys(raw_instruction) {
                Some(sys) => match sys {
                    SysFunct::Priv => match sys_priv(raw_instruction) {
                        Some(sys_priv) => Ok(match sys_priv {
                            SysPriv::Ecall => Self::Ecall,
                            SysPriv::Ebreak => Self::Ebreak,
                            SysPriv::Mret => Self::Mret,
                        }),
                        None => Err(DecodeError::IllegalInstruction),
                    },
                    SysFunct::Csrrw | SysFunct::Csrrs | SysFunct::Csrrc => Ok(Instruction::Csr {
                        op: match sys {
                            SysFunct::Csrrw => CsrOp::ReadWrite,
                            SysFunct::Csrrs => CsrOp::ReadSet,
                            SysFunct::Csrrc => CsrOp::ReadClear,
                            _ => unreachable!(),
                        },
                        dest: rd(raw_instruction),
                        csr: csr(raw_instruction),
                        src: rs1(raw_instruction),
                    }),
                    SysFunct::Csrrwi | SysFunct::Csrrsi | SysFunct::Csrrci => {
                        Ok(Instruction::Csri {
                            op: match sys {
                                SysFunct::Csrrwi => CsrOp::ReadWrite,
                                SysFunct::Csrrsi => CsrOp::ReadSet,
                                SysFunct::Csrrci => CsrOp::ReadClear,
                                _ => unreachable!(),
                            },
                            dest: rd(raw_instruction),
                            csr: csr(raw_instruction),
                            immediate: u32::from(rs1(raw_instruction)),
                        })
                    }
                },
                None => Err(DecodeError::IllegalInstruction),
            },
        }
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DecodeError {
    #[error("instruction has unsupported opcode")]
    UnsupportedOpcode,
    #[error("illegal instruction")]
    IllegalInstruction,
}

/// Returns the 7-bit *opcode* value of the instruction, or `None` if it isn't supported.
fn opcode(raw_instruction: u32) -> Option<Opcode> {
    #[allow(clippy::unusual_byte_groupings)]
    match raw_instruction & 0x7F {
        0b00_000_11 => Some(Opcode::Load),
        0b00_011_11 => Some(Opcode::MiscMem),
        0b00_100_11 => Some(Opcode::OpImm),
        0b00_101_11 => Some(Opcode::Auipc),
        0b01_000_11 => Some(Opcode::Store),
        0b01_100_11 => Some(Opcode::Op),
        0b01_101_11 => Some(Opcode::Lui),
        0b11_000_11 => Some(Opcode::Branch),
        0b11_001_11 => Some(Opcode::Jalr),
        0b11_011_11 => Some(Opcode::Jal),
        0b11_100_11 => Some(Opcode::System),
        _ => None,
    }
}

/// Returns the 5-bit *rd* value for R-type, I-type, U-type, J-type instructions.
fn rd(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 7) & 0x1F) as u8)
}

/// Returns the 5-bit *rs1* value for R-type, I-type, S-type, B-type instructions.
fn rs1(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 15) & 0x1F) as u8)
}

/// Returns the 5-bit *rs2* value for R-type, S-type, B-type instructions.
fn rs2(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 20) & 0x1F) as u8)
}

fn csr(raw_instruction: u32) -> CsrSpecifier {
    (raw_instruction >> 20) as u16
}

fn i_funct(raw_instruction: u32) -> Option<RegImmOp> {
    match funct3(raw_instruction) {
        0b000 => Some(RegImmOp::Addi),
        0b010 => Some(RegImmOp::Slti),
        0b011 => Some(RegImmOp::Sltiu),
        0b100 => Some(RegImmOp::Xori),
        0b110 => Some(RegImmOp::Ori),
        0b111 => Some(RegImmOp::Andi),
        _ => None,
    }
}

/// Decodes the OP-IMM encodings that share funct3 ∈ {001, 101}: the base shift-immediates, the
/// Zbb `rori` rotate-immediate, and the Zbb unary operations (which repurpose the shift-amount
/// field to select a sub-operation).
fn decode_op_imm_shift_or_unary(raw_instruction: u32) -> Result<Instruction, DecodeError> {
    let dest = rd(raw_instruction);
    let src = rs1(raw_instruction);
    match (funct7(raw_instruction), funct3(raw_instruction)) {
        (0b0000000, 0b001) => Ok(Instruction::OpShiftImm {
            op: RegShiftImmOp::Slli,
            dest,
            src,
            shift_amount_u5: shamt(raw_instruction),
        }),
        (0b0000000, 0b101) => Ok(Instruction::OpShiftImm {
            op: RegShiftImmOp::Srli,
            dest,
            src,
            shift_amount_u5: shamt(raw_instruction),
        }),
        (0b0100000, 0b101) => Ok(Instruction::OpShiftImm {
            op: RegShiftImmOp::Srai,
            dest,
            src,
            shift_amount_u5: shamt(raw_instruction),
        }),
        (0b0110000, 0b101) => Ok(Instruction::OpShiftImm {
            op: RegShiftImmOp::Rori,
            dest,
            src,
            shift_amount_u5: shamt(raw_instruction),
        }),
        (0b0110000, 0b001) => match shamt(raw_instruction) {
            0b00000 => Ok(Instruction::OpUnary {
                op: RegUnaryOp::Clz,
                dest,
                src,
            }),
            0b00001 => Ok(Instruction::OpUnary {
                op: RegUnaryOp::Ctz,
                dest,
                src,
            }),
            0b00010 => Ok(Instruction::OpUnary {
                op: RegUnaryOp::Cpop,
                dest,
                src,
            }),
            0b00100 => Ok(Instruction::OpUnary {
                op: RegUnaryOp::SextB,
                dest,
                src,
            }),
            0b00101 => Ok(Instruction::OpUnary {
                op: RegUnaryOp::SextH,
                dest,
                src,
            }),
            _ => Err(DecodeError::IllegalInstruction),
        },
        (0b0010100, 0b101) if shamt(raw_instruction) == 0b00111 => Ok(Instruction::OpUnary {
            op: RegUnaryOp::OrcB,
            dest,
            src,
        }),
        (0b0110100, 0b101) if shamt(raw_instruction) == 0b11000 => Ok(Instruction::OpUnary {
            op: RegUnaryOp::Rev8,
            dest,
            src,
        }),
        _ => Err(DecodeError::IllegalInstruction),
    }
}

fn i_sys(raw_instruction: u32) -> Option<SysFunct> {
    match funct3(raw_instruction) {
        0b000 => Some(SysFunct::Priv),
        0b001 => Some(SysFunct::Csrrw),
        0b010 => Some(SysFunct::Csrrs),
        0b011 => Some(SysFunct::Csrrc),
        0b101 => Some(SysFunct::Csrrwi),
        0b110 => Some(SysFunct::Csrrsi),
        0b111 => Some(SysFunct::Csrrci),
        _ => None,
    }
}

fn sys_priv(raw_instruction: u32) -> Option<SysPriv> {
    if u8::from(rd(raw_instruction)) != 0 || u8::from(rs1(raw_instruction)) != 0 {
        return None;
    }
    let funct = funct12(raw_instruction);
    match funct {
        0 => Some(SysPriv::Ecall),
        1 => Some(SysPriv::Ebreak),
        0b0011000_00010 => Some(SysPriv::Mret),
        _ => None,
    }
}

fn i_mem(raw_instruction: u32) -> Option<MemFunct> {
    match funct3(raw_instruction) {
        0b000 => Some(MemFunct::Fence),
        _ => None,
    }
}

fn i_width(raw_instruction: u32) -> Option<LoadWidth> {
    match funct3(raw_instruction) {
        0b000 => Some(LoadWidth::Lb),
        0b001 => Some(LoadWidth::Lh),
        0b010 => Some(LoadWidth::Lw),
        0b100 => Some(LoadWidth::Lbu),
        0b101 => Some(LoadWidth::Lhu),
        _ => None,
    }
}

fn s_width(raw_instruction: u32) -> Option<StoreWidth> {
    match funct3(raw_instruction) {
        0b000 => Some(StoreWidth::Sb),
        0b001 => Some(StoreWidth::Sh),
        0b010 => Some(StoreWidth::Sw),
        _ => None,
    }
}

fn r_funct(raw_instruction: u32) -> Option<RegRegOp> {
    match (funct7(raw_instruction), funct3(raw_instruction)) {
        (0b0000000, 0b000) => Some(RegRegOp::Add),
        (0b0000000, 0b001) => Some(RegRegOp::Sll),
        (0b0000000, 0b010) => Some(RegRegOp::Slt),
        (0b0000000, 0b011) => Some(RegRegOp::Sltu),
        (0b0000000, 0b100) => Some(RegRegOp::Xor),
        (0b0000000, 0b101) => Some(RegRegOp::Srl),
        (0b0000000, 0b110) => Some(RegRegOp::Or),
        (0b0000000, 0b111) => Some(RegRegOp::And),
        (0b0100000, 0b000) => Some(RegRegOp::Sub),
        (0b0100000, 0b101) => Some(RegRegOp::Sra),
        // funct7 == MULDIV (M extension)
        (0b0000001, 0b000) => Some(RegRegOp::Mul),
        (0b0000001, 0b001) => Some(RegRegOp::Mulh),
        (0b0000001, 0b010) => Some(RegRegOp::Mulhsu),
        (0b0000001, 0b011) => Some(RegRegOp::Mulhu),
        (0b0000001, 0b100) => Some(RegRegOp::Div),
        (0b0000001, 0b101) => Some(RegRegOp::Divu),
        (0b0000001, 0b110) => Some(RegRegOp::Rem),
        (0b0000001, 0b111) => Some(RegRegOp::Remu),
        // Zbb (B extension subset)
        (0b0100000, 0b111) => Some(RegRegOp::Andn),
        (0b0100000, 0b110) => Some(RegRegOp::Orn),
        (0b0100000, 0b100) => Some(RegRegOp::Xnor),
        (0b0000101, 0b110) => Some(RegRegOp::Max),
        (0b0000101, 0b111) => Some(RegRegOp::Maxu),
        (0b0000101, 0b100) => Some(RegRegOp::Min),
        (0b0000101, 0b101) => Some(RegRegOp::Minu),
        (0b0110000, 0b001) => Some(RegRegOp::Rol),
        (0b0110000, 0b101) => Some(RegRegOp::Ror),
        _ => None,
    }
}

fn b_funct(raw_instruction: u32) -> Option<BranchCondition> {
    match funct3(raw_instruction) {
        0b000 => Some(BranchCondition::Beq),
        0b001 => Some(BranchCondition::Bne),
        0b100 => Some(BranchCondition::Blt),
        0b101 => Some(BranchCondition::Bge),
        0b110 => Some(BranchCondition::Bltu),
        0b111 => Some(BranchCondition::Bgeu),
        _ => None,
    }
}

/// Returns the 3-bit *funct3* value for R-type, I-type, S-type, B-type instructions.
fn funct3(raw_instruction: u32) -> u8 {
    ((raw_instruction >> 12) & 0b111) as u8
}

/// Returns the 7-bit *funct7* value for R-type instructions.
fn funct7(raw_instruction: u32) -> u8 {
    (raw_instruction >> 25) as u8
}

/// Returns the 5-bit *shamt* value for shift/rotate-immediate instructions.
fn shamt(raw_instruction: u32) -> u32 {
    (raw_instruction >> 20) & 0x1F
}

/// Returns the 12-bit I-immediate sign-extended to 32 bits.
fn i_imm(raw_instruction: u32) -> i32 {
    raw_instruction as i32 >> 20
}

/// Returns the 12-bit I-immediate zero-extended to 32 bits.
fn funct12(raw_instruction: u32) -> u32 {
    raw_instruction >> 20
}

/// Returns the 12-bit S-immediate sign-extended to 32 bits.
fn s_imm(raw_instruction: u32) -> i32 {
    let imm_11_5 = raw_instruction & 0xFE00_0000;
    let imm_4_0 = raw_instruction & 0x0000_0F80;
    (imm_11_5 | (imm_4_0 << 13)) as i32 >> 20
}

/// Returns the 13-bit B-immediate sign-extended to 32 bits.
fn b_imm(raw_instruction: u32) -> i32 {
    let imm_12 = raw_instruction & 0x8000_0000;
    let imm_10_5 = raw_instruction & 0x7E00_0000;
    let imm_4_1 = raw_instruction & 0x0000_0F00;
    let imm_11 = raw_instruction & 0x0000_0080;
    (imm_12 | (imm_11 << 23) | (imm_10_5 >> 1) | (imm_4_1 << 12)) as i32 >> 19
}

/// Returns the signed 32-bit U-immediate.
fn u_imm(raw_instruction: u32) -> i32 {
    (raw_instruction & 0xFFFF_F000) as i32
}

/// Returns the 21-bit J-immediate sign-extended to 32 bits.
fn j_imm(raw_instruction: u32) -> i32 {
    let imm_20 = raw_instruction & 0x8000_0000;
    let imm_10_1 = raw_instruction & 0x7FE0_0000;
    let imm_11 = raw_instruction & 0x0010_0000;
    let imm_19_12 = raw_instruction & 0x000F_F000;
    (imm_20 | (imm_19_12 << 11) | (imm_11 << 2) | (imm_10_1 >> 9)) as i32 >> 11
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Opcode {
    OpImm,
    Auipc,
    Lui,
    Op,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    MiscMem,
    System,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum SysFunct {
    Priv,
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum SysPriv {
    Ecall,
    Ebreak,
    Mret,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum MemFunct {
    Fence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i_imm() {
        assert_eq!(0, i_imm(0x0000_0000));
        assert_eq!(-1, i_imm(0xFFF0_0000));
        assert_eq!(2047, i_imm(2047 << 20));
        assert_eq!(-2048, i_imm(0x8000_0000));
        assert_eq!(-42, i_imm((-42_i32 << 20) as u32));
        // Check other bits are ignored
        assert_eq!(0, i_imm(0x000F_FFFF));
        assert_eq!(-1, i_imm(0xFFF1_2345));
        assert_eq!(1209, i_imm((1209 << 20) | 0x000C_D10A));
    }

    #[test]
    fn test_decode_add() {
        // add x1, x2, x3
        let raw = 0b0000000_00011_00010_000_00001_0110011;
        assert_eq!(
            Instruction::decode(raw).unwrap(),
            Instruction::Op {
                op: RegRegOp::Add,
                dest: Specifier::new(1u8).unwrap(),
                src1: Specifier::new(2u8).unwrap(),
                src2: Specifier::new(3u8).unwrap(),
            }
        );
    }

    #[test]
    fn test_decode_div() {
        // div x3, x1, x2
        let raw = 0b0000001_00010_00001_100_00011_0110011;
        assert_eq!(
            Instruction::decode(raw).unwrap(),
            Instruction::Op {
                op: RegRegOp::Div,
                dest: Specifier::new(3u8).unwrap(),
                src1: Specifier::new(1u8).unwrap(),
                src2: Specifier::new(2u8).unwrap(),
            }
        );
    }

    #[test]
    fn test_decode_rori() {
        // rori x5, x6, 3
        let raw = (0b0110000 << 25) | (3 << 20) | (6 << 15) | (0b101 << 12) | (5 << 7) | 0b0010011;
        assert_eq!(
            Instruction::decode(raw).unwrap(),
            Instruction::OpShiftImm {
                op: RegShiftImmOp::Rori,
                dest: Specifier::new(5u8).unwrap(),
                src: Specifier::new(6u8).unwrap(),
                shift_amount_u5: 3,
            }
        );
    }

    #[test]
    fn test_decode_ecall_ebreak() {
        assert_eq!(Instruction::decode(0x00000073).unwrap(), Instruction::Ecall);
        assert_eq!(Instruction::decode(0x00100073).unwrap(), Instruction::Ebreak);
    }

    #[test]
    fn test_decode_illegal() {
        // funct3 reserved for OP-IMM shift family, random funct7/rs2 not matching any Zbb op.
        let raw = (0b0111111 << 25) | (0b001 << 12) | 0b0010011;
        assert_eq!(Instruction::decode(raw), Err(DecodeError::IllegalInstruction));
    }
}
