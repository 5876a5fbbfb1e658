//! Expansion of 16-bit compressed (C-extension) instruction halfwords into the equivalent
//! standard 32-bit instruction word.
//!
//! > Compressed expansion (only when C enabled): a 16-bit halfword whose low two bits are ≠ `11`
//! > is expanded into its equivalent 32-bit instruction per the C-extension table [...]. The
//! > expansion produces the same tagged variant the full decoder would have produced, so
//! > downstream execution is identical.
//!
//! This module only builds the equivalent raw 32-bit word; [`crate::instruction::Instruction::decode`]
//! is responsible for turning that word into a tagged [`crate::instruction::Instruction`].

use thiserror::Error;

const OP_IMM: u32 = 0b0010011;
const LUI: u32 = 0b0110111;
const OP: u32 = 0b0110011;
const JAL: u32 = 0b1101111;
const JALR: u32 = 0b1100111;
const BRANCH: u32 = 0b1100011;
const LOAD: u32 = 0b0000011;
const STORE: u32 = 0b0100011;
const SYSTEM: u32 = 0b1110011;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DecompressError {
    #[error("reserved or undefined compressed instruction encoding")]
    Illegal,
}

/// Returns `true` if `halfword` is a compressed instruction, i.e. its low two bits are not `11`.
pub fn is_compressed(halfword: u16) -> bool {
    halfword & 0b11 != 0b11
}

/// Expands a 16-bit compressed instruction halfword into the equivalent 32-bit instruction word.
///
/// Returns [`DecompressError::Illegal`] for reserved encodings: the all-zero halfword, and
/// otherwise-matching encodings whose immediate/register fields are specifically disallowed
/// (e.g. `c.addi4spn` with a zero immediate).
pub fn expand(halfword: u16) -> Result<u32, DecompressError> {
    if halfword == 0 {
        return Err(DecompressError::Illegal);
    }
    let quadrant = halfword & 0b11;
    let funct3 = (halfword >> 13) & 0b111;
    match quadrant {
        0b00 => expand_quadrant0(halfword, funct3),
        0b01 => expand_quadrant1(halfword, funct3),
        0b10 => expand_quadrant2(halfword, funct3),
        _ => Err(DecompressError::Illegal),
    }
}

/// Maps a 3-bit compressed register field to the full `x8..x15` register index.
fn creg(bits3: u16) -> u32 {
    8 + u32::from(bits3 & 0b111)
}

fn rd_rs1(halfword: u16) -> u32 {
    u32::from((halfword >> 7) & 0x1F)
}

fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (funct7 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

fn i_type(imm12: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    ((imm12 as u32) << 20) | (rs1 << 15) | (funct3 << 12) | (rd << 7) | opcode
}

fn s_type(imm12: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm12 as u32;
    let imm_11_5 = (imm >> 5) & 0x7F;
    let imm_4_0 = imm & 0x1F;
    (imm_11_5 << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (imm_4_0 << 7) | opcode
}

fn b_type(imm13: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = imm13 as u32;
    let imm_12 = (imm >> 12) & 0b1;
    let imm_10_5 = (imm >> 5) & 0x3F;
    let imm_4_1 = (imm >> 1) & 0xF;
    let imm_11 = (imm >> 11) & 0b1;
    (imm_12 << 31)
        | (imm_10_5 << 25)
        | (rs2 << 20)
        | (rs1 << 15)
        | (funct3 << 12)
        | (imm_4_1 << 8)
        | (imm_11 << 7)
        | opcode
}

fn u_type(imm32_hi20: u32, rd: u32, opcode: u32) -> u32 {
    (imm32_hi20 & 0xFFFF_F000) | (rd << 7) | opcode
}

fn j_type(imm21: i32, rd: u32, opcode: u32) -> u32 {
    let imm = imm21 as u32;
    let imm_20 = (imm >> 20) & 0b1;
    let imm_10_1 = (imm >> 1) & 0x3FF;
    let imm_11 = (imm >> 11) & 0b1;
    let imm_19_12 = (imm >> 12) & 0xFF;
    (imm_20 << 31) | (imm_10_1 << 21) | (imm_11 << 20) | (imm_19_12 << 12) | (rd << 7) | opcode
}

fn expand_quadrant0(halfword: u16, funct3: u16) -> Result<u32, DecompressError> {
    let rd_p = creg(halfword >> 2);
    let rs1_p = creg(halfword >> 7);
    let rs2_p = creg(halfword >> 2);
    match funct3 {
        0b000 => {
            // c.addi4spn
            let nzuimm = (((halfword >> 11) & 0b11) << 4)
                | (((halfword >> 7) & 0b1111) << 6)
                | (((halfword >> 6) & 0b1) << 2)
                | (((halfword >> 5) & 0b1) << 3);
            if nzuimm == 0 {
                return Err(DecompressError::Illegal);
            }
            Ok(i_type(nzuimm as i32, 2, 0b000, rd_p, OP_IMM))
        }
        0b010 => {
            // c.lw
            let uimm = (((halfword >> 10) & 0b111) << 3)
                | (((halfword >> 6) & 0b1) << 2)
                | (((halfword >> 5) & 0b1) << 6);
            Ok(i_type(uimm as i32, rs1_p, 0b010, rd_p, LOAD))
        }
        0b110 => {
            // c.sw
            let uimm = (((halfword >> 10) & 0b111) << 3)
                | (((halfword >> 6) & 0b1) << 2)
                | (((halfword >> 5) & 0b1) << 6);
            Ok(s_type(uimm as i32, rs2_p, rs1_p, 0b010, STORE))
        }
        _ => Err(DecompressError::Illegal),
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn expand_quadrant1(halfword: u16, funct3: u16) -> Result<u32, DecompressError> {
    let rd_rs1_full = rd_rs1(halfword);
    match funct3 {
        0b000 => {
            // c.nop / c.addi
            let imm = (((halfword >> 12) & 0b1) << 5) | ((halfword >> 2) & 0x1F);
            let imm = sign_extend(u32::from(imm), 6);
            Ok(i_type(imm, rd_rs1_full, 0b000, rd_rs1_full, OP_IMM))
        }
        0b001 => {
            // c.jal (RV32-only, always to x1)
            let imm = jump_imm(halfword);
            Ok(j_type(imm, 1, JAL))
        }
        0b010 => {
            // c.li
            let imm = (((halfword >> 12) & 0b1) << 5) | ((halfword >> 2) & 0x1F);
            let imm = sign_extend(u32::from(imm), 6);
            Ok(i_type(imm, 0, 0b000, rd_rs1_full, OP_IMM))
        }
        0b011 => {
            if rd_rs1_full == 2 {
                // c.addi16sp
                let imm = (((halfword >> 12) & 0b1) << 9)
                    | (((halfword >> 3) & 0b11) << 7)
                    | (((halfword >> 5) & 0b1) << 6)
                    | (((halfword >> 2) & 0b1) << 5)
                    | (((halfword >> 6) & 0b1) << 4);
                let imm = sign_extend(u32::from(imm), 10);
                if imm == 0 {
                    return Err(DecompressError::Illegal);
                }
                Ok(i_type(imm, 2, 0b000, 2, OP_IMM))
            } else if rd_rs1_full == 0 {
                Err(DecompressError::Illegal)
            } else {
                // c.lui
                let imm = (((halfword >> 12) & 0b1) << 17) | (((halfword >> 2) & 0x1F) << 12);
                let imm = sign_extend(imm, 18);
                if imm == 0 {
                    return Err(DecompressError::Illegal);
                }
                Ok(u_type(imm as u32, rd_rs1_full, LUI))
            }
        }
        0b100 => {
            let rd_p = creg(halfword >> 7);
            let funct2 = (halfword >> 10) & 0b11;
            match funct2 {
                0b00 | 0b01 => {
                    // c.srli / c.srai
                    let shamt = (((halfword >> 12) & 0b1) << 5) | ((halfword >> 2) & 0x1F);
                    if shamt == 0 {
                        return Err(DecompressError::Illegal);
                    }
                    let funct7 = if funct2 == 0b00 { 0b0000000 } else { 0b0100000 };
                    Ok(r_type(funct7, shamt as u32 & 0x1F, rd_p, 0b101, rd_p, OP_IMM))
                }
                0b10 => {
                    // c.andi
                    let imm = (((halfword >> 12) & 0b1) << 5) | ((halfword >> 2) & 0x1F);
                    let imm = sign_extend(u32::from(imm), 6);
                    Ok(i_type(imm, rd_p, 0b111, rd_p, OP_IMM))
                }
                0b11 => {
                    let rs2_p = creg(halfword >> 2);
                    let subop = (halfword >> 5) & 0b11;
                    let (funct7, funct3) = match subop {
                        0b00 => (0b0100000, 0b000), // c.sub
                        0b01 => (0b0000000, 0b100), // c.xor
                        0b10 => (0b0000000, 0b110), // c.or
                        0b11 => (0b0000000, 0b111), // c.and
                        _ => unreachable!(),
                    };
                    Ok(r_type(funct7, rs2_p, rd_p, funct3, rd_p, OP))
                }
                _ => Err(DecompressError::Illegal),
            }
        }
        0b101 => {
            // c.j
            let imm = jump_imm(halfword);
            Ok(j_type(imm, 0, JAL))
        }
        0b110 | 0b111 => {
            // c.beqz / c.bnez
            let rs1_p = creg(halfword >> 7);
            let imm = (((halfword >> 12) & 0b1) << 8)
                | (((halfword >> 10) & 0b11) << 3)
                | (((halfword >> 5) & 0b11) << 6)
                | (((halfword >> 3) & 0b11) << 1)
                | (((halfword >> 2) & 0b1) << 5);
            let imm = sign_extend(u32::from(imm), 9);
            let branch_funct3 = if funct3 == 0b110 { 0b000 } else { 0b001 };
            Ok(b_type(imm, 0, rs1_p, branch_funct3, BRANCH))
        }
        _ => Err(DecompressError::Illegal),
    }
}

/// Shared 11-bit signed jump-target immediate layout used by `c.j` and `c.jal`.
fn jump_imm(halfword: u16) -> i32 {
    let imm = (((halfword >> 12) & 0b1) << 11)
        | (((halfword >> 11) & 0b1) << 4)
        | (((halfword >> 9) & 0b11) << 8)
        | (((halfword >> 8) & 0b1) << 10)
        | (((halfword >> 7) & 0b1) << 6)
        | (((halfword >> 6) & 0b1) << 7)
        | (((halfword >> 3) & 0b111) << 1)
        | (((halfword >> 2) & 0b1) << 5);
    sign_extend(u32::from(imm), 12)
}

fn expand_quadrant2(halfword: u16, funct3: u16) -> Result<u32, DecompressError> {
    let rd_rs1_full = rd_rs1(halfword);
    match funct3 {
        0b000 => {
            // c.slli
            let shamt = (((halfword >> 12) & 0b1) << 5) | ((halfword >> 2) & 0x1F);
            if rd_rs1_full == 0 || shamt == 0 {
                return Err(DecompressError::Illegal);
            }
            Ok(r_type(0b0000000, shamt as u32 & 0x1F, rd_rs1_full, 0b001, rd_rs1_full, OP_IMM))
        }
        0b010 => {
            // c.lwsp
            if rd_rs1_full == 0 {
                return Err(DecompressError::Illegal);
            }
            let imm = (((halfword >> 12) & 0b1) << 5)
                | (((halfword >> 4) & 0b111) << 2)
                | (((halfword >> 2) & 0b11) << 6);
            Ok(i_type(imm as i32, 2, 0b010, rd_rs1_full, LOAD))
        }
        0b100 => {
            let bit12 = (halfword >> 12) & 0b1;
            let rs2 = u32::from((halfword >> 2) & 0x1F);
            if bit12 == 0 {
                if rs2 == 0 {
                    // c.jr
                    if rd_rs1_full == 0 {
                        return Err(DecompressError::Illegal);
                    }
                    Ok(i_type(0, rd_rs1_full, 0b000, 0, JALR))
                } else {
                    // c.mv
                    Ok(r_type(0, rs2, 0, 0b000, rd_rs1_full, OP))
                }
            } else if rd_rs1_full == 0 && rs2 == 0 {
                // c.ebreak
                Ok(i_type(1, 0, 0b000, 0, SYSTEM))
            } else if rs2 == 0 {
                // c.jalr
                Ok(i_type(0, rd_rs1_full, 0b000, 1, JALR))
            } else {
                // c.add
                Ok(r_type(0, rs2, rd_rs1_full, 0b000, rd_rs1_full, OP))
            }
        }
        0b110 => {
            // c.swsp
            let rs2 = u32::from((halfword >> 2) & 0x1F);
            let imm = (((halfword >> 9) & 0xF) << 2) | (((halfword >> 7) & 0b11) << 6);
            Ok(s_type(imm as i32, rs2, 2, 0b010, STORE))
        }
        _ => Err(DecompressError::Illegal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Instruction, RegImmOp};
    use crate::registers::Specifier;

    #[test]
    fn test_c_nop() {
        // c.nop: funct3=000, imm=0, rd/rs1=0
        let word = expand(0b000_0_00000_00000_01).unwrap();
        assert_eq!(
            Instruction::decode(word).unwrap(),
            Instruction::OpImm {
                op: RegImmOp::Addi,
                dest: Specifier::X0,
                src: Specifier::X0,
                immediate: 0,
            }
        );
    }

    #[test]
    fn test_c_li() {
        // c.li x5, 3: funct3=010, imm[5]=0, rd=5, imm[4:0]=3
        let halfword = (0b010 << 13) | (0 << 12) | (5 << 7) | (3 << 2) | 0b01;
        let word = expand(halfword).unwrap();
        assert_eq!(
            Instruction::decode(word).unwrap(),
            Instruction::OpImm {
                op: RegImmOp::Addi,
                dest: Specifier::from_u5(5),
                src: Specifier::X0,
                immediate: 3,
            }
        );
    }

    #[test]
    fn test_illegal_all_zero() {
        assert_eq!(expand(0x0000), Err(DecompressError::Illegal));
    }

    #[test]
    fn test_c_addi4spn_zero_immediate_illegal() {
        // funct3=000, all the immediate bits zero -> reserved all-zero encoding already caught,
        // but a nonzero low quadrant bit pattern with zero nzuimm must also be rejected.
        let halfword = (0b000 << 13) | (1 << 2); // quadrant 0, funct3 000, rd'=x9, nzuimm=0
        assert_eq!(expand(halfword), Err(DecompressError::Illegal));
    }

    #[test]
    fn test_is_compressed() {
        assert!(is_compressed(0b01));
        assert!(!is_compressed(0b11));
    }
}
