//! Arithmetic/logic unit.
//!
//! All arithmetic is on unsigned bytes and wraps modulo 256. `CMP` is the
//! only operation that writes the flags register.

use crate::cpu::decode::Opcode;
use crate::cpu::registers::{Flags, RegisterError, Registers};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Operations the ALU can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Mod,
    Cmp,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
}

impl AluOp {
    /// Map an opcode to its ALU operation.
    pub fn from_opcode(op: Opcode) -> Result<Self, AluError> {
        let alu_op = match op {
            Opcode::Add => AluOp::Add,
            Opcode::Sub => AluOp::Sub,
            Opcode::Mul => AluOp::Mul,
            Opcode::Mod => AluOp::Mod,
            Opcode::Cmp => AluOp::Cmp,
            Opcode::And => AluOp::And,
            Opcode::Or => AluOp::Or,
            Opcode::Xor => AluOp::Xor,
            Opcode::Not => AluOp::Not,
            Opcode::Shl => AluOp::Shl,
            Opcode::Shr => AluOp::Shr,
            other => return Err(AluError::Unsupported(other.byte())),
        };
        Ok(alu_op)
    }
}

impl TryFrom<Opcode> for AluOp {
    type Error = AluError;

    fn try_from(op: Opcode) -> Result<Self, Self::Error> {
        AluOp::from_opcode(op)
    }
}

/// Apply `op` to `R[dest]` and `R[src]`.
///
/// The result lands in `R[dest]`, except for `CMP` which only updates the
/// flags. `NOT` reads `R[dest]` alone and never looks at `src`.
pub fn apply(op: AluOp, dest: u8, src: u8, regs: &mut Registers) -> Result<(), AluError> {
    let a = regs.get(dest)?;
    // NOT has a single operand; the byte in `src` belongs to the next instruction.
    let b = if op == AluOp::Not { 0 } else { regs.get(src)? };

    let result = match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Mod => a.checked_rem(b).ok_or(AluError::DivisionByZero { dest, src })?,
        AluOp::Cmp => {
            regs.set_flags(Flags::from_ordering(a.cmp(&b)));
            return Ok(());
        }
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        AluOp::Not => !a,
        // Shifting out every bit leaves zero.
        AluOp::Shl => a.checked_shl(b as u32).unwrap_or(0),
        AluOp::Shr => a.checked_shr(b as u32).unwrap_or(0),
    };

    regs.set(dest, result)?;
    Ok(())
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("unsupported ALU operation {0:#010b}")]
    Unsupported(u8),

    #[error("division by zero (MOD R{dest},R{src})")]
    DivisionByZero { dest: u8, src: u8 },

    #[error(transparent)]
    Register(#[from] RegisterError),
}
