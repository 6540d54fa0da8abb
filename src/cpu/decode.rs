//! Instruction decoder for the LS-8.
//!
//! Every opcode byte is laid out as `AABCDDDD`:
//! - `AA`: number of operand bytes that follow (0-2)
//! - `B`: 1 if the instruction is executed by the ALU
//! - `C`: 1 if the instruction sets the PC itself
//! - `DDDD`: instruction identifier
//!
//! The CPU always fetches three bytes; the width of the instruction is
//! derived from `AA`.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// An LS-8 opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // ==================== ALU ====================

    /// R[a] := R[a] + R[b]
    Add = 0b1010_0000,
    /// R[a] := R[a] - R[b]
    Sub = 0b1010_0001,
    /// R[a] := R[a] * R[b]
    Mul = 0b1010_0010,
    /// R[a] := R[a] % R[b]
    Mod = 0b1010_0100,
    /// FL := compare(R[a], R[b])
    Cmp = 0b1010_0111,
    And = 0b1010_1000,
    Or = 0b1010_1010,
    Xor = 0b1010_1011,
    /// R[a] := !R[a]
    Not = 0b0110_1001,
    Shl = 0b1010_1100,
    Shr = 0b1010_1101,

    // ==================== Data ====================

    /// R[a] := b
    Ldi = 0b1000_0010,
    /// Print R[a] in decimal
    Prn = 0b0100_0111,
    Push = 0b0100_0101,
    Pop = 0b0100_0110,

    // ==================== Control Flow ====================

    /// Push the return address and jump to R[a]
    Call = 0b0101_0000,
    /// Pop the return address into PC
    Ret = 0b0001_0001,
    Jmp = 0b0101_0100,
    /// Jump to R[a] if the E flag is set
    Jeq = 0b0101_0101,
    /// Jump to R[a] if the E flag is clear
    Jne = 0b0101_0110,
    Hlt = 0b0000_0001,
}

impl Opcode {
    /// Every opcode the LS-8 understands.
    pub const ALL: [Opcode; 21] = [
        Opcode::Add, Opcode::Sub, Opcode::Mul, Opcode::Mod, Opcode::Cmp,
        Opcode::And, Opcode::Or, Opcode::Xor, Opcode::Not, Opcode::Shl, Opcode::Shr,
        Opcode::Ldi, Opcode::Prn, Opcode::Push, Opcode::Pop,
        Opcode::Call, Opcode::Ret, Opcode::Jmp, Opcode::Jeq, Opcode::Jne, Opcode::Hlt,
    ];

    /// Decode an opcode byte. Returns `None` for bytes outside the instruction set.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            0b1010_0000 => Opcode::Add,
            0b1010_0001 => Opcode::Sub,
            0b1010_0010 => Opcode::Mul,
            0b1010_0100 => Opcode::Mod,
            0b1010_0111 => Opcode::Cmp,
            0b1010_1000 => Opcode::And,
            0b1010_1010 => Opcode::Or,
            0b1010_1011 => Opcode::Xor,
            0b0110_1001 => Opcode::Not,
            0b1010_1100 => Opcode::Shl,
            0b1010_1101 => Opcode::Shr,
            0b1000_0010 => Opcode::Ldi,
            0b0100_0111 => Opcode::Prn,
            0b0100_0101 => Opcode::Push,
            0b0100_0110 => Opcode::Pop,
            0b0101_0000 => Opcode::Call,
            0b0001_0001 => Opcode::Ret,
            0b0101_0100 => Opcode::Jmp,
            0b0101_0101 => Opcode::Jeq,
            0b0101_0110 => Opcode::Jne,
            0b0000_0001 => Opcode::Hlt,
            _ => return None,
        };
        Some(op)
    }

    /// The encoded byte.
    #[inline]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Number of operand bytes following the opcode.
    #[inline]
    pub const fn operand_count(self) -> u8 {
        self.byte() >> 6
    }

    /// Total instruction width in bytes (1-3).
    #[inline]
    pub const fn width(self) -> u8 {
        1 + self.operand_count()
    }

    /// True if the instruction is handled by the ALU.
    #[inline]
    pub const fn is_alu(self) -> bool {
        self.byte() & 0b0010_0000 != 0
    }

    /// True if the instruction may set the PC directly.
    #[inline]
    pub const fn sets_pc(self) -> bool {
        self.byte() & 0b0001_0000 != 0
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Mod => "MOD",
            Opcode::Cmp => "CMP",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Not => "NOT",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::Ldi => "LDI",
            Opcode::Prn => "PRN",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
            Opcode::Hlt => "HLT",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode(byte))
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction together with its speculatively fetched operands.
///
/// Operands beyond `opcode.operand_count()` are whatever bytes followed the
/// opcode in memory and carry no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand_a: u8,
    pub operand_b: u8,
}

impl Instruction {
    /// Decode a three-byte fetch window.
    pub fn decode(window: [u8; 3]) -> Result<Self, DecodeError> {
        let [op, operand_a, operand_b] = window;
        Ok(Self {
            opcode: Opcode::try_from(op)?,
            operand_a,
            operand_b,
        })
    }

    /// Encoded bytes, trimmed to the instruction width.
    pub fn encode(&self) -> Vec<u8> {
        let bytes = [self.opcode.byte(), self.operand_a, self.operand_b];
        bytes[..self.opcode.width() as usize].to_vec()
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {0:#010b}")]
    UnknownOpcode(u8),
}
