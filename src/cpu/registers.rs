//! LS-8 registers.
//!
//! The LS-8 has 8 general purpose registers, R0 to R7:
//! - R0-R6: free for programs
//! - R7: stack pointer, starts at 0xF4
//!
//! and a flags register holding the result of the last comparison.

use serde::{Serialize, Deserialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Index of the register used as stack pointer.
pub const SP: u8 = 7;

/// Initial stack pointer value (top of the stack area).
pub const SP_INIT: u8 = 0xF4;

/// Condition code written by `CMP`.
///
/// At most one bit is set at a time: `0b00000LGE`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags(u8);

impl Flags {
    /// No comparison has happened yet.
    pub const CLEAR: Flags = Flags(0b000);
    /// Operands were equal.
    pub const EQUAL: Flags = Flags(0b001);
    /// First operand was greater.
    pub const GREATER_THAN: Flags = Flags(0b010);
    /// First operand was smaller.
    pub const LESS_THAN: Flags = Flags(0b100);

    /// Flags describing how the first operand compares to the second.
    pub fn from_ordering(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Equal => Flags::EQUAL,
            Ordering::Greater => Flags::GREATER_THAN,
            Ordering::Less => Flags::LESS_THAN,
        }
    }

    /// Raw bit pattern.
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn is_equal(self) -> bool {
        self == Flags::EQUAL
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            Flags::CLEAR => "-",
            Flags::EQUAL => "E",
            Flags::GREATER_THAN => "G",
            Flags::LESS_THAN => "L",
            _ => "?",
        };
        write!(f, "FL={:03b} ({})", self.0, name)
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7. R7 doubles as the stack pointer.
    gpr: [u8; REGISTER_COUNT],

    /// FL: result of the last CMP.
    fl: Flags,
}

impl Registers {
    /// Create a register file in its power-on state.
    pub fn new() -> Self {
        let mut gpr = [0; REGISTER_COUNT];
        gpr[SP as usize] = SP_INIT;
        Self {
            gpr,
            fl: Flags::CLEAR,
        }
    }

    /// Reset all registers to their power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read register `index`.
    #[inline]
    pub fn get(&self, index: u8) -> Result<u8, RegisterError> {
        self.gpr
            .get(index as usize)
            .copied()
            .ok_or(RegisterError::IndexOutOfRange(index))
    }

    /// Write register `index`.
    #[inline]
    pub fn set(&mut self, index: u8, value: u8) -> Result<(), RegisterError> {
        let reg = self.gpr
            .get_mut(index as usize)
            .ok_or(RegisterError::IndexOutOfRange(index))?;
        *reg = value;
        Ok(())
    }

    /// Current stack pointer.
    #[inline]
    pub fn sp(&self) -> u8 {
        self.gpr[SP as usize]
    }

    #[inline]
    pub fn set_sp(&mut self, value: u8) {
        self.gpr[SP as usize] = value;
    }

    pub fn flags(&self) -> Flags {
        self.fl
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.fl = flags;
    }

    /// All eight registers, R0 first.
    pub fn as_array(&self) -> &[u8; REGISTER_COUNT] {
        &self.gpr
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when addressing the register file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("register index {0} out of range (R0-R7)")]
    IndexOutOfRange(u8),
}
