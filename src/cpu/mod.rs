//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 255 byte-wide memory cells
//! - 8 general purpose registers, R7 doubling as stack pointer
//! - a flags register written by CMP
//! - 21-instruction set with 1 to 3 byte encodings

pub mod memory;
pub mod registers;
pub mod decode;
pub mod alu;
pub mod output;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Flags, Registers, RegisterError};
pub use decode::{Instruction, Opcode, DecodeError};
pub use alu::{AluOp, AluError};
pub use output::{Console, Output};
pub use execute::{Cpu, CpuError, CpuState};
