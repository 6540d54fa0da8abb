//! # LS-8 Emulator
//!
//! An emulator for the LS-8, a small eight-bit virtual processor.
//!
//! The LS-8 runs programs out of 255 bytes of memory with eight registers,
//! a downward-growing stack and a handful of arithmetic, logic, stack and
//! branch instructions. Programs are distributed as `.ls8` text files with
//! one binary byte per line.

pub mod cpu;
pub mod program;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Flags, Instruction, Opcode, Output, Console};
pub use program::{disassemble, load_program, parse_program, LoadError, Program};
