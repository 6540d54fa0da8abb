//! Program images for the LS-8.
//!
//! This module provides:
//! - A loader for `.ls8` text files (one binary byte per line)
//! - A disassembler (memory image → readable text)

pub mod loader;
pub mod disasm;

pub use loader::{load_program, parse_program, LoadError, Program};
pub use disasm::{disassemble, disassemble_instruction};
