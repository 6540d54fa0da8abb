//! `.ls8` program format.
//!
//! A simple text-based format:
//! - One byte per line, written in binary (`10000010`)
//! - `#` starts a comment that runs to the end of the line
//! - Blank lines and comment-only lines are ignored
//!
//! ```text
//! # print8.ls8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```

use crate::cpu::memory::MEMORY_SIZE;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Comment marker.
const COMMENT: char = '#';

/// A loaded program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// The bytes to place in memory from address 0.
    pub bytes: Vec<u8>,
    /// Original source line for each byte (for debugging).
    pub source_lines: Vec<String>,
}

impl Program {
    /// Create a new empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a byte.
    pub fn push(&mut self, byte: u8, source: &str) {
        self.bytes.push(byte);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Load a `.ls8` file from disk.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Program, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::NotFound(path.display().to_string()),
        _ => LoadError::Io(e.to_string()),
    })?;

    let mut program = Program::new();
    for (line_num, line_result) in BufReader::new(file).lines().enumerate() {
        let line = line_result.map_err(|e| LoadError::Io(e.to_string()))?;
        parse_line(&mut program, &line, line_num + 1)?;
    }

    check_size(&program)?;
    tracing::debug!(path = %path.display(), bytes = program.len(), "loaded program");
    Ok(program)
}

/// Parse `.ls8` source text.
pub fn parse_program(source: &str) -> Result<Program, LoadError> {
    let mut program = Program::new();
    for (line_num, line) in source.lines().enumerate() {
        parse_line(&mut program, line, line_num + 1)?;
    }

    check_size(&program)?;
    Ok(program)
}

fn parse_line(program: &mut Program, line: &str, line_num: usize) -> Result<(), LoadError> {
    let code = line
        .split(COMMENT)
        .next()
        .unwrap_or_default()
        .trim();

    if code.is_empty() {
        return Ok(());
    }

    let byte = u8::from_str_radix(code, 2).map_err(|_| LoadError::Parse {
        line: line_num,
        token: code.to_string(),
    })?;

    program.push(byte, line.trim());
    Ok(())
}

fn check_size(program: &Program) -> Result<(), LoadError> {
    if program.len() > MEMORY_SIZE {
        return Err(LoadError::TooLarge {
            size: program.len(),
            capacity: MEMORY_SIZE,
        });
    }
    Ok(())
}

/// Errors that can occur while loading a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("{0}: file not found")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {token:?} is not a binary byte")]
    Parse { line: usize, token: String },

    #[error("program is {size} bytes, memory holds {capacity}")]
    TooLarge { size: usize, capacity: usize },
}
