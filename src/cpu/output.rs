//! Output sink for the `PRN` instruction.

use std::io::{self, Write};

/// Receives every value printed by `PRN`.
///
/// A failed write is a CPU fault: execution stops at the `PRN` that could
/// not be delivered.
pub trait Output {
    fn print(&mut self, value: u8) -> io::Result<()>;
}

/// Collects printed values in order.
impl Output for Vec<u8> {
    fn print(&mut self, value: u8) -> io::Result<()> {
        self.push(value);
        Ok(())
    }
}

/// Writes each value in decimal on its own line to stdout.
#[derive(Debug, Default)]
pub struct Console;

impl Output for Console {
    fn print(&mut self, value: u8) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", value)?;
        stdout.flush()
    }
}
