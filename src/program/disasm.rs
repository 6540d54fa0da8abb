//! Disassembler for LS-8 programs.
//!
//! Converts a memory image back to readable assembly.

use crate::cpu::decode::Opcode;

/// Disassemble the instruction at the start of `bytes`.
///
/// Missing operand bytes read as zero.
pub fn disassemble_instruction(bytes: &[u8]) -> String {
    let byte_at = |i: usize| bytes.get(i).copied().unwrap_or(0);
    let (a, b) = (byte_at(1), byte_at(2));

    match bytes.first().copied().and_then(Opcode::from_byte) {
        Some(op) => format_instruction(op, a, b),
        None => format!("DB {:#010b}", byte_at(0)),
    }
}

/// Disassemble a whole image, one instruction per line.
pub fn disassemble(image: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; -----------------\n\n");

    let mut addr = 0;
    while addr < image.len() {
        let rest = &image[addr..];
        let width = rest
            .first()
            .copied()
            .and_then(Opcode::from_byte)
            .map_or(1, |op| op.width() as usize)
            .min(rest.len());

        let raw: Vec<String> = rest[..width].iter().map(|b| format!("{:08b}", b)).collect();
        output.push_str(&format!(
            "{:02X}: {:<12} ; {}\n",
            addr,
            disassemble_instruction(rest),
            raw.join(" ")
        ));
        addr += width;
    }

    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(op: Opcode, a: u8, b: u8) -> String {
    match op {
        Opcode::Ldi => format!("LDI R{},{}", a, b),
        Opcode::Not | Opcode::Prn | Opcode::Push | Opcode::Pop
        | Opcode::Call | Opcode::Jmp | Opcode::Jeq | Opcode::Jne => format!("{} R{}", op, a),
        Opcode::Ret | Opcode::Hlt => op.to_string(),
        _ => format!("{} R{},R{}", op, a, b),
    }
}
