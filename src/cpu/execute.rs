//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::alu::{self, AluError, AluOp};
use crate::cpu::decode::{Instruction, Opcode};
use crate::cpu::memory::MemoryError;
use crate::cpu::output::Output;
use crate::cpu::registers::RegisterError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
    /// CPU encountered an error.
    Error,
}

/// The LS-8 CPU.
///
/// Not meant to be shared between threads while running; `step` and `run`
/// borrow the CPU mutably for the whole call.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Program counter.
    pc: usize,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU in its power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            pc: 0,
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.pc = 0;
        self.last_instr = None;
    }

    /// Load a program into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. Any error leaves the CPU
    /// in [`CpuState::Error`].
    pub fn step(&mut self, out: &mut dyn Output) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        match self.cycle(out) {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(e) => {
                tracing::debug!(pc = self.pc, cycles = self.cycles, "cpu fault: {}", e);
                self.state = CpuState::Error;
                Err(e)
            }
        }
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, out: &mut dyn Output) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, out: &mut dyn Output, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Fetch, decode and execute the instruction at PC.
    fn cycle(&mut self, out: &mut dyn Output) -> Result<Instruction, CpuError> {
        let pc = self.pc;

        // Fetch: always three bytes, whatever the instruction width.
        let window = [
            self.mem.read(pc)?,
            self.mem.read(pc + 1)?,
            self.mem.read(pc + 2)?,
        ];

        // Decode
        let instr = Instruction::decode(window)
            .map_err(|_| CpuError::UnknownOpcode { opcode: window[0], pc })?;

        tracing::trace!(
            pc,
            op = instr.opcode.mnemonic(),
            a = instr.operand_a,
            b = instr.operand_b,
            "execute"
        );

        // Execute
        self.execute(instr, out)?;

        Ok(instr)
    }

    /// Execute a decoded instruction and move the PC.
    fn execute(&mut self, instr: Instruction, out: &mut dyn Output) -> Result<(), CpuError> {
        let Instruction { opcode, operand_a: a, operand_b: b } = instr;
        let next_pc = self.pc + opcode.width() as usize;

        match opcode {
            // ==================== ALU ====================

            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Mod | Opcode::Cmp
            | Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Not
            | Opcode::Shl | Opcode::Shr => {
                alu::apply(AluOp::try_from(opcode)?, a, b, &mut self.regs)?;
                self.pc = next_pc;
            }

            // ==================== Data ====================

            Opcode::Ldi => {
                self.regs.set(a, b)?;
                self.pc = next_pc;
            }

            Opcode::Prn => {
                let value = self.regs.get(a)?;
                out.print(value).map_err(|e| CpuError::Output(e.to_string()))?;
                self.pc = next_pc;
            }

            Opcode::Push => {
                let value = self.regs.get(a)?;
                self.push(value)?;
                self.pc = next_pc;
            }

            Opcode::Pop => {
                let value = self.pop()?;
                self.regs.set(a, value)?;
                self.pc = next_pc;
            }

            // ==================== Control Flow ====================

            Opcode::Call => {
                let target = self.regs.get(a)?;
                // The fetch window ended inside memory, so the return address fits a byte.
                self.push(next_pc as u8)?;
                self.pc = target as usize;
            }

            Opcode::Ret => {
                self.pc = self.pop()? as usize;
            }

            Opcode::Jmp => {
                self.pc = self.regs.get(a)? as usize;
            }

            Opcode::Jeq => {
                self.pc = if self.regs.flags().is_equal() {
                    self.regs.get(a)? as usize
                } else {
                    next_pc
                };
            }

            Opcode::Jne => {
                self.pc = if !self.regs.flags().is_equal() {
                    self.regs.get(a)? as usize
                } else {
                    next_pc
                };
            }

            Opcode::Hlt => {
                self.state = CpuState::Halted;
                self.pc = next_pc;
            }
        }

        Ok(())
    }

    /// Decrement SP, then store `value` at the new top of stack.
    fn push(&mut self, value: u8) -> Result<(), CpuError> {
        let sp = self.regs.sp().wrapping_sub(1);
        self.mem.write(sp as usize, value)?;
        self.regs.set_sp(sp);
        Ok(())
    }

    /// Load the top of stack, then increment SP.
    fn pop(&mut self) -> Result<u8, CpuError> {
        let sp = self.regs.sp();
        let value = self.mem.read(sp as usize)?;
        self.regs.set_sp(sp.wrapping_add(1));
        Ok(value)
    }

    /// One-line dump of PC, the fetch window and all registers.
    ///
    /// `TRACE: PC | OP A B | R0 R1 R2 R3 R4 R5 R6 R7`, bytes past the end of
    /// memory shown as `00`.
    pub fn trace_line(&self) -> String {
        let peek = |addr: usize| self.mem.read(addr).unwrap_or(0);
        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            self.pc,
            peek(self.pc),
            peek(self.pc + 1),
            peek(self.pc + 2),
        );
        for reg in self.regs.as_array() {
            line.push_str(&format!(" {:02X}", reg));
        }
        line
    }

    /// Current program counter.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("unknown opcode {opcode:#010b} at PC={pc:#04x}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),

    #[error("ALU error: {0}")]
    Alu(#[from] AluError),

    #[error("output error: {0}")]
    Output(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::{Flags, SP_INIT};
    use proptest::prelude::*;

    const LDI: u8 = Opcode::Ldi.byte();
    const PRN: u8 = Opcode::Prn.byte();
    const HLT: u8 = Opcode::Hlt.byte();
    const MUL: u8 = Opcode::Mul.byte();
    const CMP: u8 = Opcode::Cmp.byte();
    const PUSH: u8 = Opcode::Push.byte();
    const POP: u8 = Opcode::Pop.byte();
    const CALL: u8 = Opcode::Call.byte();
    const RET: u8 = Opcode::Ret.byte();
    const JMP: u8 = Opcode::Jmp.byte();
    const JEQ: u8 = Opcode::Jeq.byte();
    const JNE: u8 = Opcode::Jne.byte();

    fn boot(program: &[u8]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(program).unwrap();
        cpu
    }

    fn run_program(program: &[u8]) -> (Cpu, Vec<u8>) {
        let mut cpu = boot(program);
        let mut out: Vec<u8> = Vec::new();
        cpu.run(&mut out).unwrap();
        (cpu, out)
    }

    #[test]
    fn test_cpu_halt() {
        let (cpu, out) = run_program(&[HLT]);

        assert_eq!(cpu.cycles, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.pc(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_step_after_halt() {
        let mut cpu = boot(&[HLT]);
        let mut out: Vec<u8> = Vec::new();
        cpu.step(&mut out).unwrap();

        assert_eq!(
            cpu.step(&mut out),
            Err(CpuError::NotRunning(CpuState::Halted))
        );
    }

    #[test]
    fn test_mult_program() {
        let (cpu, out) = run_program(&[
            LDI, 0, 8,
            LDI, 1, 9,
            MUL, 0, 1,
            PRN, 0,
            HLT,
        ]);

        assert_eq!(out, vec![72]);
        assert_eq!(cpu.cycles, 5);
    }

    #[test]
    fn test_ldi_prn_every_register() {
        for reg in 0..8u8 {
            let (_, out) = run_program(&[LDI, reg, 200 + reg, PRN, reg, HLT]);
            assert_eq!(out, vec![200 + reg], "R{}", reg);
        }
    }

    #[test]
    fn test_push_pop() {
        let (cpu, _) = run_program(&[
            LDI, 0, 42,
            PUSH, 0,
            POP, 1,
            HLT,
        ]);

        assert_eq!(cpu.regs.get(1).unwrap(), 42);
        assert_eq!(cpu.regs.sp(), SP_INIT);
        assert_eq!(cpu.mem.read(SP_INIT as usize - 1).unwrap(), 42);
    }

    #[test]
    fn test_stack_is_lifo() {
        let (_, out) = run_program(&[
            LDI, 0, 1,
            LDI, 1, 2,
            PUSH, 0,
            PUSH, 1,
            POP, 2,
            PRN, 2,
            POP, 2,
            PRN, 2,
            HLT,
        ]);

        assert_eq!(out, vec![2, 1]);
    }

    #[test]
    fn test_call_ret() {
        let program = [
            LDI, 1, 10, // 0
            CALL, 1,    // 3
            PRN, 0,     // 5
            HLT,        // 7
            0, 0,       // 8
            LDI, 0, 99, // 10
            RET,        // 13
        ];
        let mut cpu = boot(&program);
        let mut out: Vec<u8> = Vec::new();

        cpu.step(&mut out).unwrap();
        cpu.step(&mut out).unwrap();
        assert_eq!(cpu.pc(), 10);
        assert_eq!(cpu.regs.sp(), SP_INIT - 1);
        assert_eq!(cpu.mem.read(SP_INIT as usize - 1).unwrap(), 5);

        cpu.step(&mut out).unwrap();
        cpu.step(&mut out).unwrap();
        assert_eq!(cpu.pc(), 5);
        assert_eq!(cpu.regs.sp(), SP_INIT);

        cpu.run(&mut out).unwrap();
        assert_eq!(out, vec![99]);
    }

    #[test]
    fn test_jmp() {
        let (_, out) = run_program(&[
            LDI, 0, 8,  // 0
            JMP, 0,     // 3
            PRN, 0,     // 5: skipped
            HLT,        // 7: skipped
            PRN, 0,     // 8
            HLT,        // 10
        ]);

        assert_eq!(out, vec![8]);
    }

    /// Returns true if the conditional jump was taken.
    fn branch(jump: u8, a: u8, b: u8) -> bool {
        let (cpu, _) = run_program(&[
            LDI, 0, a,   // 0
            LDI, 1, b,   // 3
            LDI, 2, 18,  // 6
            CMP, 0, 1,   // 9
            jump, 2,     // 12
            LDI, 3, 1,   // 14
            HLT,         // 17
            LDI, 3, 2,   // 18
            HLT,         // 21
        ]);
        cpu.regs.get(3).unwrap() == 2
    }

    #[test]
    fn test_conditional_jumps() {
        for (a, b) in [(1, 2), (2, 2), (3, 2)] {
            assert_eq!(branch(JEQ, a, b), a == b, "JEQ {} {}", a, b);
            assert_eq!(branch(JNE, a, b), a != b, "JNE {} {}", a, b);
        }
    }

    #[test]
    fn test_jne_without_cmp_jumps() {
        // Flags start clear, which is not EQUAL.
        assert_eq!(Cpu::new().regs.flags(), Flags::CLEAR);
        let (_, out) = run_program(&[
            LDI, 0, 7,   // 0
            JNE, 0,      // 3
            HLT,         // 5
            0,           // 6
            PRN, 0,      // 7
            HLT,         // 9
        ]);
        assert_eq!(out, vec![7]);
    }

    #[test]
    fn test_extended_alu_ops() {
        let (cpu, out) = run_program(&[
            LDI, 0, 17,
            LDI, 1, 5,
            Opcode::Mod.byte(), 0, 1,
            PRN, 0,
            Opcode::Sub.byte(), 0, 1,
            PRN, 0,
            Opcode::Not.byte(), 0,
            PRN, 0,
            LDI, 2, 4,
            Opcode::Shl.byte(), 1, 2,
            PRN, 1,
            HLT,
        ]);

        // 17 % 5 = 2; 2 - 5 wraps to 253; !253 = 2; 5 << 4 = 80
        assert_eq!(out, vec![2, 253, 2, 80]);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_unknown_opcode_stops_execution() {
        let mut cpu = boot(&[
            LDI, 0, 1,
            PRN, 0,
            0xFF,
            PRN, 0,
            HLT,
        ]);
        let mut out: Vec<u8> = Vec::new();

        let err = cpu.run(&mut out).unwrap_err();

        assert_eq!(err, CpuError::UnknownOpcode { opcode: 0xFF, pc: 5 });
        assert_eq!(out, vec![1]);
        assert_eq!(cpu.state, CpuState::Error);
        assert_eq!(cpu.pc(), 5);
        assert_eq!(cpu.step(&mut out), Err(CpuError::NotRunning(CpuState::Error)));
    }

    #[test]
    fn test_not_followed_by_instruction() {
        // The byte after NOT R0 is PRN's opcode, well past R7.
        let (_, out) = run_program(&[
            LDI, 0, 0b1111_0000,
            Opcode::Not.byte(), 0,
            PRN, 0,
            HLT,
        ]);

        assert_eq!(out, vec![0b0000_1111]);
    }

    struct ClosedPipe;

    impl Output for ClosedPipe {
        fn print(&mut self, _value: u8) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
        }
    }

    #[test]
    fn test_output_failure_stops_execution() {
        let mut cpu = boot(&[
            LDI, 0, 1,
            PRN, 0,
            LDI, 1, 2,
            HLT,
        ]);

        let err = cpu.run(&mut ClosedPipe).unwrap_err();

        assert!(matches!(err, CpuError::Output(_)));
        assert_eq!(cpu.state, CpuState::Error);
        assert_eq!(cpu.pc(), 3);
        assert_eq!(cpu.regs.get(1).unwrap(), 0);
    }

    #[test]
    fn test_mod_by_zero_is_fatal() {
        let mut cpu = boot(&[Opcode::Mod.byte(), 0, 1, HLT]);
        let err = cpu.run(&mut Vec::<u8>::new()).unwrap_err();

        assert!(matches!(err, CpuError::Alu(AluError::DivisionByZero { dest: 0, src: 1 })));
        assert_eq!(cpu.state, CpuState::Error);
    }

    #[test]
    fn test_bad_register_index() {
        let mut cpu = boot(&[LDI, 8, 1, HLT]);
        let err = cpu.run(&mut Vec::<u8>::new()).unwrap_err();

        assert_eq!(err, CpuError::Register(RegisterError::IndexOutOfRange(8)));
    }

    #[test]
    fn test_push_below_memory() {
        // SP = 0 wraps to 255, which is past the end of memory.
        let mut cpu = boot(&[LDI, 7, 0, PUSH, 0, HLT]);
        let err = cpu.run(&mut Vec::<u8>::new()).unwrap_err();

        assert_eq!(err, CpuError::Memory(MemoryError::AddressOutOfRange(255)));
        assert_eq!(cpu.regs.sp(), 0);
    }

    #[test]
    fn test_fetch_window_past_end_of_memory() {
        let mut cpu = boot(&[LDI, 0, 253, JMP, 0]);
        cpu.mem.write(253, HLT).unwrap();

        let err = cpu.run(&mut Vec::<u8>::new()).unwrap_err();

        assert_eq!(err, CpuError::Memory(MemoryError::AddressOutOfRange(255)));
    }

    #[test]
    fn test_run_limited() {
        let mut cpu = boot(&[LDI, 0, 3, JMP, 0]);
        let executed = cpu.run_limited(&mut Vec::<u8>::new(), 10).unwrap();

        assert_eq!(executed, 10);
        assert!(cpu.is_running());
        assert_eq!(cpu.last_instruction().map(|i| i.opcode), Some(Opcode::Jmp));
    }

    #[test]
    fn test_trace_line() {
        let cpu = boot(&[LDI, 0, 8]);
        assert_eq!(
            cpu.trace_line(),
            "TRACE: 00 | 82 00 08 | 00 00 00 00 00 00 00 F4"
        );
    }

    #[test]
    fn test_reset() {
        let (mut cpu, _) = run_program(&[LDI, 0, 8, PUSH, 0, HLT]);
        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs, Registers::new());
        assert_eq!(cpu.mem.read(0).unwrap(), 0);
    }

    #[test]
    fn test_deterministic() {
        let program = [LDI, 0, 8, LDI, 1, 9, MUL, 0, 1, PRN, 0, HLT];
        let (_, first) = run_program(&program);
        let (_, second) = run_program(&program);
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn arbitrary_images_are_deterministic(
            image in proptest::collection::vec(any::<u8>(), 0..64)
        ) {
            let mut a = boot(&image);
            let mut b = boot(&image);
            let (mut out_a, mut out_b): (Vec<u8>, Vec<u8>) = (Vec::new(), Vec::new());

            let res_a = a.run_limited(&mut out_a, 256);
            let res_b = b.run_limited(&mut out_b, 256);

            prop_assert_eq!(res_a, res_b);
            prop_assert_eq!(out_a, out_b);
            prop_assert_eq!(a.pc(), b.pc());
            prop_assert_eq!(a.regs, b.regs);
        }
    }
}
