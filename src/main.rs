//! LS-8 Emulator - CLI Entry Point
//!
//! Usage: `ls8-emu <program.ls8> [--trace] [--max-cycles N] [--disasm] [--dump-state]`
//!
//! Exit codes:
//! - 0: program halted
//! - 1: no program given
//! - 2: program file not found
//! - 3: program could not be read or parsed
//! - 4: CPU fault (unknown opcode, bad address, ...)
//! - 5: cycle limit reached before HLT

use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ls8::{disassemble, load_program, Console, Cpu, LoadError};

const EXIT_USAGE: i32 = 1;
const EXIT_NOT_FOUND: i32 = 2;
const EXIT_LOAD: i32 = 3;
const EXIT_CPU: i32 = 4;
const EXIT_CYCLE_LIMIT: i32 = 5;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version)]
#[command(about = "An emulator for the LS-8 eight-bit virtual processor")]
struct Cli {
    /// Path to the .ls8 program to run
    program: Option<PathBuf>,

    /// Print a TRACE line before every instruction
    #[arg(short, long)]
    trace: bool,

    /// Stop after this many instructions
    #[arg(short, long)]
    max_cycles: Option<u64>,

    /// Print a disassembly of the program instead of running it
    #[arg(short, long)]
    disasm: bool,

    /// Print the final CPU state as JSON to stderr
    #[arg(long)]
    dump_state: bool,
}

fn main() {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match usage_exit_code(&e) {
            0 => e.exit(),
            code => {
                eprint!("{}", e);
                process::exit(code);
            }
        },
    };

    let Some(path) = cli.program.as_deref() else {
        eprintln!("Program file argument is missing. Ex.: ls8-emu programs/print8.ls8");
        process::exit(EXIT_USAGE);
    };

    let program = match load_program(path) {
        Ok(program) => program,
        Err(e @ LoadError::NotFound(_)) => {
            eprintln!("{}", e);
            process::exit(EXIT_NOT_FOUND);
        }
        Err(e) => {
            eprintln!("Failed to load {}: {}", path.display(), e);
            process::exit(EXIT_LOAD);
        }
    };
    info!("loaded {} bytes from {}", program.len(), path.display());

    if cli.disasm {
        print!("{}", disassemble(&program.bytes));
        return;
    }

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&program.bytes) {
        eprintln!("Failed to load {}: {}", path.display(), e);
        process::exit(EXIT_LOAD);
    }

    let code = execute(&mut cpu, cli.trace, cli.max_cycles);

    if cli.dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => warn!("could not serialize CPU state: {}", e),
        }
    }

    if code != 0 {
        process::exit(code);
    }
}

/// Exit code for a rejected command line. `--help` and `--version` succeed.
fn usage_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_USAGE,
    }
}

/// Run until HLT, a fault or the cycle limit. Returns the exit code.
fn execute(cpu: &mut Cpu, trace: bool, max_cycles: Option<u64>) -> i32 {
    let mut console = Console;

    while cpu.is_running() {
        if max_cycles.is_some_and(|limit| cpu.cycles >= limit) {
            eprintln!("Reached max cycles limit ({}) without HLT", cpu.cycles);
            return EXIT_CYCLE_LIMIT;
        }

        if trace {
            println!("{}", cpu.trace_line());
        }

        if let Err(e) = cpu.step(&mut console) {
            eprintln!("CPU fault: {}", e);
            debug!("{:?}", cpu);
            return EXIT_CPU;
        }
    }

    info!("halted after {} cycles", cpu.cycles);
    0
}

/// Initialize logging to stderr.
///
/// `RUST_LOG` overrides the default `warn` filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
