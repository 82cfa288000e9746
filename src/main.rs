use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{bail, IntoDiagnostic, Result};

use luna::output::{self, file_message, message, MsgColor};
use luna::{error, isa, Cpu, Memory, StepComment};

/// Luna is a tiny register-free virtual machine with a line-oriented assembly language.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a program file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program and print memory once it stops
    Run {
        /// Program file to run
        name: PathBuf,
        /// Amount of memory cells (default from LUNA_MEMORY, else 32)
        #[arg(short, long)]
        memory: Option<usize>,
        /// Stop after this many steps (default from LUNA_MAX_STEPS, else 10000)
        #[arg(short, long)]
        steps: Option<usize>,
        /// Print every executed instruction to stderr (also LUNA_TRACE=1)
        #[arg(short, long)]
        trace: bool,
        /// Produce minimal output, suited for blackbox tests
        #[arg(long)]
        minimal: bool,
    },
    /// Check a program for errors without running it
    Check {
        /// File to check
        name: PathBuf,
    },
}

struct RunOptions {
    memory: usize,
    steps: usize,
    trace: bool,
}

impl RunOptions {
    fn from_env() -> Self {
        RunOptions {
            memory: luna::env::memory_size(),
            steps: luna::env::max_steps(),
            trace: luna::env::is_trace_enabled(),
        }
    }
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    luna::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(luna::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    match args.command {
        Some(Command::Run {
            name,
            memory,
            steps,
            trace,
            minimal,
        }) => {
            output::set_minimal(minimal);
            let defaults = RunOptions::from_env();
            let opts = RunOptions {
                memory: memory.unwrap_or(defaults.memory),
                steps: steps.unwrap_or(defaults.steps),
                trace: trace || defaults.trace,
            };
            run(&name, opts)
        }
        Some(Command::Check { name }) => {
            file_message(MsgColor::Green, "Checking", &name);
            let src = fs::read_to_string(&name).into_diagnostic()?;
            let cpu = assemble(&name, &src, 0)?;
            let count = cpu.instructions().len();
            message(
                MsgColor::Green,
                "Success",
                &format!("{count} instruction{}, no errors found!", plural(count)),
            );
            Ok(())
        }
        None => {
            if let Some(path) = args.path {
                run(&path, RunOptions::from_env())
            } else {
                println!("\n~ luna v{VERSION} ~");
                println!("{SHORT_INFO}");
                Ok(())
            }
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Machine with the reference instruction set and `src` parsed into it
fn assemble(name: &Path, src: &str, memory: usize) -> Result<Cpu> {
    let mut cpu = Cpu::new(Memory::new(memory));
    cpu.definitions_mut()
        .register_all(isa::builtins())
        .into_diagnostic()?;

    let lines: Vec<&str> = src.lines().collect();
    cpu.parse(&lines)
        .into_result()
        .map_err(|e| error::parse_failure(e, &name.display().to_string(), src))?;
    Ok(cpu)
}

fn run(name: &Path, opts: RunOptions) -> Result<()> {
    file_message(MsgColor::Green, "Parsing", name);
    let src = fs::read_to_string(name).into_diagnostic()?;
    let mut cpu = assemble(name, &src, opts.memory)?;

    let count = cpu.instructions().len();
    message(
        MsgColor::Green,
        "Running",
        &format!("{count} instruction{}", plural(count)),
    );

    let mut steps = 0;
    loop {
        if steps == opts.steps {
            message(
                MsgColor::Yellow,
                "Stopped",
                &format!("step limit of {steps} reached"),
            );
            break;
        }
        let pointer = cpu.pointer();
        let result = cpu.step();
        match result.comment {
            StepComment::Ok => {
                if opts.trace {
                    // Pointer was in range for the step to succeed
                    output::trace(pointer, &cpu.instructions()[pointer as usize], result.line);
                }
                steps += 1;
            }
            StepComment::EndOfCode => {
                message(
                    MsgColor::Green,
                    "Completed",
                    &format!("{steps} step{}", plural(steps)),
                );
                break;
            }
            StepComment::NoInstruction => {
                let instr = &cpu.instructions()[result.line as usize];
                let Some(fault) = cpu.last_fault() else {
                    bail!("Instruction {} failed without a cause", result.line);
                };
                output::print_memory(cpu.memory());
                return Err(error::step_failure(
                    instr,
                    fault,
                    &name.display().to_string(),
                    &src,
                ));
            }
        }
    }

    output::print_memory(cpu.memory());
    Ok(())
}

const SHORT_INFO: &str = r"
Welcome to luna, a tiny virtual machine for a line-oriented assembly language.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
