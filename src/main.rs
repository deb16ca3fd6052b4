//! Intcode program runner.
//!
//! Loads a program image from a file and runs it against the console.
//!
//! # Usage
//! ```text
//! intcode <program> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program`: Path to a comma-separated program image
//!
//! # Options
//! - `--input <value>`: Queue an input before the run (repeatable)
//! - `--ascii`: Treat inputs and outputs as text lines
//! - `--step-limit <n>`: Fail after `n` executed instructions
//! - `--trace`: Log every executed instruction
//! - `--quiet-timestamps`: Omit timestamps from log lines
//!
//! When the program asks for input and none is queued, a line is read from
//! stdin.

use intcode::config::{RunConfig, parse_step_limit};
use intcode::utils::log;
use intcode::virtual_machine::ascii;
use intcode::virtual_machine::errors::VMError;
use intcode::virtual_machine::program::ProgramImage;
use intcode::virtual_machine::vm::{RunOutcome, VM};
use intcode::{error, info};
use std::env;
use std::io::{self, BufRead, Write};
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let program_path = &args[1];

    let mut config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid environment: {}", e);
            process::exit(1);
        }
    };
    let mut inputs: Vec<&str> = Vec::new();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("--input requires an argument");
                    process::exit(1);
                }
                inputs.push(&args[i]);
                i += 1;
            }
            "--step-limit" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("--step-limit requires an argument");
                    process::exit(1);
                }
                config.step_limit = match parse_step_limit(&args[i]) {
                    Ok(limit) => Some(limit),
                    Err(e) => {
                        eprintln!("{}", e);
                        process::exit(1);
                    }
                };
                i += 1;
            }
            "--ascii" => {
                config.ascii = true;
                i += 1;
            }
            "--trace" => {
                config.trace = true;
                i += 1;
            }
            "--quiet-timestamps" => {
                config.show_timestamps = false;
                i += 1;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if let Err(e) = log::init_from_env() {
        eprintln!("Invalid {}: {}", log::LOG_ENV, e);
        process::exit(1);
    }
    config.apply_logging();

    let image = match ProgramImage::from_file(program_path) {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to load {}: {}", program_path, e);
            process::exit(1);
        }
    };
    info!("Loaded {} ({} values)", program_path, image.len());

    let mut vm = VM::from_image(&image);
    config.apply(&mut vm);

    for input in inputs {
        if let Err(e) = queue_line(&vm, input, config.ascii) {
            error!("Invalid input '{}': {}", input, e);
            process::exit(1);
        }
    }

    match run(&mut vm, &config) {
        Ok(()) => info!("Program halted after {} steps", vm.steps()),
        Err(e) => {
            error!("Program failed: {}", e);
            process::exit(1);
        }
    }
}

/// Runs `vm` cooperatively, reading stdin whenever it starves for input.
fn run(vm: &mut VM, config: &RunConfig) -> Result<(), VMError> {
    let stdin = io::stdin();
    loop {
        let outcome = vm.run_to_halt()?;
        print_outputs(vm, config.ascii)?;
        match outcome {
            RunOutcome::Halted => return Ok(()),
            RunOutcome::NeedsInput => {
                if !config.ascii {
                    print!("[INPUT] ");
                    io::stdout().flush()?;
                }
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    return Err(VMError::ChannelClosed);
                }
                queue_line(vm, line.trim_end_matches(['\n', '\r']), config.ascii)?;
            }
        }
    }
}

/// Queues one line of console input: text in ASCII mode, otherwise one or
/// more comma-separated integers.
fn queue_line(vm: &VM, line: &str, ascii_mode: bool) -> Result<(), VMError> {
    if ascii_mode {
        ascii::push_line(vm.input(), line);
    } else {
        vm.push_inputs(ProgramImage::parse(line)?.values().iter().copied());
    }
    Ok(())
}

fn print_outputs(vm: &VM, ascii_mode: bool) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for value in vm.output().drain() {
        match ascii::to_char(value).filter(|_| ascii_mode) {
            Some(c) => write!(stdout, "{c}")?,
            None => writeln!(stdout, "[OUTPUT] {value}")?,
        }
    }
    stdout.flush()
}

const USAGE: &str = "\
Intcode Runner

USAGE:
    {program} <program> [OPTIONS]

ARGS:
    <program>    Path to a comma-separated Intcode program image

OPTIONS:
    --input <value>       Queue an input value before running (repeatable)
    --ascii               Exchange text lines instead of integers
    --step-limit <n>      Fail after n executed instructions
    --trace               Log every executed instruction
    --quiet-timestamps    Omit timestamps from log lines
    -h, --help            Print this help message

ENVIRONMENT:
    INTCODE_LOG           Log level: trace, debug, info, warn, error (default: info)
    INTCODE_STEP_LIMIT    Default step limit

EXAMPLES:
    # Run a diagnostic program with input 5
    {program} day05.txt --input 5

    # Drive a text program interactively
    {program} day25.txt --ascii

    # Trace a short run
    {program} day09.txt --input 1 --trace --step-limit 1000
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
