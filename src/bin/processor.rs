//! Executes a bytecode file. `in` reads numbers from stdin and `out` writes them to stdout.
//!
//! Usage: `processor [program] [--stack-size N] [--call-depth N] [--max-steps N]`

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use stackasm::processor::DEFAULT_STACK_CAPACITY;
use stackasm::{init_logging, load_file, Error, Processor, ProcessorConfig, Tool};

const DEFAULT_PROGRAM: &str = "code.out";

#[derive(Parser, Debug)]
#[command(name = "processor", version, about = "Run a bytecode program")]
#[command(disable_version_flag = true)]
struct Args {
  /// Bytecode file (default: code.out)
  program: Option<PathBuf>,

  /// Operand stack capacity
  #[arg(long, default_value_t = DEFAULT_STACK_CAPACITY)]
  stack_size: usize,

  /// Call stack capacity
  #[arg(long, default_value_t = DEFAULT_STACK_CAPACITY)]
  call_depth: usize,

  /// Stop with an error after this many instructions
  #[arg(long)]
  max_steps: Option<u64>,

  /// Print version
  #[arg(short = 'v', long, action = clap::ArgAction::Version)]
  version: Option<bool>,
}

fn main() -> ExitCode {
  init_logging();
  let args = Args::parse();
  let path = args.program.unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM));

  let program =
    match load_file(&path) {
      Ok(program) => program,
      Err(e) => {
        error!("{}", e);
        return ExitCode::from(e.exit_code(Tool::Processor));
      }
    };

  let config = ProcessorConfig {
    stack_capacity      : args.stack_size,
    call_stack_capacity : args.call_depth,
    max_steps           : args.max_steps,
  };
  let mut processor = Processor::new(config);

  let stdin = io::stdin();
  let mut stdout = BufWriter::new(io::stdout());

  match processor.run(&program, stdin.lock(), &mut stdout) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{}", e);
      eprintln!("{}", processor);
      ExitCode::from(Error::from(e).exit_code(Tool::Processor))
    }
  }
}
