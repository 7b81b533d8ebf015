//! Assembles a source file into bytecode.
//!
//! Usage: `assembler [input [output]]`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use stackasm::{assemble_file, default_output, init_logging, Tool};

const DEFAULT_INPUT  : &str = "source.in";
const DEFAULT_OUTPUT : &str = "code.out";

#[derive(Parser, Debug)]
#[command(name = "assembler", version, about = "Assemble source text into bytecode")]
#[command(disable_version_flag = true)]
struct Args {
  /// Assembly source file (default: source.in)
  input: Option<PathBuf>,

  /// Bytecode output file (default: code.out, or <input>.out when an input is given)
  output: Option<PathBuf>,

  /// Print version
  #[arg(short = 'v', long, action = clap::ArgAction::Version)]
  version: Option<bool>,
}

fn main() -> ExitCode {
  init_logging();
  let Args { input, output, .. } = Args::parse();

  let (input, output) =
    match input {
      Some(input) => {
        let output = output.unwrap_or_else(|| default_output(&input));
        (input, output)
      }
      None => (PathBuf::from(DEFAULT_INPUT), PathBuf::from(DEFAULT_OUTPUT)),
    };

  match assemble_file(&input, &output) {
    Ok(_) => {
      println!("Assembled code has successfully written to {}!", output.display());
      ExitCode::SUCCESS
    }
    Err(e) => {
      error!("{}", e);
      ExitCode::from(e.exit_code(Tool::Assembler))
    }
  }
}
