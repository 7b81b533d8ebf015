//! Turns a bytecode file back into assembly source. Labels come out as numeric addresses.
//!
//! Usage: `disassembler [input [output]]`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use stackasm::{default_output, disassemble_file, init_logging, Tool};

const DEFAULT_INPUT  : &str = "code.in";
const DEFAULT_OUTPUT : &str = "source.out";

#[derive(Parser, Debug)]
#[command(name = "disassembler", version, about = "Disassemble bytecode into source text")]
#[command(disable_version_flag = true)]
struct Args {
  /// Bytecode file (default: code.in)
  input: Option<PathBuf>,

  /// Source output file (default: source.out, or <input>.out when an input is given)
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

  match disassemble_file(&input, &output) {
    Ok(_) => {
      println!("Disassembled code has successfully written to {}!", output.display());
      ExitCode::SUCCESS
    }
    Err(e) => {
      error!("{}", e);
      ExitCode::from(e.exit_code(Tool::Disassembler))
    }
  }
}
