/*!
  Tools for a small stack-based instruction set.

  Source text goes through the `assembler` into a `Program`, which is stored with the
  `bytecode` text encoding. The `disassembler` renders a program back into source text, and the
  `processor` executes it.

  The functions here tie those pieces to the file system for the command line tools in
  `src/bin`.
*/

pub mod assembler;
pub mod bytecode;
pub mod disassembler;
pub mod error;
pub mod processor;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub use assembler::assemble;
pub use bytecode::{decode, encode, Instruction, Program};
pub use disassembler::disassemble;
pub use error::{Error, ErrorKind, Tool};
pub use processor::{Processor, ProcessorConfig};

/// Extension appended to an input path when no output path is given.
pub const OUTPUT_EXTENSION: &str = ".out";

/**
  Installs a `tracing` subscriber writing to stderr. `RUST_LOG` overrides the default filter,
  which shows warnings and errors only, so diagnostics never mix with program output.
*/
pub fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();
}

/// The output path used when only an input path is given: the input with `.out` appended.
pub fn default_output(input: &Path) -> PathBuf {
  let mut name = input.as_os_str().to_os_string();
  name.push(OUTPUT_EXTENSION);
  PathBuf::from(name)
}

fn read(path: &Path) -> Result<String, Error> {
  fs::read_to_string(path).map_err(|source| Error::Open { path: path.to_path_buf(), source })
}

fn write(path: &Path, contents: &str) -> Result<(), Error> {
  fs::write(path, contents).map_err(|source| Error::Write { path: path.to_path_buf(), source })
}

/// Assembles the source file at `input` and writes its bytecode to `output`. Nothing is written
/// unless assembly succeeds.
pub fn assemble_file(input: &Path, output: &Path) -> Result<Program, Error> {
  let source = read(input)?;
  let program = assemble(&source)?;
  write(output, &encode(&program))?;

  info!(
    instructions = program.instruction_count(),
    operands     = program.operand_count(),
    "assembled {} into {}", input.display(), output.display()
  );
  Ok(program)
}

/// Reads and validates the bytecode file at `path`.
pub fn load_file(path: &Path) -> Result<Program, Error> {
  let text = read(path)?;
  Ok(decode(&text)?)
}

/// Disassembles the bytecode file at `input` into source text at `output`. Nothing is written
/// when the bytecode is corrupt.
pub fn disassemble_file(input: &Path, output: &Path) -> Result<Program, Error> {
  let program = load_file(input)?;
  let source = disassemble(&program)?;
  write(output, &source)?;

  info!(instructions = program.len(), "disassembled {} into {}", input.display(), output.display());
  Ok(program)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::Register;
  use crate::error::{AssemblyError, Fault};

  fn run(source: &str, input: &str) -> (Processor, Result<(), error::RuntimeError>, String) {
    let program = assemble(source).unwrap();
    let program = decode(&encode(&program)).unwrap();
    let mut processor = Processor::new(ProcessorConfig::default());
    let mut output = Vec::<u8>::new();
    let result = processor.run(&program, input.as_bytes(), &mut output);
    (processor, result, String::from_utf8(output).unwrap())
  }

  fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("stackasm-{}-{}", std::process::id(), name))
  }

  // region Scenarios

  #[test]
  fn adds_two_numbers() {
    let source = "push 3\npush 4\nadd\nout\nend\n";
    let program = assemble(source).unwrap();
    assert_eq!(program.instruction_count(), 5);
    assert_eq!(program.operand_count(), 2);
    assert!(encode(&program).starts_with("5 2 "));

    let (_, result, output) = run(source, "");
    assert!(result.is_ok());
    assert_eq!(output, "7\n");
  }

  #[test]
  fn forward_jump_skips_code() {
    let (_, result, output) = run("jmp skip:\npush 1\nout\nskip:\npush 2\nout\nend\n", "");
    assert!(result.is_ok());
    assert_eq!(output, "2\n");
  }

  #[test]
  fn subroutine_called_twice() {
    let source = "\
      call constant\n\
      call constant:\n\
      end\n\
      constant:\n\
        push 42\n\
        out\n\
        ret\n";
    let (processor, result, output) = run(source, "");
    assert!(result.is_ok());
    assert_eq!(output, "42\n42\n");
    assert!(processor.call_stack().is_empty());
    assert!(processor.stack().is_empty());
  }

  #[test]
  fn forward_and_backward_references_agree() {
    let forward = assemble("jmp target:\nnop\ntarget:\nend").unwrap();
    let numeric = assemble("jmp 2\nnop\nend").unwrap();
    assert_eq!(forward, numeric);

    let backward = assemble("top:\nnop\njmp top:").unwrap();
    assert_eq!(backward, assemble("nop\njmp 0").unwrap());
  }

  #[test]
  fn round_trip_is_stable() {
    let source = "in\npop rbx\npush rbx\npush 1\njbe 7\npush rbx\nout\nend\n";
    let first = assemble(source).unwrap();
    let text = disassemble(&decode(&encode(&first)).unwrap()).unwrap();
    let second = assemble(&text).unwrap();
    assert_eq!(first, second);
    assert_eq!(encode(&first), encode(&second));
  }

  #[test]
  fn countdown_loop_with_registers() {
    // Prints n, n-1, ..., 1.
    let source = "\
      in\n\
      pop rcx\n\
      loop:\n\
      push 0\n\
      push rcx\n\
      jbe done:   # rcx <= 0\n\
      push rcx\n\
      out\n\
      push 1\n\
      push rcx\n\
      sub\n\
      pop rcx\n\
      jmp loop:\n\
      done:\n\
      end\n";
    let (processor, result, output) = run(source, "3\n");
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(output, "3\n2\n1\n");
    assert_eq!(processor.register(Register::Rcx), 0.0);
  }

  #[test]
  fn faults_report_the_instruction() {
    let (_, result, output) = run("push 1\ndup\nout\npop rax\npop rbx\nend", "");
    let error = result.unwrap_err();
    assert_eq!(error.pc, 4);
    assert!(matches!(error.fault, Fault::Stack(_)));
    assert_eq!(output, "1\n");
  }

  // endregion

  // region Files

  #[test]
  fn output_path_appends_extension() {
    assert_eq!(default_output(Path::new("prog.asm")), PathBuf::from("prog.asm.out"));
    assert_eq!(default_output(Path::new("dir/code")), PathBuf::from("dir/code.out"));
  }

  #[test]
  fn files_round_trip_through_both_tools() {
    let source = scratch("round.asm");
    let code = scratch("round.code");
    let listing = scratch("round.listing");
    fs::write(&source, "push 3\npush 4\nmul\nout\nend\n").unwrap();

    let assembled = assemble_file(&source, &code).unwrap();
    assert_eq!(fs::read_to_string(&code).unwrap(), encode(&assembled));
    assert_eq!(load_file(&code).unwrap(), assembled);

    disassemble_file(&code, &listing).unwrap();
    assert_eq!(fs::read_to_string(&listing).unwrap(), "push 3\npush 4\nmul\nout\nend\n");

    for path in [&source, &code, &listing] {
      let _ = fs::remove_file(path);
    }
  }

  #[test]
  fn failed_assembly_writes_nothing() {
    let source = scratch("broken.asm");
    let code = scratch("broken.code");
    fs::write(&source, "push 1\njmp nowhere:\nend\n").unwrap();
    let _ = fs::remove_file(&code);

    let error = assemble_file(&source, &code).unwrap_err();
    assert!(matches!(error, Error::Assembly(AssemblyError::UnknownLabel { line: 2, .. })));
    assert_eq!(error.exit_code(Tool::Assembler), 3);
    assert!(!code.exists());

    let _ = fs::remove_file(&source);
  }

  #[test]
  fn missing_input_is_an_open_error() {
    let missing = scratch("does-not-exist");
    let error = load_file(&missing).unwrap_err();
    assert!(matches!(error, Error::Open { .. }));
    assert_eq!(error.exit_code(Tool::Processor), 1);
    assert_eq!(error.exit_code(Tool::Disassembler), 1);
  }

  #[test]
  fn corrupt_bytecode_is_rejected() {
    let code = scratch("corrupt.code");
    fs::write(&code, "3 1 1 5 99 0 \n").unwrap();

    let error = load_file(&code).unwrap_err();
    assert_eq!(error.kind(), Some(ErrorKind::FormatIntegrity));
    assert_eq!(error.exit_code(Tool::Processor), 2);
    assert_eq!(error.exit_code(Tool::Disassembler), 3);

    let _ = fs::remove_file(&code);
  }

  // endregion
}
