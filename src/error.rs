/*!
  Error types shared by the assembler, the bytecode reader, and the processor.

  Each tool reports failures as one of four kinds: lexical and semantic problems in assembly
  source, format-integrity problems in bytecode, and faults raised while executing a program.
  The binaries turn an [`Error`] into a process exit code with [`Error::exit_code`]; those codes
  are part of the tools' contract and must stay stable.
*/

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bytecode::{Address, Mnemonic, Opcode, RegisterId};

/// The broad category of a failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
  /// Unknown token or malformed operand in assembly source.
  Lexical,
  /// Well-formed source that does not make sense: unknown label, bad register name.
  Semantic,
  /// Bytecode that fails its own integrity check.
  FormatIntegrity,
  /// A fault raised during execution.
  Runtime,
}

// region Assembly errors

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum AssemblyError {
  #[error("line {line}: incorrect command `{token}`")]
  UnknownToken { line: usize, token: String },

  #[error("line {line}: `{mnemonic}` requires an operand")]
  MissingOperand { line: usize, mnemonic: Mnemonic },

  #[error("line {line}: incorrect argument for `{mnemonic}`: `{operand}`")]
  InvalidOperand { line: usize, mnemonic: Mnemonic, operand: String },

  #[error("line {line}: `{name}` is not a register")]
  InvalidRegister { line: usize, name: String },

  #[error("line {line}: unknown label `{name}`")]
  UnknownLabel { line: usize, name: String },

  #[error("line {line}: label `{name}` already declared for instruction {address}")]
  DuplicateLabel { line: usize, name: String, address: Address },
}

impl AssemblyError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      | AssemblyError::UnknownToken { .. }
      | AssemblyError::MissingOperand { .. }
      | AssemblyError::InvalidOperand { .. } => ErrorKind::Lexical,

      | AssemblyError::InvalidRegister { .. }
      | AssemblyError::UnknownLabel { .. }
      | AssemblyError::DuplicateLabel { .. } => ErrorKind::Semantic,
    }
  }

  /// The 1-based source line of the offending token.
  pub fn line(&self) -> usize {
    match self {
      | AssemblyError::UnknownToken { line, .. }
      | AssemblyError::MissingOperand { line, .. }
      | AssemblyError::InvalidOperand { line, .. }
      | AssemblyError::InvalidRegister { line, .. }
      | AssemblyError::UnknownLabel { line, .. }
      | AssemblyError::DuplicateLabel { line, .. } => *line,
    }
  }
}

// endregion

// region Bytecode errors

/// Every bytecode error means the same thing to a user: the file is corrupt.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum BytecodeError {
  #[error("program file corrupt: missing or malformed {field} in header")]
  InvalidHeader { field: &'static str },

  #[error("program file corrupt: instruction {position}: unknown opcode `{field}`")]
  UnknownOpcode { position: usize, field: String },

  #[error("program file corrupt: instruction {position}: `{opcode}` is missing its operand")]
  MissingOperand { position: usize, opcode: Opcode },

  #[error("program file corrupt: instruction {position}: invalid operand `{field}` for `{opcode}`")]
  InvalidOperand { position: usize, opcode: Opcode, field: String },

  #[error("program file corrupt: instruction {position}: unknown register id {id}")]
  InvalidRegister { position: usize, id: RegisterId },

  #[error(
    "program file corrupt: header declares {declared_instructions} instructions and \
     {declared_operands} operands, found {found_instructions} and {found_operands}"
  )]
  CountMismatch {
    declared_instructions : usize,
    declared_operands     : usize,
    found_instructions    : usize,
    found_operands        : usize,
  },
}

// endregion

// region Runtime errors

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum StackError {
  #[error("{stack} overflow (capacity {capacity})")]
  Overflow { stack: &'static str, capacity: usize },

  #[error("{stack} underflow")]
  Underflow { stack: &'static str },
}

/// What went wrong while executing one instruction.
#[derive(Debug, Error)]
pub enum Fault {
  #[error(transparent)]
  Stack(#[from] StackError),

  #[error("division by zero")]
  DivisionByZero,

  #[error("jump target {target} is outside the program (length {length})")]
  InvalidTarget { target: Address, length: usize },

  #[error("unknown register id {0}")]
  InvalidRegister(RegisterId),

  #[error("program counter is outside the program (length {length})")]
  ProgramCounterOutOfRange { length: usize },

  #[error("step limit of {0} instructions exceeded")]
  StepLimitExceeded(u64),

  #[error("input exhausted")]
  InputExhausted,

  #[error("input `{0}` is not a number")]
  InvalidInput(String),

  #[error("failed to read input: {0}")]
  Input(#[source] io::Error),

  #[error("failed to write output: {0}")]
  Output(#[source] io::Error),
}

/// A fault together with the program counter of the instruction that raised it.
#[derive(Debug, Error)]
#[error("runtime error at instruction {pc}: {fault}")]
pub struct RuntimeError {
  pub pc    : Address,
  #[source]
  pub fault : Fault,
}

// endregion

// region Tool errors

/// The three command line tools. Each maps errors onto its own exit codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Tool {
  Assembler,
  Disassembler,
  Processor,
}

/// Everything that can end a tool run.
#[derive(Debug, Error)]
pub enum Error {
  #[error("error opening file {}: {source}", path.display())]
  Open { path: PathBuf, #[source] source: io::Error },

  #[error(transparent)]
  Assembly(#[from] AssemblyError),

  #[error(transparent)]
  Bytecode(#[from] BytecodeError),

  #[error(transparent)]
  Runtime(#[from] RuntimeError),

  #[error("error writing to {}: {source}", path.display())]
  Write { path: PathBuf, #[source] source: io::Error },
}

impl Error {
  pub fn kind(&self) -> Option<ErrorKind> {
    match self {
      Error::Assembly(e) => Some(e.kind()),
      Error::Bytecode(_) => Some(ErrorKind::FormatIntegrity),
      Error::Runtime(_)  => Some(ErrorKind::Runtime),
      | Error::Open { .. }
      | Error::Write { .. } => None,
    }
  }

  /**
    The process exit code for this error when raised by `tool`.

      assembler:     open 1, lexical 2, semantic 3, write 4
      disassembler:  open 1, write 2, corrupt 3
      processor:     open 1, corrupt 2, runtime 3
  */
  pub fn exit_code(&self, tool: Tool) -> u8 {
    match tool {

      Tool::Assembler => match self {
        Error::Open { .. }  => 1,
        Error::Assembly(e)  => match e.kind() {
          ErrorKind::Lexical => 2,
          _                  => 3,
        },
        Error::Write { .. } => 4,
        | Error::Bytecode(_)
        | Error::Runtime(_) => 3,
      },

      Tool::Disassembler => match self {
        Error::Open { .. }  => 1,
        Error::Write { .. } => 2,
        | Error::Bytecode(_)
        | Error::Assembly(_)
        | Error::Runtime(_) => 3,
      },

      Tool::Processor => match self {
        Error::Open { .. }  => 1,
        Error::Bytecode(_)  => 2,
        | Error::Runtime(_)
        | Error::Assembly(_)
        | Error::Write { .. } => 3,
      },

    }
  }
}

// endregion
