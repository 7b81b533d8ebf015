/*!
  The two-pass assembler from mnemonic source to a `Program`.

  The assembly pipeline is this:
  ```text
  text -> [`tokenize`] -> `Token`s ->⋯

  ⋯-> [`survey`] -> counts ->⋯                       (pass 1: validate and count)

  ⋯-> [`emit`, `Resolution::Tolerant`] -> labels ->⋯ (pass 2, first run: declare every label)

  ⋯-> [`emit`, `Resolution::Strict`] -> `Program`    (pass 2, second run: resolve every label)
  ```
  The source is tokenized once and every pass walks the same token slice from the start, so
  a jump may name a label declared further down without any backpatching. The first run of
  pass 2 tolerates references to labels it has not reached yet and records a placeholder for
  them; by the time it finishes, the label table holds every declaration in the unit, and the
  second run treats anything it still cannot resolve as an unknown label.

  Operand rules:

    push  <number> | <register>
    pop   <register>
    ja, jae, jb, jbe, je, jne, jmp  <address> | <label>:
    call  <address> | <label> | <label>:

  `call` does not require the label terminator that the jump family does.
*/

pub mod label;
pub mod lexer;

pub use label::{LabelTable, LABEL_TERMINATOR};
pub use lexer::{tokenize, Token};

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use string_cache::DefaultAtom;
use tracing::{debug, warn};

use crate::bytecode::text::parse_index;
use crate::bytecode::{
  parse_value, Address, Instruction, Mnemonic, Opcode, Operand, Program, Register, Value
};
use crate::error::AssemblyError;
use label::{is_label_name, terminated_label};

/// The address recorded for a label reference the first run of pass 2 cannot resolve yet.
pub const UNRESOLVED: Address = Address::MAX;

// region Statements

/// An operand as written in source, before labels are resolved.
#[derive(Clone, Debug, PartialEq)]
enum OperandSyntax {
  Immediate(Value),
  Register(Register),
  Address(Address),
  Label(DefaultAtom),
}

impl Display for OperandSyntax {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      OperandSyntax::Immediate(value)  => write!(f, "{}", value),
      OperandSyntax::Register(reg)     => write!(f, "{}", reg),
      OperandSyntax::Address(address)  => write!(f, "{}", address),
      OperandSyntax::Label(name)       => write!(f, "{}{}", name, LABEL_TERMINATOR),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
enum Statement {
  /// Names the next instruction. Does not occupy a slot in the program.
  Label(DefaultAtom),
  Instruction {
    mnemonic : Mnemonic,
    operand  : Option<OperandSyntax>
  },
}

/// Walks a token slice, grouping each mnemonic with its operand. Yields the statement and the
/// line it starts on.
struct Statements<'t> {
  tokens : &'t [Token],
  cursor : usize,
}

impl<'t> Statements<'t> {
  fn new(tokens: &'t [Token]) -> Self {
    Statements { tokens, cursor: 0 }
  }

  fn classify(&mut self, token: &'t Token) -> Result<Statement, AssemblyError> {
    let tokens = self.tokens;

    if let Ok(mnemonic) = Mnemonic::from_str(&token.text) {
      if !mnemonic.takes_operand() {
        return Ok(Statement::Instruction { mnemonic, operand: None });
      }

      let operand_token =
        tokens.get(self.cursor)
              .ok_or(AssemblyError::MissingOperand { line: token.line, mnemonic })?;
      self.cursor += 1;

      let operand = classify_operand(mnemonic, operand_token)?;
      return Ok(Statement::Instruction { mnemonic, operand: Some(operand) });
    }

    match terminated_label(&token.text) {
      Some(name) => Ok(Statement::Label(DefaultAtom::from(name))),
      None       => Err(AssemblyError::UnknownToken { line: token.line, token: token.text.clone() })
    }
  }
}

impl<'t> Iterator for Statements<'t> {
  type Item = Result<(Statement, usize), AssemblyError>;

  fn next(&mut self) -> Option<Self::Item> {
    let tokens = self.tokens;
    let token = tokens.get(self.cursor)?;
    self.cursor += 1;
    Some(self.classify(token).map(|statement| (statement, token.line)))
  }
}

/// Whether `text` is shaped like a register name: a letter followed by letters or digits.
fn is_register_name(text: &str) -> bool {
  let mut chars = text.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
    && chars.all(|c| c.is_ascii_alphanumeric())
}

fn classify_operand(mnemonic: Mnemonic, token: &Token) -> Result<OperandSyntax, AssemblyError> {
  let text = token.text.as_str();
  let line = token.line;
  let invalid = || AssemblyError::InvalidOperand { line, mnemonic, operand: text.to_string() };
  // A word that could name a register but does not is semantic; anything else is malformed.
  let register = || {
    match Register::from_str(text) {
      Ok(register)                     => Ok(OperandSyntax::Register(register)),
      Err(_) if is_register_name(text) => Err(AssemblyError::InvalidRegister { line, name: text.to_string() }),
      Err(_)                           => Err(invalid()),
    }
  };
  // Numeric jump targets must be instruction indices.
  let address = || -> Option<Result<OperandSyntax, AssemblyError>> {
    parse_value(text).map(|_| parse_index(text).map(OperandSyntax::Address).ok_or_else(invalid))
  };

  match mnemonic {

    Mnemonic::Push => match parse_value(text) {
      Some(value) => Ok(OperandSyntax::Immediate(value)),
      None        => register()
    },

    Mnemonic::Pop => match parse_value(text) {
      Some(_) => Err(invalid()),
      None    => register()
    },

    Mnemonic::Call => {
      if let Some(result) = address() {
        return result;
      }
      let name = text.strip_suffix(LABEL_TERMINATOR).unwrap_or(text);
      match is_label_name(name) {
        true  => Ok(OperandSyntax::Label(DefaultAtom::from(name))),
        false => Err(invalid())
      }
    }

    jump if jump.is_jump() => {
      if let Some(result) = address() {
        return result;
      }
      terminated_label(text)
        .map(|name| OperandSyntax::Label(DefaultAtom::from(name)))
        .ok_or_else(invalid)
    }

    _ => Err(invalid())
  }
}

// endregion

// region Passes

/// Totals gathered by pass 1.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Survey {
  pub instructions : usize,
  pub operands     : usize,
  pub labels       : usize,
}

/**
  Pass 1: validates every token and counts instructions, operand-bearing instructions, and
  label declarations. Stops at the first offending token.
*/
pub fn survey(tokens: &[Token]) -> Result<Survey, AssemblyError> {
  let mut survey = Survey::default();

  for statement in Statements::new(tokens) {
    match statement?.0 {

      Statement::Label(_) => {
        survey.labels += 1;
      }

      Statement::Instruction { operand, .. } => {
        survey.instructions += 1;
        if operand.is_some() {
          survey.operands += 1;
        }
      }

    }
  }

  Ok(survey)
}

/// How pass 2 treats a label reference it cannot find in the table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
  /// Record `UNRESOLVED` and declare every label met along the way.
  Tolerant,
  /// Fail with `AssemblyError::UnknownLabel`. Labels must already be declared.
  Strict,
}

/**
  Pass 2: emits one instruction per non-label statement. Label declarations record the index of
  the next instruction; in `Resolution::Tolerant` mode they are added to `labels`.

  `capacity` is the instruction count from pass 1.
*/
pub fn emit(
  tokens     : &[Token],
  labels     : &mut LabelTable,
  resolution : Resolution,
  capacity   : usize
) -> Result<Vec<Instruction>, AssemblyError> {
  let mut instructions: Vec<Instruction> = Vec::with_capacity(capacity);

  for statement in Statements::new(tokens) {
    let (statement, line) = statement?;
    match statement {

      Statement::Label(name) => {
        let address = instructions.len();
        match resolution {
          Resolution::Tolerant => {
            labels.declare(name, address).map_err(|(name, address)| {
              AssemblyError::DuplicateLabel { line, name: name.to_string(), address }
            })?;
          }
          Resolution::Strict => {
            debug_assert_eq!(labels.resolve(&name), Some(address));
          }
        }
      }

      Statement::Instruction { mnemonic, operand } => {
        let instruction = build_instruction(mnemonic, operand, labels, resolution, line)?;
        instructions.push(instruction);
      }

    }
  }

  Ok(instructions)
}

fn build_instruction(
  mnemonic   : Mnemonic,
  operand    : Option<OperandSyntax>,
  labels     : &LabelTable,
  resolution : Resolution,
  line       : usize
) -> Result<Instruction, AssemblyError> {
  let written = operand.as_ref().map(|o| o.to_string()).unwrap_or_default();

  let (opcode, operand) =
    match operand {
      None => (mnemonic.opcode(), Operand::None),

      Some(OperandSyntax::Immediate(value)) => (mnemonic.opcode(), Operand::Immediate(value)),

      Some(OperandSyntax::Register(register)) => {
        let opcode = match mnemonic {
          Mnemonic::Push => Opcode::PushRegister,
          _              => mnemonic.opcode()
        };
        (opcode, Operand::Register(register.id()))
      }

      Some(OperandSyntax::Address(address)) => (mnemonic.opcode(), Operand::Address(address)),

      Some(OperandSyntax::Label(name)) => {
        let address =
          match (labels.resolve(&name), resolution) {
            (Some(address), _)          => address,
            (None, Resolution::Tolerant) => UNRESOLVED,
            (None, Resolution::Strict)   => {
              return Err(AssemblyError::UnknownLabel { line, name: name.to_string() });
            }
          };
        (mnemonic.opcode(), Operand::Address(address))
      }
    };

  Instruction::from_parts(opcode, operand)
    .ok_or(AssemblyError::InvalidOperand { line, mnemonic, operand: written })
}

// endregion

/// Assembles `source` into a `Program`. On error nothing is produced.
pub fn assemble(source: &str) -> Result<Program, AssemblyError> {
  let tokens = tokenize(source);

  let survey = survey(&tokens)?;
  debug!(
    instructions = survey.instructions,
    operands     = survey.operands,
    labels       = survey.labels,
    "pass 1 complete"
  );

  let mut labels = LabelTable::with_capacity(survey.labels);
  emit(&tokens, &mut labels, Resolution::Tolerant, survey.instructions)?;
  debug!(labels = labels.len(), "labels declared");

  let instructions = emit(&tokens, &mut labels, Resolution::Strict, survey.instructions)?;
  debug_assert_eq!(instructions.len(), survey.instructions);

  let program = Program::new(instructions);
  if !program.is_terminated() {
    warn!("program does not end with `end`; execution will run past its last instruction");
  }

  Ok(program)
}
