/*!
  Bytecode is stored as human-readable text: a header of two integers (the instruction count and
  the number of operand-bearing instructions) followed by a flat, whitespace-delimited stream of
  opcode numbers, each followed by its operand when the opcode carries one.

    ```text
    5 2 1 3 1 4 13 20 0
    ```

  The header is the format's only self-check. `decode` recounts both numbers while reading and
  rejects the file as corrupt if either disagrees with the header.
*/

use nom::{
  branch::alt,
  bytes::complete::take_till1,
  character::complete::{char as one_char, digit0, digit1, multispace0, one_of},
  combinator::{all_consuming, opt, recognize},
  sequence::{pair, preceded, tuple},
  IResult,
};
use tracing::debug;

use super::{Address, Instruction, Opcode, Operand, OperandKind, Program, RegisterId, Value};
use crate::error::BytecodeError;

// region Number grammar

/// Recognizes a decimal number: an optional sign, then `digits[.digits]` or `.digits`.
fn decimal(input: &str) -> IResult<&str, &str> {
  recognize(
    tuple((
      opt(one_of("+-")),
      alt((
        recognize(pair(digit1, opt(pair(one_char('.'), digit0)))),
        recognize(pair(one_char('.'), digit1)),
      ))
    ))
  )(input)
}

/// Parses `text` as a decimal number if the whole of it is one.
pub fn parse_value(text: &str) -> Option<Value> {
  match all_consuming(decimal)(text) {
    Ok((_, number)) => number.parse::<Value>().ok(),
    Err(_)          => None
  }
}

/// Parses `text` as an unsigned integer if the whole of it is one.
pub(crate) fn parse_index(text: &str) -> Option<usize> {
  let result: IResult<&str, &str> = all_consuming(digit1)(text);
  match result {
    Ok((_, digits)) => digits.parse::<usize>().ok(),
    Err(_)          => None
  }
}

// endregion

// region Encoding

/// Serializes `program` as bytecode text, on one line.
pub fn encode(program: &Program) -> String {
  let mut text = format!("{} {} ", program.instruction_count(), program.operand_count());

  for instruction in program.instructions() {
    text.push_str(&format!("{} ", instruction.opcode().code()));
    match instruction.operand() {
      Operand::None               => {}
      Operand::Immediate(value)   => text.push_str(&format!("{} ", value)),
      Operand::Register(id)       => text.push_str(&format!("{} ", id)),
      Operand::Address(address)   => text.push_str(&format!("{} ", address)),
    }
  }
  text.push('\n');

  text
}

// endregion

// region Decoding

/// A cursor over the whitespace-delimited fields of bytecode text.
struct Fields<'a> {
  rest: &'a str,
}

impl<'a> Fields<'a> {
  fn new(text: &'a str) -> Self {
    Fields { rest: text }
  }

  fn next_field(&mut self) -> Option<&'a str> {
    let result: IResult<&str, &str> =
      preceded(multispace0, take_till1(|c: char| c.is_whitespace()))(self.rest);
    match result {
      Ok((rest, field)) => {
        self.rest = rest;
        Some(field)
      }
      Err(_) => None
    }
  }
}

fn read_operand(
  fields   : &mut Fields,
  opcode   : Opcode,
  position : usize
) -> Result<Operand, BytecodeError> {
  let kind = opcode.operand_kind();
  if kind == OperandKind::None {
    return Ok(Operand::None);
  }

  let field =
    fields.next_field()
          .ok_or(BytecodeError::MissingOperand { position, opcode })?;
  let invalid = || BytecodeError::InvalidOperand { position, opcode, field: field.to_string() };

  match kind {
    OperandKind::Immediate => {
      parse_value(field).map(Operand::Immediate).ok_or_else(invalid)
    }
    OperandKind::Register => {
      parse_index(field)
        .and_then(|id| RegisterId::try_from(id).ok())
        .map(Operand::Register)
        .ok_or_else(invalid)
    }
    OperandKind::Address => {
      parse_index(field).map(|a: Address| Operand::Address(a)).ok_or_else(invalid)
    }
    OperandKind::None => Ok(Operand::None),
  }
}

/**
  Reads bytecode text into a `Program`, verifying the header counts.

  A register id only has to fit in a byte and an address is not range-checked here; the
  processor faults on either if it is ever executed.
*/
pub fn decode(text: &str) -> Result<Program, BytecodeError> {
  let mut fields = Fields::new(text);

  let declared_instructions =
    fields.next_field()
          .and_then(parse_index)
          .ok_or(BytecodeError::InvalidHeader { field: "instruction count" })?;
  let declared_operands =
    fields.next_field()
          .and_then(parse_index)
          .ok_or(BytecodeError::InvalidHeader { field: "operand count" })?;

  // The header is untrusted; never let it size a huge allocation.
  let mut instructions: Vec<Instruction> =
    Vec::with_capacity(declared_instructions.min(text.len()));
  let mut operands = 0usize;

  while let Some(field) = fields.next_field() {
    let position = instructions.len();
    let opcode =
      parse_index(field)
        .and_then(|code| u8::try_from(code).ok())
        .and_then(|code| Opcode::try_from(code).ok())
        .ok_or_else(|| BytecodeError::UnknownOpcode { position, field: field.to_string() })?;

    let operand = read_operand(&mut fields, opcode, position)?;
    if opcode.has_operand() {
      operands += 1;
    }

    match Instruction::from_parts(opcode, operand) {
      Some(instruction) => instructions.push(instruction),
      None => {
        return Err(BytecodeError::InvalidOperand { position, opcode, field: field.to_string() });
      }
    }
  }

  if instructions.len() != declared_instructions || operands != declared_operands {
    return Err(BytecodeError::CountMismatch {
      declared_instructions,
      declared_operands,
      found_instructions : instructions.len(),
      found_operands     : operands,
    });
  }

  debug!(instructions = instructions.len(), operands, "decoded bytecode");
  Ok(Program::new(instructions))
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Program {
    Program::new(vec![
      Instruction::Push(3.0),
      Instruction::Push(-0.5),
      Instruction::Add,
      Instruction::Pop(2),
      Instruction::PushRegister(2),
      Instruction::Jne(0),
      Instruction::Call(7),
      Instruction::Out,
      Instruction::End,
    ])
  }

  #[test]
  fn decimal_grammar() {
    assert_eq!(parse_value("3"), Some(3.0));
    assert_eq!(parse_value("-12.25"), Some(-12.25));
    assert_eq!(parse_value("+.5"), Some(0.5));
    assert_eq!(parse_value("4."), Some(4.0));
    assert_eq!(parse_value("1e5"), None);
    assert_eq!(parse_value("inf"), None);
    assert_eq!(parse_value("rax"), None);
    assert_eq!(parse_value("-"), None);
    assert_eq!(parse_index("12"), Some(12));
    assert_eq!(parse_index("1.0"), None);
    assert_eq!(parse_index("-1"), None);
  }

  #[test]
  fn encode_writes_header_then_stream() {
    let program = Program::new(vec![
      Instruction::Push(3.0),
      Instruction::Push(4.0),
      Instruction::Add,
      Instruction::Out,
      Instruction::End,
    ]);
    assert_eq!(encode(&program), "5 2 1 3 1 4 13 20 0 \n");
  }

  #[test]
  fn decode_reads_what_encode_writes() {
    let program = sample();
    let decoded = decode(&encode(&program)).unwrap();
    assert_eq!(decoded, program);
    assert_eq!(decoded.instruction_count(), 9);
    assert_eq!(decoded.operand_count(), 6);
  }

  #[test]
  fn decode_accepts_any_whitespace() {
    let program = decode("3 1\n  1 2.5\n\t20\r\n0").unwrap();
    assert_eq!(
      program.instructions(),
      &[Instruction::Push(2.5), Instruction::Out, Instruction::End]
    );
  }

  #[test]
  fn header_mismatch_is_corrupt() {
    assert_eq!(
      decode("4 1 1 3 20 0"),
      Err(BytecodeError::CountMismatch {
        declared_instructions : 4,
        declared_operands     : 1,
        found_instructions    : 3,
        found_operands        : 1,
      })
    );
    assert!(matches!(decode("3 0 1 3 20 0"), Err(BytecodeError::CountMismatch { .. })));
  }

  #[test]
  fn malformed_streams_are_rejected() {
    assert_eq!(decode(""), Err(BytecodeError::InvalidHeader { field: "instruction count" }));
    assert_eq!(decode("2"), Err(BytecodeError::InvalidHeader { field: "operand count" }));
    assert_eq!(
      decode("1 0 22"),
      Err(BytecodeError::UnknownOpcode { position: 0, field: "22".to_string() })
    );
    assert_eq!(
      decode("1 1 10"),
      Err(BytecodeError::MissingOperand { position: 0, opcode: Opcode::Jmp })
    );
    assert_eq!(
      decode("2 1 3 1.5 0"),
      Err(BytecodeError::InvalidOperand {
        position : 0,
        opcode   : Opcode::Pop,
        field    : "1.5".to_string()
      })
    );
  }

  #[test]
  fn out_of_range_operands_decode() {
    let program = decode("3 2 2 9 10 100 0").unwrap();
    assert_eq!(
      program.instructions(),
      &[Instruction::PushRegister(9), Instruction::Jmp(100), Instruction::End]
    );
  }

  #[test]
  fn register_ids_must_fit_a_byte() {
    assert_eq!(decode("2 1 3 255 0").unwrap().instructions()[0], Instruction::Pop(255));
    assert_eq!(
      decode("2 1 3 256 0"),
      Err(BytecodeError::InvalidOperand {
        position : 0,
        opcode   : Opcode::Pop,
        field    : "256".to_string()
      })
    );
  }

  #[test]
  fn empty_program_decodes() {
    assert_eq!(decode("0 0 \n"), Ok(Program::default()));
  }
}
