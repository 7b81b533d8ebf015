/*!
  Renders a `Program` back into assembly source, one instruction per line.

  Label names do not survive assembly, so jump and call targets come out as numeric
  addresses. Assembling the output yields the same program.
*/

use crate::bytecode::{Operand, Program, Register};
use crate::error::BytecodeError;

/// Disassembles `program`. A register id that names no register cannot be written as source
/// and is reported as corruption.
pub fn disassemble(program: &Program) -> Result<String, BytecodeError> {
  let mut source = String::new();

  for (position, instruction) in program.instructions().iter().enumerate() {
    if let Operand::Register(id) = instruction.operand() {
      if Register::from_id(id).is_none() {
        return Err(BytecodeError::InvalidRegister { position, id });
      }
    }
    source.push_str(&instruction.to_string());
    source.push('\n');
  }

  Ok(source)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assembler::assemble;
  use crate::bytecode::{decode, encode, Instruction};

  fn normalize(source: &str) -> String {
    source.split_whitespace().collect::<Vec<&str>>().join(" ")
  }

  #[test]
  fn numeric_targets_survive_a_round_trip() {
    let source = "in\npop rax\npush rax\npush 0\nje 9\npush rax\n  push -0.5  \nmul\nout\n\
                  call 11\nend\npush 2\npow\nret\n";
    let program = assemble(source).unwrap();
    let text = disassemble(&decode(&encode(&program)).unwrap()).unwrap();
    assert_eq!(normalize(&text), normalize(source));
  }

  #[test]
  fn labels_become_addresses() {
    let program = assemble("loop:\npush 1\nout\njmp loop:\ncall sub\nsub:\nret").unwrap();
    assert_eq!(
      disassemble(&program).unwrap(),
      "push 1\nout\njmp 0\ncall 4\nret\n"
    );
  }

  #[test]
  fn unknown_register_ids_are_corrupt() {
    let program = Program::new(vec![Instruction::Push(1.0), Instruction::Pop(6), Instruction::End]);
    assert_eq!(
      disassemble(&program),
      Err(BytecodeError::InvalidRegister { position: 1, id: 6 })
    );
  }
}
