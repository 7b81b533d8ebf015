/*!

  The instruction set shared by the assembler, the disassembler, and the processor.

  Three enums describe the machine vocabulary:

    `Mnemonic`:  the 21 words that may begin an instruction in assembly source.
    `Opcode`:    the 22 numeric tags written to bytecode. `push` has two opcodes, one for an
                 immediate operand and one for a register operand.
    `Register`:  the four registers `rax`, `rbx`, `rcx`, `rdx`.

  An `Instruction` is a closed enum with one variant per opcode, carrying its operand in the
  variant. Operands are one of three kinds: an immediate `Value`, a `RegisterId`, or an
  instruction `Address`. Register ids and addresses are kept raw (not validated against the
  register file or the program length) because bytecode is allowed to contain them; the
  processor faults when it executes one that is out of range.

  The numeric values of `Opcode` and `Register` are part of the bytecode format. Do not reorder.

*/

pub mod text;

pub use text::{decode, encode, parse_value};

use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

/// Numeric values the machine computes with.
pub type Value = f64;
/// An index into a `Program`, not a byte offset.
pub type Address = usize;
/// A raw register number as stored in bytecode.
pub type RegisterId = u8;

pub const REGISTER_COUNT: usize = 4;

// region Opcode

#[derive(
StrumDisplay, TryFromPrimitive, IntoPrimitive, EnumIter, Clone,
Copy,         Eq,               PartialEq,     Debug,    Hash
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Opcode {
  End          =  0,
  Push         =  1,
  PushRegister =  2,
  Pop          =  3,
  Ja           =  4,
  Jae          =  5,
  Jb           =  6,
  Jbe          =  7,
  Je           =  8,
  Jne          =  9,
  Jmp          = 10,
  Call         = 11,
  Ret          = 12,
  Add          = 13,
  Sub          = 14,
  Mul          = 15,
  Div          = 16,
  Pow          = 17,
  Dup          = 18,
  In           = 19,
  Out          = 20,
  Nop          = 21,
}

/// The interpretation of the number that follows an opcode in bytecode, if any.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OperandKind {
  None,
  Immediate,
  Register,
  Address,
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn operand_kind(&self) -> OperandKind {
    match self {
      Opcode::Push => OperandKind::Immediate,

      | Opcode::PushRegister
      | Opcode::Pop => OperandKind::Register,

      | Opcode::Ja
      | Opcode::Jae
      | Opcode::Jb
      | Opcode::Jbe
      | Opcode::Je
      | Opcode::Jne
      | Opcode::Jmp
      | Opcode::Call => OperandKind::Address,

      | Opcode::End
      | Opcode::Ret
      | Opcode::Add
      | Opcode::Sub
      | Opcode::Mul
      | Opcode::Div
      | Opcode::Pow
      | Opcode::Dup
      | Opcode::In
      | Opcode::Out
      | Opcode::Nop => OperandKind::None,
    }
  }

  pub fn has_operand(&self) -> bool {
    self.operand_kind() != OperandKind::None
  }

  /// The source spelling of this opcode.
  pub fn mnemonic(&self) -> Mnemonic {
    match self {
      Opcode::End          => Mnemonic::End,
      | Opcode::Push
      | Opcode::PushRegister => Mnemonic::Push,
      Opcode::Pop          => Mnemonic::Pop,
      Opcode::Ja           => Mnemonic::Ja,
      Opcode::Jae          => Mnemonic::Jae,
      Opcode::Jb           => Mnemonic::Jb,
      Opcode::Jbe          => Mnemonic::Jbe,
      Opcode::Je           => Mnemonic::Je,
      Opcode::Jne          => Mnemonic::Jne,
      Opcode::Jmp          => Mnemonic::Jmp,
      Opcode::Call         => Mnemonic::Call,
      Opcode::Ret          => Mnemonic::Ret,
      Opcode::Add          => Mnemonic::Add,
      Opcode::Sub          => Mnemonic::Sub,
      Opcode::Mul          => Mnemonic::Mul,
      Opcode::Div          => Mnemonic::Div,
      Opcode::Pow          => Mnemonic::Pow,
      Opcode::Dup          => Mnemonic::Dup,
      Opcode::In           => Mnemonic::In,
      Opcode::Out          => Mnemonic::Out,
      Opcode::Nop          => Mnemonic::Nop,
    }
  }
}

// endregion

// region Mnemonic

/// The words that begin an instruction in assembly source. Parsing is case-insensitive.
#[derive(
StrumDisplay, EnumString, EnumIter, Clone, Copy,
Eq,           PartialEq,  Debug,    Hash
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mnemonic {
  End,
  Push,
  Pop,
  Ja,
  Jae,
  Jb,
  Jbe,
  Je,
  Jne,
  Jmp,
  Call,
  Ret,
  Add,
  Sub,
  Mul,
  Div,
  Pow,
  Dup,
  In,
  Out,
  Nop,
}

impl Mnemonic {
  /// The opcode emitted for this mnemonic. For `push` this is the immediate form; the
  /// assembler switches to `Opcode::PushRegister` when the operand names a register.
  pub fn opcode(&self) -> Opcode {
    match self {
      Mnemonic::End  => Opcode::End,
      Mnemonic::Push => Opcode::Push,
      Mnemonic::Pop  => Opcode::Pop,
      Mnemonic::Ja   => Opcode::Ja,
      Mnemonic::Jae  => Opcode::Jae,
      Mnemonic::Jb   => Opcode::Jb,
      Mnemonic::Jbe  => Opcode::Jbe,
      Mnemonic::Je   => Opcode::Je,
      Mnemonic::Jne  => Opcode::Jne,
      Mnemonic::Jmp  => Opcode::Jmp,
      Mnemonic::Call => Opcode::Call,
      Mnemonic::Ret  => Opcode::Ret,
      Mnemonic::Add  => Opcode::Add,
      Mnemonic::Sub  => Opcode::Sub,
      Mnemonic::Mul  => Opcode::Mul,
      Mnemonic::Div  => Opcode::Div,
      Mnemonic::Pow  => Opcode::Pow,
      Mnemonic::Dup  => Opcode::Dup,
      Mnemonic::In   => Opcode::In,
      Mnemonic::Out  => Opcode::Out,
      Mnemonic::Nop  => Opcode::Nop,
    }
  }

  pub fn takes_operand(&self) -> bool {
    self.opcode().has_operand()
  }

  /// `ja`, `jae`, `jb`, `jbe`, `je`, `jne`, and `jmp`.
  pub fn is_jump(&self) -> bool {
    match self {
      | Mnemonic::Ja
      | Mnemonic::Jae
      | Mnemonic::Jb
      | Mnemonic::Jbe
      | Mnemonic::Je
      | Mnemonic::Jne
      | Mnemonic::Jmp => true,
      _ => false
    }
  }
}

// endregion

// region Register

#[derive(
StrumDisplay, EnumString, EnumIter,  TryFromPrimitive, IntoPrimitive,
Clone,        Copy,       Eq,        PartialEq,        Debug,         Hash
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum Register {
  Rax = 0,
  Rbx = 1,
  Rcx = 2,
  Rdx = 3,
}

impl Register {
  pub fn id(&self) -> RegisterId {
    Into::<u8>::into(*self)
  }

  /// The register with the given bytecode id, if there is one.
  pub fn from_id(id: RegisterId) -> Option<Register> {
    Register::try_from(id).ok()
  }
}

// endregion

// region Instruction

/// An operand detached from its opcode, as it travels between text and `Instruction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
  None,
  Immediate(Value),
  Register(RegisterId),
  Address(Address),
}

/// One machine instruction. The operand, where there is one, lives in the variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Instruction {
  End,
  Push(Value),
  PushRegister(RegisterId),
  Pop(RegisterId),
  Ja(Address),
  Jae(Address),
  Jb(Address),
  Jbe(Address),
  Je(Address),
  Jne(Address),
  Jmp(Address),
  Call(Address),
  Ret,
  Add,
  Sub,
  Mul,
  Div,
  Pow,
  Dup,
  In,
  Out,
  Nop,
}

impl Instruction {

  /**
    Builds an instruction from an opcode and an operand. Returns `None` if the operand kind
    does not match `opcode.operand_kind()`.
  */
  pub fn from_parts(opcode: Opcode, operand: Operand) -> Option<Instruction> {
    let instruction =
      match (opcode, operand) {
        (Opcode::End,          Operand::None)          => Instruction::End,
        (Opcode::Push,         Operand::Immediate(v))  => Instruction::Push(v),
        (Opcode::PushRegister, Operand::Register(r))   => Instruction::PushRegister(r),
        (Opcode::Pop,          Operand::Register(r))   => Instruction::Pop(r),
        (Opcode::Ja,           Operand::Address(a))    => Instruction::Ja(a),
        (Opcode::Jae,          Operand::Address(a))    => Instruction::Jae(a),
        (Opcode::Jb,           Operand::Address(a))    => Instruction::Jb(a),
        (Opcode::Jbe,          Operand::Address(a))    => Instruction::Jbe(a),
        (Opcode::Je,           Operand::Address(a))    => Instruction::Je(a),
        (Opcode::Jne,          Operand::Address(a))    => Instruction::Jne(a),
        (Opcode::Jmp,          Operand::Address(a))    => Instruction::Jmp(a),
        (Opcode::Call,         Operand::Address(a))    => Instruction::Call(a),
        (Opcode::Ret,          Operand::None)          => Instruction::Ret,
        (Opcode::Add,          Operand::None)          => Instruction::Add,
        (Opcode::Sub,          Operand::None)          => Instruction::Sub,
        (Opcode::Mul,          Operand::None)          => Instruction::Mul,
        (Opcode::Div,          Operand::None)          => Instruction::Div,
        (Opcode::Pow,          Operand::None)          => Instruction::Pow,
        (Opcode::Dup,          Operand::None)          => Instruction::Dup,
        (Opcode::In,           Operand::None)          => Instruction::In,
        (Opcode::Out,          Operand::None)          => Instruction::Out,
        (Opcode::Nop,          Operand::None)          => Instruction::Nop,
        _                                              => return None,
      };
    Some(instruction)
  }

  pub fn opcode(&self) -> Opcode {
    match self {
      Instruction::End             => Opcode::End,
      Instruction::Push(_)         => Opcode::Push,
      Instruction::PushRegister(_) => Opcode::PushRegister,
      Instruction::Pop(_)          => Opcode::Pop,
      Instruction::Ja(_)           => Opcode::Ja,
      Instruction::Jae(_)          => Opcode::Jae,
      Instruction::Jb(_)           => Opcode::Jb,
      Instruction::Jbe(_)          => Opcode::Jbe,
      Instruction::Je(_)           => Opcode::Je,
      Instruction::Jne(_)          => Opcode::Jne,
      Instruction::Jmp(_)          => Opcode::Jmp,
      Instruction::Call(_)         => Opcode::Call,
      Instruction::Ret             => Opcode::Ret,
      Instruction::Add             => Opcode::Add,
      Instruction::Sub             => Opcode::Sub,
      Instruction::Mul             => Opcode::Mul,
      Instruction::Div             => Opcode::Div,
      Instruction::Pow             => Opcode::Pow,
      Instruction::Dup             => Opcode::Dup,
      Instruction::In              => Opcode::In,
      Instruction::Out             => Opcode::Out,
      Instruction::Nop             => Opcode::Nop,
    }
  }

  pub fn operand(&self) -> Operand {
    match *self {
      Instruction::Push(value) => Operand::Immediate(value),

      | Instruction::PushRegister(id)
      | Instruction::Pop(id) => Operand::Register(id),

      | Instruction::Ja(address)
      | Instruction::Jae(address)
      | Instruction::Jb(address)
      | Instruction::Jbe(address)
      | Instruction::Je(address)
      | Instruction::Jne(address)
      | Instruction::Jmp(address)
      | Instruction::Call(address) => Operand::Address(address),

      _ => Operand::None
    }
  }
}

/// Renders the instruction as assembly source, with numeric addresses in place of labels.
/// Register ids that name no register are shown as `r<id>`.
impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mnemonic = self.opcode().mnemonic();
    match self.operand() {

      Operand::None => {
        write!(f, "{}", mnemonic)
      }

      Operand::Immediate(value) => {
        write!(f, "{} {}", mnemonic, value)
      }

      Operand::Register(id) => {
        match Register::from_id(id) {
          Some(register) => write!(f, "{} {}", mnemonic, register),
          None           => write!(f, "{} r{}", mnemonic, id),
        }
      }

      Operand::Address(address) => {
        write!(f, "{} {}", mnemonic, address)
      }

    }
  }
}

// endregion

// region Program

/**
  An ordered, immutable sequence of instructions. The two counts carried in the bytecode header
  are derived from the instructions, so they cannot disagree with them.
*/
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
  instructions: Vec<Instruction>,
}

impl Program {
  pub fn new(instructions: Vec<Instruction>) -> Program {
    Program { instructions }
  }

  pub fn instructions(&self) -> &[Instruction] {
    &self.instructions
  }

  pub fn get(&self, address: Address) -> Option<&Instruction> {
    self.instructions.get(address)
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  /// Total instruction count, the first header integer.
  pub fn instruction_count(&self) -> usize {
    self.instructions.len()
  }

  /// Number of instructions whose opcode carries an operand, the second header integer.
  pub fn operand_count(&self) -> usize {
    self.instructions
        .iter()
        .filter(|i| i.opcode().has_operand())
        .count()
  }

  /// Whether the last instruction is `end`.
  pub fn is_terminated(&self) -> bool {
    self.instructions.last() == Some(&Instruction::End)
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;
  use std::str::FromStr;
  use strum::IntoEnumIterator;

  #[test]
  fn opcode_numbers_are_stable() {
    assert_eq!(Opcode::End.code(), 0);
    assert_eq!(Opcode::PushRegister.code(), 2);
    assert_eq!(Opcode::Call.code(), 11);
    assert_eq!(Opcode::Nop.code(), 21);
    assert_eq!(Opcode::try_from(19u8).ok(), Some(Opcode::In));
    assert!(Opcode::try_from(22u8).is_err());
    assert_eq!(Opcode::iter().count(), 22);
  }

  #[test]
  fn every_opcode_maps_back_through_its_mnemonic() {
    for opcode in Opcode::iter() {
      let mnemonic = opcode.mnemonic();
      match opcode {
        Opcode::PushRegister => assert_eq!(mnemonic.opcode(), Opcode::Push),
        _                    => assert_eq!(mnemonic.opcode(), opcode),
      }
    }
    assert_eq!(Mnemonic::iter().count(), 21);
  }

  #[test]
  fn mnemonics_and_registers_parse_case_insensitively() {
    assert_eq!(Mnemonic::from_str("PUSH"), Ok(Mnemonic::Push));
    assert_eq!(Mnemonic::from_str("Jae"), Ok(Mnemonic::Jae));
    assert!(Mnemonic::from_str("push_register").is_err());
    assert_eq!(Register::from_str("RCX"), Ok(Register::Rcx));
    assert_eq!(Register::Rdx.id(), 3);
    assert_eq!(Register::from_id(1), Some(Register::Rbx));
    assert_eq!(Register::from_id(4), None);
  }

  #[test]
  fn operand_kinds() {
    assert_eq!(Opcode::Push.operand_kind(), OperandKind::Immediate);
    assert_eq!(Opcode::Pop.operand_kind(), OperandKind::Register);
    assert_eq!(Opcode::Call.operand_kind(), OperandKind::Address);
    assert_eq!(Opcode::Ret.operand_kind(), OperandKind::None);
    assert!(Mnemonic::Jne.is_jump());
    assert!(!Mnemonic::Call.is_jump());
    assert!(Mnemonic::Call.takes_operand());
    assert!(!Mnemonic::Dup.takes_operand());
  }

  #[test]
  fn from_parts_rejects_mismatched_operands() {
    assert_eq!(
      Instruction::from_parts(Opcode::Jmp, Operand::Address(4)),
      Some(Instruction::Jmp(4))
    );
    assert_eq!(Instruction::from_parts(Opcode::Jmp, Operand::Immediate(4.0)), None);
    assert_eq!(Instruction::from_parts(Opcode::Add, Operand::Register(0)), None);
    assert_eq!(Instruction::from_parts(Opcode::Push, Operand::None), None);
  }

  #[test]
  fn instructions_display_as_source() {
    assert_eq!(Instruction::Push(-2.5).to_string(), "push -2.5");
    assert_eq!(Instruction::Push(7.0).to_string(), "push 7");
    assert_eq!(Instruction::PushRegister(1).to_string(), "push rbx");
    assert_eq!(Instruction::Pop(9).to_string(), "pop r9");
    assert_eq!(Instruction::Jbe(12).to_string(), "jbe 12");
    assert_eq!(Instruction::Ret.to_string(), "ret");
  }

  #[test]
  fn program_counts() {
    let program = Program::new(vec![
      Instruction::Push(3.0),
      Instruction::Push(4.0),
      Instruction::Add,
      Instruction::Out,
      Instruction::End,
    ]);
    assert_eq!(program.instruction_count(), 5);
    assert_eq!(program.operand_count(), 2);
    assert!(program.is_terminated());
    assert!(!Program::default().is_terminated());
  }
}
