//! The processor: a register, stack, and call-stack machine that executes a `Program`.

mod input;
pub mod stack;

pub use input::NumberReader;
pub use stack::Stack;

use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};

use lazy_static::lazy_static;
use prettytable::{format as TableFormat, row, table, Table};
use tracing::{debug, trace};

use crate::bytecode::{Address, Instruction, Program, Register, RegisterId, Value, REGISTER_COUNT};
use crate::error::{Fault, RuntimeError, StackError};

/// Entries in each stack unless configured otherwise.
pub const DEFAULT_STACK_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProcessorConfig {
  pub stack_capacity      : usize,
  pub call_stack_capacity : usize,
  /// Abort with `Fault::StepLimitExceeded` after this many instructions. `None` runs forever.
  pub max_steps           : Option<u64>,
}

impl Default for ProcessorConfig {
  fn default() -> Self {
    ProcessorConfig {
      stack_capacity      : DEFAULT_STACK_CAPACITY,
      call_stack_capacity : DEFAULT_STACK_CAPACITY,
      max_steps           : None,
    }
  }
}

/// What to do after an instruction has executed.
enum Flow {
  Next,
  Jump(Address),
  Halt,
}

pub struct Processor {
  // Registers //
  registers  : [Value; REGISTER_COUNT],
  pc         : Address, // Program counter, an index into the program

  // Memory Stores //
  stack      : Stack<Value>,
  call_stack : Stack<Address>,

  steps      : u64,
  max_steps  : Option<u64>,
}

impl Processor {

  // region Construction and inspection

  pub fn new(config: ProcessorConfig) -> Processor {
    Processor {
      registers  : [0.0; REGISTER_COUNT],
      pc         : 0,
      stack      : Stack::new("operand stack", config.stack_capacity),
      call_stack : Stack::new("call stack", config.call_stack_capacity),
      steps      : 0,
      max_steps  : config.max_steps,
    }
  }

  pub fn registers(&self) -> &[Value; REGISTER_COUNT] {
    &self.registers
  }

  pub fn register(&self, register: Register) -> Value {
    self.registers[register.id() as usize]
  }

  pub fn stack(&self) -> &Stack<Value> {
    &self.stack
  }

  pub fn call_stack(&self) -> &Stack<Address> {
    &self.call_stack
  }

  pub fn program_counter(&self) -> Address {
    self.pc
  }

  /// Instructions executed so far, not counting the final `end`.
  pub fn steps(&self) -> u64 {
    self.steps
  }

  // endregion

  // region Execution

  /**
    Executes `program` from its first instruction until `end` or a fault. `in` reads numbers
    from `input`; `out` writes one number per line to `output`.

    Output written before a fault stays written. The processor keeps its final state, so a
    caller can display it after a fault; use a fresh `Processor` for each run.
  */
  pub fn run<R: BufRead, W: Write>(
    &mut self,
    program : &Program,
    input   : R,
    output  : &mut W
  ) -> Result<(), RuntimeError> {
    let mut input = NumberReader::new(input);

    let result = self.execute(program, &mut input, output);
    let flushed = output.flush().map_err(|e| RuntimeError { pc: self.pc, fault: Fault::Output(e) });

    match &result {
      Ok(())     => debug!(steps = self.steps, "program halted"),
      Err(error) => debug!(steps = self.steps, %error, "program faulted"),
    }
    result.and(flushed)
  }

  fn execute<R: BufRead, W: Write>(
    &mut self,
    program : &Program,
    input   : &mut NumberReader<R>,
    output  : &mut W
  ) -> Result<(), RuntimeError> {
    loop {
      let flow =
        self.step(program, input, output)
            .map_err(|fault| RuntimeError { pc: self.pc, fault })?;

      match flow {
        Flow::Next         => self.pc += 1,
        Flow::Jump(target) => self.pc = target,
        Flow::Halt         => return Ok(()),
      }
      self.steps += 1;

      #[cfg(feature = "trace_computation")]
      trace!("\n{}", self);
    }
  }

  /// Fetches, decodes, and executes the instruction at the program counter.
  fn step<R: BufRead, W: Write>(
    &mut self,
    program : &Program,
    input   : &mut NumberReader<R>,
    output  : &mut W
  ) -> Result<Flow, Fault> {
    let instruction =
      *program.get(self.pc)
              .ok_or(Fault::ProgramCounterOutOfRange { length: program.len() })?;

    if instruction == Instruction::End {
      return Ok(Flow::Halt);
    }
    if let Some(limit) = self.max_steps {
      if self.steps >= limit {
        return Err(Fault::StepLimitExceeded(limit));
      }
    }
    trace!(pc = self.pc, %instruction, "execute");

    let flow =
      match instruction {
        Instruction::End => Flow::Halt,

        Instruction::Push(value) => {
          self.stack.push(value)?;
          Flow::Next
        }

        Instruction::PushRegister(id) => {
          let value = self.registers[register_slot(id)?];
          self.stack.push(value)?;
          Flow::Next
        }

        Instruction::Pop(id) => {
          let slot = register_slot(id)?;
          self.registers[slot] = self.stack.pop()?;
          Flow::Next
        }

        Instruction::Ja(target)  => self.branch(program, target, |a, b| a >  b)?,
        Instruction::Jae(target) => self.branch(program, target, |a, b| a >= b)?,
        Instruction::Jb(target)  => self.branch(program, target, |a, b| a <  b)?,
        Instruction::Jbe(target) => self.branch(program, target, |a, b| a <= b)?,
        Instruction::Je(target)  => self.branch(program, target, |a, b| a == b)?,
        Instruction::Jne(target) => self.branch(program, target, |a, b| a != b)?,

        Instruction::Jmp(target) => Flow::Jump(check_target(program, target)?),

        Instruction::Call(target) => {
          let target = check_target(program, target)?;
          self.call_stack.push(self.pc + 1)?;
          Flow::Jump(target)
        }

        Instruction::Ret => {
          let target = self.call_stack.pop()?;
          Flow::Jump(check_target(program, target)?)
        }

        Instruction::Add => self.arithmetic(|a, b| Ok(a + b))?,
        Instruction::Sub => self.arithmetic(|a, b| Ok(a - b))?,
        Instruction::Mul => self.arithmetic(|a, b| Ok(a * b))?,
        Instruction::Div => self.arithmetic(|a, b| {
          match b == 0.0 {
            true  => Err(Fault::DivisionByZero),
            false => Ok(a / b)
          }
        })?,
        Instruction::Pow => self.arithmetic(|a, b| Ok(a.powf(b)))?,

        Instruction::Dup => {
          let top =
            *self.stack.peek()
                       .ok_or(StackError::Underflow { stack: self.stack.name() })?;
          self.stack.push(top)?;
          Flow::Next
        }

        Instruction::In => {
          let value = input.next_value()?;
          self.stack.push(value)?;
          Flow::Next
        }

        Instruction::Out => {
          let value = self.stack.pop()?;
          writeln!(output, "{}", value).map_err(Fault::Output)?;
          Flow::Next
        }

        Instruction::Nop => Flow::Next,
      };

    Ok(flow)
  }

  /// Pops `a` (the top) and then `b`, and pushes `op(a, b)`.
  fn arithmetic<F>(&mut self, op: F) -> Result<Flow, Fault>
    where F: Fn(Value, Value) -> Result<Value, Fault>
  {
    let a = self.stack.pop()?;
    let b = self.stack.pop()?;
    self.stack.push(op(a, b)?)?;
    Ok(Flow::Next)
  }

  /// Pops `a` (the top) and then `b`, and jumps to `target` if `holds(a, b)`.
  fn branch<F>(&mut self, program: &Program, target: Address, holds: F) -> Result<Flow, Fault>
    where F: Fn(Value, Value) -> bool
  {
    let a = self.stack.pop()?;
    let b = self.stack.pop()?;
    match holds(a, b) {
      true  => Ok(Flow::Jump(check_target(program, target)?)),
      false => Ok(Flow::Next)
    }
  }

  // endregion

  // region Display methods

  fn make_table<T: Display>(values: &[T], label: impl Fn(usize) -> String, highlight: Option<usize>)
    -> Table
  {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Slot", ubl->"Contents"]);

    for (i, value) in values.iter().enumerate() {
      match Some(i) == highlight {

        true  => {
          table.add_row(row![r->format!("* --> {}", label(i)), format!("{}", value)]);
        }

        false => {
          table.add_row(row![r->label(i), format!("{}", value)]);
        }

      }
    }
    table
  }

  // endregion
}

/// The register file slot for a raw register id.
fn register_slot(id: RegisterId) -> Result<usize, Fault> {
  Register::from_id(id)
    .map(|register| register.id() as usize)
    .ok_or(Fault::InvalidRegister(id))
}

/// Checks that `target` names an instruction in `program`.
fn check_target(program: &Program, target: Address) -> Result<Address, Fault> {
  match target < program.len() {
    true  => Ok(target),
    false => Err(Fault::InvalidTarget { target, length: program.len() })
  }
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

/// Dumps the machine state: registers, operand stack (top marked), and call stack (top marked).
impl Display for Processor {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let names = |i: usize| {
      Register::from_id(i as RegisterId)
        .map(|register| register.to_string())
        .unwrap_or_default()
    };
    let top = |stack_len: usize| stack_len.checked_sub(1);

    let r_table = Processor::make_table(&self.registers, names, None);
    let s_table = Processor::make_table(
      self.stack.as_slice(),
      |i| format!("S[{}]", i),
      top(self.stack.len())
    );
    let c_table = Processor::make_table(
      self.call_stack.as_slice(),
      |i| format!("C[{}]", i),
      top(self.call_stack.len())
    );

    let mut combined_table = table!([r_table, s_table, c_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Operand Stack", ub->"Call Stack"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "PC: {}\tSteps: {}\n{}", self.pc, self.steps, combined_table)
  }
}
