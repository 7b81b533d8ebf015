//! A bounded LIFO container. The processor uses one for operand values and another for return
//! addresses.

use std::fmt::{Display, Formatter};

use crate::error::StackError;

/// A stack that refuses to grow past its capacity or shrink below empty.
#[derive(Clone, Debug)]
pub struct Stack<T> {
  name     : &'static str,
  items    : Vec<T>,
  capacity : usize,
}

impl<T> Stack<T> {

  /// `name` identifies the stack in error messages.
  pub fn new(name: &'static str, capacity: usize) -> Stack<T> {
    Stack {
      name,
      // Capacity is a limit, not a request; only preallocate modest sizes.
      items: Vec::with_capacity(capacity.min(1024)),
      capacity,
    }
  }

  pub fn push(&mut self, value: T) -> Result<(), StackError> {
    if self.items.len() >= self.capacity {
      return Err(StackError::Overflow { stack: self.name, capacity: self.capacity });
    }
    self.items.push(value);
    Ok(())
  }

  pub fn pop(&mut self) -> Result<T, StackError> {
    self.items.pop().ok_or(StackError::Underflow { stack: self.name })
  }

  pub fn peek(&self) -> Option<&T> {
    self.items.last()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  /// The contents from bottom to top.
  pub fn as_slice(&self) -> &[T] {
    &self.items
  }
}

impl<T: Display> Display for Stack<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "[{}]",
      self.items
          .iter()
          .map(|item| item.to_string())
          .collect::<Vec<String>>()
          .join(", ")
    )
  }
}
