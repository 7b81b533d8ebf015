use std::collections::VecDeque;
use std::io::BufRead;

use crate::bytecode::{parse_value, Value};
use crate::error::Fault;

/// Reads whitespace-separated numbers for the `in` instruction, one line at a time.
pub struct NumberReader<R> {
  reader  : R,
  pending : VecDeque<String>,
}

impl<R: BufRead> NumberReader<R> {
  pub fn new(reader: R) -> Self {
    NumberReader {
      reader,
      pending: VecDeque::new(),
    }
  }

  /// The next number on the stream. Running out of input, or meeting a word that is not a
  /// number, is a fault.
  pub fn next_value(&mut self) -> Result<Value, Fault> {
    while self.pending.is_empty() {
      let mut line = String::new();
      let read = self.reader.read_line(&mut line).map_err(Fault::Input)?;
      if read == 0 {
        return Err(Fault::InputExhausted);
      }
      self.pending.extend(line.split_whitespace().map(str::to_string));
    }

    match self.pending.pop_front() {
      Some(word) => parse_value(&word).ok_or(Fault::InvalidInput(word)),
      None       => Err(Fault::InputExhausted),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn reads_numbers_across_lines() {
    let mut reader = NumberReader::new(Cursor::new("3 4.5\n\n  -1\n"));
    assert_eq!(reader.next_value().unwrap(), 3.0);
    assert_eq!(reader.next_value().unwrap(), 4.5);
    assert_eq!(reader.next_value().unwrap(), -1.0);
    assert!(matches!(reader.next_value(), Err(Fault::InputExhausted)));
  }

  #[test]
  fn rejects_words() {
    let mut reader = NumberReader::new(Cursor::new("seven"));
    match reader.next_value() {
      Err(Fault::InvalidInput(word)) => assert_eq!(word, "seven"),
      other                          => panic!("unexpected {:?}", other),
    }
  }
}
