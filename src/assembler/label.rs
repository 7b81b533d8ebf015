use std::collections::HashMap;

use string_cache::DefaultAtom;

use crate::bytecode::Address;

/// Terminates a label declaration (`loop:`) and a jump's label operand (`jmp loop:`).
pub const LABEL_TERMINATOR: char = ':';

/**
  A label table maps label names to the address of the instruction that follows the
  declaration. It lives only for the duration of one assembly; label names are not written to
  bytecode. Names are interned.
*/
#[derive(Clone, Debug, Default)]
pub struct LabelTable {
  table: HashMap<DefaultAtom, Address>,
}

impl LabelTable {

  pub fn new() -> LabelTable {
    LabelTable::default()
  }

  pub fn with_capacity(capacity: usize) -> LabelTable {
    LabelTable {
      table: HashMap::with_capacity(capacity)
    }
  }

  pub fn resolve(&self, name: &DefaultAtom) -> Option<Address> {
    self.table.get(name).copied()
  }

  /// Records `name` at `address`. Fails with the existing entry if `name` is already declared.
  pub fn declare(&mut self, name: DefaultAtom, address: Address)
    -> Result<(), (DefaultAtom, Address)> {
    match self.table.get(&name) {
      Some(existing) => Err((name, *existing)),
      None => {
        self.table.insert(name, address);
        Ok(())
      }
    }
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }
}

/// Whether `name` (without its terminator) is usable as a label: letters, digits, `_`, `.`, `$`.
pub fn is_label_name(name: &str) -> bool {
  !name.is_empty()
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

/// Strips the terminator from a label-looking token, returning the name if it is valid.
pub fn terminated_label(token: &str) -> Option<&str> {
  token.strip_suffix(LABEL_TERMINATOR).filter(|name| is_label_name(name))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn declare_then_resolve() {
    let mut labels = LabelTable::with_capacity(2);
    assert!(labels.is_empty());
    assert_eq!(labels.declare(DefaultAtom::from("loop"), 3), Ok(()));
    assert_eq!(labels.declare(DefaultAtom::from("done"), 3), Ok(()));
    assert_eq!(labels.resolve(&DefaultAtom::from("loop")), Some(3));
    assert_eq!(labels.resolve(&DefaultAtom::from("missing")), None);
    assert_eq!(labels.len(), 2);
  }

  #[test]
  fn duplicate_declaration_reports_the_first() {
    let mut labels = LabelTable::new();
    labels.declare(DefaultAtom::from("loop"), 1).unwrap();
    assert_eq!(
      labels.declare(DefaultAtom::from("loop"), 5),
      Err((DefaultAtom::from("loop"), 1))
    );
    assert_eq!(labels.resolve(&DefaultAtom::from("loop")), Some(1));
  }

  #[test]
  fn label_tokens() {
    assert_eq!(terminated_label("skip:"), Some("skip"));
    assert_eq!(terminated_label("loop_2.a:"), Some("loop_2.a"));
    assert_eq!(terminated_label(":"), None);
    assert_eq!(terminated_label("skip"), None);
    assert_eq!(terminated_label("a:b:"), None);
    assert!(is_label_name("main"));
    assert!(!is_label_name("ma-in"));
    assert!(!is_label_name("é"));
    assert_eq!(terminated_label("café:"), None);
  }
}
