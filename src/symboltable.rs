use std::collections::HashMap;

use string_cache::DefaultAtom;

use crate::bytecode::Word;

/**
  A symbol table maps label names, sigil included, to byte offsets in the assembled program.
  The same table is carried across both assembler passes, so declaring a label again at the
  offset it already has is not an error. Declaring it anywhere else is.
*/
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
  table: HashMap<DefaultAtom, Word>
}

impl SymbolTable {

  pub fn new() -> SymbolTable {
    SymbolTable {
      table: HashMap::new()
    }
  }

  pub fn get_offset(&self, label: &str) -> Option<Word> {
    self.table.get(&DefaultAtom::from(label)).copied()
  }

  /// Records `label` at `offset`. On a conflicting redeclaration, returns the existing offset.
  pub fn insert(&mut self, label: &str, offset: Word) -> Result<(), Word> {
    let label = DefaultAtom::from(label);
    match self.table.get(&label) {
      Some(&existing) if existing != offset => Err(existing),
      _ => {
        self.table.insert(label, offset);
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


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn redeclaration_at_same_offset_is_tolerated() {
    let mut labels = SymbolTable::new();
    assert_eq!(labels.insert("@start", 4), Ok(()));
    assert_eq!(labels.insert("@start", 4), Ok(()));
    assert_eq!(labels.insert("@start", 9), Err(4));
    assert_eq!(labels.get_offset("@start"), Some(4));
    assert_eq!(labels.get_offset("@missing"), None);
    assert_eq!(labels.len(), 1);
  }
}
