use std::collections::HashMap;

use string_cache::DefaultAtom;

use super::ast::Function;

/**
  The stack frame of the function being compiled, in words above the stack pointer.

  After the prologue, locals occupy words `0..L`, the return address is word `L`, and parameter
  `i` of `P` is word `L + P - i`, so the last argument pushed sits just above the return address.
  Every word pushed while evaluating a statement moves all of these up by one; `extra_offset`
  counts those words.
*/
#[derive(Clone, Debug, Default)]
pub struct Frame {
  offsets      : HashMap<DefaultAtom, usize>,
  local_count  : usize,
  extra_offset : usize,
}

impl Frame {

  pub fn new(function: &Function) -> Frame {
    let local_count     = function.locals.len();
    let parameter_count = function.parameters.len();
    let mut offsets     = HashMap::new();

    for (i, parameter) in function.parameters.iter().enumerate() {
      offsets.insert(parameter.clone(), local_count + parameter_count - i);
    }
    for (i, local) in function.locals.iter().enumerate() {
      offsets.insert(local.clone(), i);
    }

    Frame {
      offsets,
      local_count,
      extra_offset: 0
    }
  }

  /// The current distance in words from the stack pointer to `name`.
  pub fn offset_of(&self, name: &DefaultAtom) -> usize {
    match self.offsets.get(name) {
      Some(offset) => offset + self.extra_offset,
      // The parser records every name a function body mentions.
      None => panic!("Variable {} is not in the frame.", name)
    }
  }

  pub fn local_count(&self) -> usize {
    self.local_count
  }

  /// Words between the stack pointer and the return address.
  pub fn depth(&self) -> usize {
    self.local_count + self.extra_offset
  }

  pub fn push(&mut self, words: usize) {
    self.extra_offset += words;
  }

  pub fn pop(&mut self, words: usize) {
    debug_assert!(words <= self.extra_offset, "popped more words than were pushed");
    self.extra_offset -= words;
  }
}
