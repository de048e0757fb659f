//! Functions are identified by their name together with their arity, so `f/1` and `f/2` are
//! distinct functions. A `Functor` is that pair.

use std::fmt::{Formatter, Display};

use string_cache::DefaultAtom;

use crate::bytecode::Word;

pub type ArityType = Word;

/**
  The `Functor` struct represents a function symbol f/n. Clones are cheap, as the name is
  interned. Functors are the same if and only if both their name and their arity are the same.
*/
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Functor {
  pub name  : DefaultAtom,
  pub arity : ArityType,
}

impl Functor {
  pub fn new(name: &str, arity: ArityType) -> Functor {
    Functor {
      name: DefaultAtom::from(name),
      arity
    }
  }

  /// The assembly label at which the function's code begins.
  pub fn label(&self) -> String {
    format!("@func_{}_{}", self.name, self.arity)
  }
}

impl Display for Functor {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}", self.name, self.arity)
  }
}

lazy_static! {
  /// The program entry point.
  pub static ref MAIN_FUNCTOR: Functor = Functor::new("main", 0);
  pub static ref PRINTCHAR_FUNCTOR: Functor = Functor::new("printchar", 1);
  pub static ref READCHAR_FUNCTOR: Functor = Functor::new("readchar", 0);
  /// Functions every program may call without defining them.
  pub static ref BUILTIN_FUNCTORS: [Functor; 2] = [
    PRINTCHAR_FUNCTOR.clone(),
    READCHAR_FUNCTOR.clone()
  ];
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn functors_differ_by_arity() {
    assert_ne!(Functor::new("f", 1), Functor::new("f", 2));
    assert_eq!(Functor::new("f", 1), Functor::new("f", 1));
    assert_eq!(Functor::new("fib", 1).to_string(), "fib/1");
  }

  #[test]
  fn labels() {
    assert_eq!(MAIN_FUNCTOR.label(), "@func_main_0");
    assert_eq!(PRINTCHAR_FUNCTOR.label(), "@func_printchar_1");
    assert!(BUILTIN_FUNCTORS.contains(&Functor::new("readchar", 0)));
  }
}
