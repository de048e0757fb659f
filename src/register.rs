//! A register index with the two reserved aliases, plus parsing and printing of register names
//! in assembly text.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bimap::BiMap;
use string_cache::DefaultAtom;
use nom::{
  character::complete::{char as one_char, digit1},
  combinator::all_consuming,
  sequence::preceded,
  IResult
};

pub type RegisterIndex = u8;

/// Number of slots in the register file.
pub const REGISTER_COUNT: usize = 256;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Register(pub RegisterIndex);

impl Register {
  /// The stack pointer, `RS`.
  pub const STACK: Register = Register(0xfe);
  /// The instruction pointer, `RI`.
  pub const INSTRUCTION: Register = Register(0xff);
  /// Holds function return values by convention.
  pub const RETURN: Register = Register(0);

  pub fn idx(&self) -> usize {
    self.0 as usize
  }

  /**
    The register next to this one for holding a second operand. Indices wrap within
    `R1..=R250`, so the result is never `R0`, `RS`, or `RI`.
  */
  pub fn adjacent(&self) -> Register {
    Register((self.0 as usize % 250 + 1) as RegisterIndex)
  }
}

lazy_static! {
  /// Spellings of the reserved registers in assembly text.
  pub static ref REGISTER_ALIASES: BiMap<DefaultAtom, Register> = {
    let mut aliases = BiMap::new();
    aliases.insert(DefaultAtom::from("RS"), Register::STACK);
    aliases.insert(DefaultAtom::from("RI"), Register::INSTRUCTION);
    aliases
  };
}

fn pregister_number(text: &str) -> IResult<&str, &str> {
  all_consuming(preceded(one_char('R'), digit1))(text)
}

impl FromStr for Register {
  type Err = ();

  /// Accepts `RS`, `RI`, or `R` followed by at most three decimal digits naming 0-255.
  fn from_str(text: &str) -> Result<Self, Self::Err> {
    if let Some(register) = REGISTER_ALIASES.get_by_left(&DefaultAtom::from(text)) {
      return Ok(*register);
    }
    match pregister_number(text) {

      Ok((_, digits)) if digits.len() <= 3 => {
        digits.parse::<u16>()
              .ok()
              .filter(|n| (*n as usize) < REGISTER_COUNT)
              .map(|n| Register(n as RegisterIndex))
              .ok_or(())
      }

      _ => Err(())

    }
  }
}

impl Display for Register {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match REGISTER_ALIASES.get_by_right(self) {
      Some(alias) => write!(f, "{}", alias),
      None        => write!(f, "R{}", self.0)
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_aliases_and_numbers() {
    assert_eq!("RS".parse::<Register>(), Ok(Register::STACK));
    assert_eq!("RI".parse::<Register>(), Ok(Register::INSTRUCTION));
    assert_eq!("R0".parse::<Register>(), Ok(Register(0)));
    assert_eq!("R255".parse::<Register>(), Ok(Register(255)));
    assert_eq!("R007".parse::<Register>(), Ok(Register(7)));
  }

  #[test]
  fn reject_bad_spellings() {
    for text in &["R256", "R", "r1", "R-1", "R1x", "X1", "R0001", "rs", ""] {
      assert_eq!(text.parse::<Register>(), Err(()), "{} should not parse", text);
    }
  }

  #[test]
  fn display_uses_aliases() {
    assert_eq!(Register(254).to_string(), "RS");
    assert_eq!(Register(255).to_string(), "RI");
    assert_eq!(Register(12).to_string(), "R12");
  }

  #[test]
  fn aliases_map_both_ways() {
    assert_eq!(REGISTER_ALIASES.get_by_left(&DefaultAtom::from("RS")), Some(&Register::STACK));
    assert_eq!(REGISTER_ALIASES.get_by_right(&Register::INSTRUCTION), Some(&DefaultAtom::from("RI")));
    assert_eq!(REGISTER_ALIASES.get_by_left(&DefaultAtom::from("R0")), None);
    assert_eq!(REGISTER_ALIASES.len(), 2);
  }

  #[test]
  fn adjacent_wraps_within_general_purpose_range() {
    assert_eq!(Register(0).adjacent(), Register(1));
    assert_eq!(Register(1).adjacent(), Register(2));
    assert_eq!(Register(249).adjacent(), Register(250));
    assert_eq!(Register(250).adjacent(), Register(1));
  }
}
