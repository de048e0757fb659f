use std::fmt::{Display, Formatter};

use super::{Operation, OperandKind, Word};
use crate::register::Register;

/// Holds the decoded components of an instruction. As such, it enumerates the possible
/// operand shapes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  /// [OpCode:8]
  Simple(Operation),
  /// [OpCode:8][Register:8]
  Reg {
    opcode   : Operation,
    register : Register
  },
  /// [OpCode:8][Register:8][Register:8]
  RegReg {
    opcode : Operation,
    first  : Register,
    second : Register
  },
  /// [OpCode:8][Register:8][Value:32]
  RegVal {
    opcode   : Operation,
    register : Register,
    value    : Word
  },
  /// [OpCode:8][Offset:32]
  Label {
    opcode : Operation,
    target : Word
  },
}

impl Instruction {

  pub fn opcode(&self) -> Operation {
    match self {
      | Instruction::Simple(opcode)
      | Instruction::Reg { opcode, .. }
      | Instruction::RegReg { opcode, .. }
      | Instruction::RegVal { opcode, .. }
      | Instruction::Label { opcode, .. } => *opcode
    }
  }

  /// The register whose value drives the zero and sign flags, if any.
  pub fn first_register(&self) -> Option<Register> {
    match self {
      | Instruction::Reg { register, .. }
      | Instruction::RegVal { register, .. } => Some(*register),
      Instruction::RegReg { first, .. }       => Some(*first),
      _                                       => None
    }
  }

  /// Size of the encoded instruction in bytes, including the opcode.
  pub fn size(&self) -> usize {
    1 + self.opcode().kind().encoded_size()
  }

  /// Checks that the variant agrees with the opcode's declared operand kind.
  pub fn is_well_formed(&self) -> bool {
    let kind = self.opcode().kind();
    match self {
      Instruction::Simple(_)     => kind == OperandKind::Simple,
      Instruction::Reg { .. }    => kind == OperandKind::Reg,
      Instruction::RegReg { .. } => kind == OperandKind::RegReg,
      Instruction::RegVal { .. } => kind == OperandKind::RegVal,
      Instruction::Label { .. }  => kind == OperandKind::Label,
    }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::Simple(opcode) => {
        write!(f, "{}", opcode)
      }

      Instruction::Reg { opcode, register } => {
        write!(f, "{} {}", opcode, register)
      }

      Instruction::RegReg { opcode, first, second } => {
        write!(f, "{} {} {}", opcode, first, second)
      }

      Instruction::RegVal { opcode, register, value } => {
        write!(f, "{} {} {}", opcode, register, value)
      }

      Instruction::Label { opcode, target } => {
        write!(f, "{} {}", opcode, target)
      }

    }
  }
}
