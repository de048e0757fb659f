/*!

  The VM uses a 32 bit little-endian word size. An instruction is a single opcode byte followed
  by zero or more operand bytes. The opcode alone determines the shape of the operands:

    SIMPLE:  [OpCode:8]
    REG:     [OpCode:8][Register:8]
    REGREG:  [OpCode:8][Register:8][Register:8]
    REGVAL:  [OpCode:8][Register:8][Value:32]
    LABEL:   [OpCode:8][Offset:32]

  Label offsets are measured in bytes from the start of the loaded program, not from the start
  of memory. There is no header, magic number, or version field in a bytecode file; a running
  program can ask for the VM version with `stat`.

  Instructions are not stored as enum values in memory. The `Operation` enum is used only for
  the opcode byte, and `Instruction` holds a decoded instruction for the assembler,
  disassembler, and interpreter to share.

*/

mod binary;
mod instruction;
mod assembly;
mod disassembly;

pub use binary::{encode_instruction, try_decode_instruction, DecodeError};
pub use instruction::Instruction;
pub use assembly::{assemble, assemble_program, LABEL_SIGIL};
pub use disassembly::disassemble;

use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

pub type Word = u32;

/// Reported by `stat` in `R0`.
pub const CPU_VERSION: Word = 1;

/// The shape of the operand bytes following an opcode.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum OperandKind {
  Simple,
  Reg,
  RegReg,
  RegVal,
  Label,
}

impl OperandKind {
  /// The number of operand tokens an assembly line for this kind carries.
  pub fn operand_count(&self) -> usize {
    match self {
      OperandKind::Simple => 0,
      OperandKind::Reg | OperandKind::Label => 1,
      OperandKind::RegReg | OperandKind::RegVal => 2,
    }
  }

  /// The number of bytes following the opcode.
  pub fn encoded_size(&self) -> usize {
    match self {
      OperandKind::Simple => 0,
      OperandKind::Reg    => 1,
      OperandKind::RegReg => 2,
      OperandKind::RegVal => 5,
      OperandKind::Label  => 4,
    }
  }
}

/**
  Opcodes of the virtual machine.

  The discriminant of each variant is its opcode byte, so the order the opcodes are listed
  below is significant and must never change: it is the binary encoding.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq, PartialEq,  Debug,            Hash
)]
#[repr(u8)]
pub enum Operation {
  #[strum(serialize = "nop")]     Nop,        // nop
  #[strum(serialize = "stat")]    Stat,       // stat                   R0..R2 = version, memory, offset
  #[strum(serialize = "set")]     Set,        // set     r value
  #[strum(serialize = "in")]      In,         // in      r
  #[strum(serialize = "out")]     Out,        // out     r
  #[strum(serialize = "store8")]  Store8,     // store8  address value
  #[strum(serialize = "store16")] Store16,    // store16 address value
  #[strum(serialize = "store32")] Store32,    // store32 address value
  #[strum(serialize = "load8")]   Load8,      // load8   r address
  #[strum(serialize = "load16")]  Load16,     // load16  r address
  #[strum(serialize = "load32")]  Load32,     // load32  r address
  #[strum(serialize = "push")]    Push,       // push    r
  #[strum(serialize = "pop")]     Pop,        // pop     r
  #[strum(serialize = "mov")]     Mov,        // mov     r1 r2
  // Opcode 14: flag-setting arithmetic
  #[strum(serialize = "add")]     Add,
  #[strum(serialize = "sub")]     Sub,
  #[strum(serialize = "smul")]    SMul,
  #[strum(serialize = "umul")]    UMul,
  #[strum(serialize = "sdiv")]    SDiv,
  #[strum(serialize = "udiv")]    UDiv,
  #[strum(serialize = "smod")]    SMod,
  #[strum(serialize = "umod")]    UMod,
  #[strum(serialize = "neg")]     Neg,
  #[strum(serialize = "and")]     And,
  #[strum(serialize = "or")]      Or,
  #[strum(serialize = "xor")]     Xor,
  #[strum(serialize = "shift")]   Shift,      // shift   r amount       left if amount >= 0
  #[strum(serialize = "not")]     Not,
  // Opcode 28: control flow
  #[strum(serialize = "call")]    Call,
  #[strum(serialize = "ret")]     Ret,
  #[strum(serialize = "jmp")]     Jmp,
  #[strum(serialize = "jiz")]     Jiz,        // jump if zero
  #[strum(serialize = "juz")]     Juz,        // jump unless zero
  #[strum(serialize = "jis")]     Jis,        // jump if sign
  #[strum(serialize = "jus")]     Jus,        // jump unless sign
  #[strum(serialize = "jio")]     Jio,        // jump if overflow
  #[strum(serialize = "juo")]     Juo,        // jump unless overflow
  #[strum(serialize = "jmpr")]    JmpR,       // jmpr    r              relative to program start
}

impl Operation {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn kind(&self) -> OperandKind {
    use Operation::*;
    match self {
      Nop | Stat | Ret => OperandKind::Simple,

      Set => OperandKind::RegVal,

      | In | Out | Push | Pop | Neg | Not | JmpR => OperandKind::Reg,

      | Store8 | Store16 | Store32 | Load8 | Load16 | Load32 | Mov
      | Add | Sub | SMul | UMul | SDiv | UDiv | SMod | UMod
      | And | Or | Xor | Shift => OperandKind::RegReg,

      Call | Jmp | Jiz | Juz | Jis | Jus | Jio | Juo => OperandKind::Label,
    }
  }

  /// Whether zero and sign are recomputed from the first register operand after execution.
  pub fn sets_flags(&self) -> bool {
    use Operation::*;
    matches!(
      self,
      Add | Sub | SMul | UMul | SDiv | UDiv | SMod | UMod | Neg | And | Or | Xor | Shift | Not
    )
  }

  pub fn mnemonic(&self) -> &'static str {
    self.into()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::convert::TryFrom;
  use std::str::FromStr;

  #[test]
  fn opcode_bytes_follow_table_order() {
    assert_eq!(Operation::Nop.code(), 0);
    assert_eq!(Operation::Set.code(), 2);
    assert_eq!(Operation::Out.code(), 4);
    assert_eq!(Operation::Add.code(), 14);
    assert_eq!(Operation::Call.code(), 28);
    assert_eq!(Operation::JmpR.code(), 37);
    assert!(Operation::try_from(38u8).is_err());
  }

  #[test]
  fn mnemonics_round_trip() {
    for code in 0..=37u8 {
      let operation = Operation::try_from(code).unwrap();
      assert_eq!(Operation::from_str(operation.mnemonic()), Ok(operation));
    }
    assert_eq!(Operation::Store16.to_string(), "store16");
    assert!(Operation::from_str("ADD").is_err());
  }

  #[test]
  fn flag_setting_operations_name_a_register_first() {
    for code in 0..=37u8 {
      let operation = Operation::try_from(code).unwrap();
      if operation.sets_flags() {
        assert!(matches!(operation.kind(), OperandKind::Reg | OperandKind::RegReg));
      }
    }
  }
}
