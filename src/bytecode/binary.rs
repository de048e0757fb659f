/*!
  This module is responsible for the encoding and decoding of binary instructions. Both the
  interpreter and the disassembler decode through `try_decode_instruction`, so the two can never
  disagree about an instruction's length.
*/
use std::convert::TryFrom;

use super::{Instruction, Operation, OperandKind, Word};
use crate::register::Register;

/// Why an instruction could not be decoded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeError {
  /// The byte at the given offset is not an opcode.
  InvalidOpcode(u8),
  /// The operands run past the end of the buffer.
  Truncated,
}

/**
  Appends the encoding of the instruction to `output`. It is the caller's responsibility to
  use the `Instruction` variant matching the opcode's operand kind.
*/
pub fn encode_instruction(instruction: &Instruction, output: &mut Vec<u8>) {
  debug_assert!(instruction.is_well_formed(), "malformed instruction: {:?}", instruction);
  output.push(instruction.opcode().code());
  match *instruction {

    Instruction::Simple(_) => {}

    Instruction::Reg { register, .. } => {
      output.push(register.0);
    }

    Instruction::RegReg { first, second, .. } => {
      output.push(first.0);
      output.push(second.0);
    }

    Instruction::RegVal { register, value, .. } => {
      output.push(register.0);
      output.extend_from_slice(&value.to_le_bytes());
    }

    Instruction::Label { target, .. } => {
      output.extend_from_slice(&target.to_le_bytes());
    }

  }
}

/// Reads a little-endian word at `offset`.
fn read_word(bytes: &[u8], offset: usize) -> Option<Word> {
  let end = offset.checked_add(4)?;
  let slice = bytes.get(offset..end)?;
  let mut word = [0u8; 4];
  word.copy_from_slice(slice);
  Some(Word::from_le_bytes(word))
}

/**
  Decodes the instruction starting at `offset`, returning it together with the offset of the
  byte just past it.
*/
pub fn try_decode_instruction(bytes: &[u8], offset: usize)
  -> Result<(Instruction, usize), DecodeError>
{
  let opcode_byte = *bytes.get(offset).ok_or(DecodeError::Truncated)?;
  let opcode = Operation::try_from(opcode_byte)
    .map_err(|_| DecodeError::InvalidOpcode(opcode_byte))?;

  // The cursor starts just past the opcode and is advanced by each operand read.
  let mut cursor = offset + 1;
  let next_register = |cursor: &mut usize| -> Result<Register, DecodeError> {
    let byte = *bytes.get(*cursor).ok_or(DecodeError::Truncated)?;
    *cursor += 1;
    Ok(Register(byte))
  };
  let next_word = |cursor: &mut usize| -> Result<Word, DecodeError> {
    let word = read_word(bytes, *cursor).ok_or(DecodeError::Truncated)?;
    *cursor += 4;
    Ok(word)
  };

  let instruction =
    match opcode.kind() {

      OperandKind::Simple => Instruction::Simple(opcode),

      OperandKind::Reg => Instruction::Reg {
        opcode,
        register: next_register(&mut cursor)?
      },

      OperandKind::RegReg => {
        let first = next_register(&mut cursor)?;
        let second = next_register(&mut cursor)?;
        Instruction::RegReg { opcode, first, second }
      }

      OperandKind::RegVal => {
        let register = next_register(&mut cursor)?;
        let value = next_word(&mut cursor)?;
        Instruction::RegVal { opcode, register, value }
      }

      OperandKind::Label => Instruction::Label {
        opcode,
        target: next_word(&mut cursor)?
      },

    };

  Ok((instruction, cursor))
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encode_set_and_out() {
    let mut bytes = Vec::new();
    encode_instruction(
      &Instruction::RegVal { opcode: Operation::Set, register: Register(1), value: 5 },
      &mut bytes
    );
    encode_instruction(&Instruction::Reg { opcode: Operation::Out, register: Register(1) }, &mut bytes);
    assert_eq!(bytes, vec![0x02, 0x01, 0x05, 0x00, 0x00, 0x00, 0x04, 0x01]);
  }

  #[test]
  fn decode_reports_next_offset() {
    let bytes = [0x1e, 0x10, 0x00, 0x00, 0x00, 0x1d];
    let (jump, next) = try_decode_instruction(&bytes, 0).unwrap();
    assert_eq!(jump, Instruction::Label { opcode: Operation::Jmp, target: 16 });
    assert_eq!(next, 5);
    let (ret, next) = try_decode_instruction(&bytes, next).unwrap();
    assert_eq!(ret, Instruction::Simple(Operation::Ret));
    assert_eq!(next, 6);
  }

  #[test]
  fn decode_failures() {
    assert_eq!(try_decode_instruction(&[0xff], 0), Err(DecodeError::InvalidOpcode(0xff)));
    assert_eq!(try_decode_instruction(&[0x02, 0x01, 0x05, 0x00], 0), Err(DecodeError::Truncated));
    assert_eq!(try_decode_instruction(&[0x0d, 0x01], 0), Err(DecodeError::Truncated));
    assert_eq!(try_decode_instruction(&[], 0), Err(DecodeError::Truncated));
  }
}
