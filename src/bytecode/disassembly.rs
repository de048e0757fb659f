/*!
  Reconstructs assembly text from bytecode. Label names are not stored in the binary, so every
  jump target that lands on an instruction gets a synthesized `@l<offset>` label, and a target
  just past the final instruction becomes `@end`. Assembling the output reproduces the input
  bytes exactly.
*/

use std::collections::{BTreeMap, BTreeSet};

use super::{try_decode_instruction, DecodeError, Instruction, Word, LABEL_SIGIL};
use crate::error::DisassemblyError;

/// The label emitted for a jump to the first offset past the program.
const END_LABEL: &str = "end";

pub fn disassemble(bytes: &[u8]) -> Result<String, DisassemblyError> {
  // Decoded instructions keyed by offset, in program order.
  let mut lines: BTreeMap<usize, Instruction> = BTreeMap::new();
  let mut targets: BTreeSet<usize> = BTreeSet::new();

  let mut offset = 0usize;
  while offset < bytes.len() {
    let (instruction, next) =
      try_decode_instruction(bytes, offset).map_err(|error| match error {
        DecodeError::InvalidOpcode(_) => DisassemblyError::InvalidOpcode { offset },
        DecodeError::Truncated        => DisassemblyError::UnexpectedEof { offset },
      })?;
    if let Instruction::Label { target, .. } = instruction {
      targets.insert(target as usize);
    }
    lines.insert(offset, instruction);
    offset = next;
  }

  let mut listing = list_lines(&lines, &targets, bytes.len());
  listing.push(String::new());
  Ok(listing.join("\n"))
}

/// One line of assembly per instruction, with a label line before every offset in `targets`.
fn list_lines(
  lines          : &BTreeMap<usize, Instruction>,
  targets        : &BTreeSet<usize>,
  program_length : usize
) -> Vec<String> {
  let mut listing          = Vec::with_capacity(lines.len());
  let mut end_label_needed = false;

  for (&offset, instruction) in lines.iter() {
    if targets.contains(&offset) {
      listing.push(format!("{}l{}", LABEL_SIGIL, offset));
    }
    let line =
      match instruction {

        Instruction::Label { opcode, target } => {
          let target = *target as usize;
          if lines.contains_key(&target) {
            format!("{} {}l{}", opcode, LABEL_SIGIL, target)
          } else if target == program_length {
            end_label_needed = true;
            format!("{} {}{}", opcode, LABEL_SIGIL, END_LABEL)
          } else {
            // Lands inside another instruction's operands.
            format!("{} {}", opcode, target as Word)
          }
        }

        other => other.to_string(),

      };
    listing.push(line);
  }

  if end_label_needed {
    listing.push(format!("{}{}", LABEL_SIGIL, END_LABEL));
  }
  listing
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{assemble_program, Operation};

  #[test]
  fn synthesizes_labels() {
    let source = "\
@top
  in R1
  and R1 R1
  jiz @done
  out R1
  jmp @top
@done
  set RS -4
  call @finish
@finish
";
    let bytes = assemble_program(source).unwrap();
    let text = disassemble(&bytes).unwrap();
    let expected = "\
@l0
in R1
and R1 R1
jiz @l17
out R1
jmp @l0
@l17
set RS 4294967292
call @end
@end
";
    assert_eq!(text, expected);
    assert_eq!(assemble_program(&text).unwrap(), bytes);
  }

  #[test]
  fn interior_targets_stay_numeric() {
    let bytes = assemble_program("jmp 2\nret").unwrap();
    assert_eq!(disassemble(&bytes).unwrap(), "jmp 2\nret\n");
  }

  #[test]
  fn end_label_follows_last_instruction() {
    let bytes = assemble_program("jmp @out\nnop\n@out").unwrap();
    let (jump, _) = try_decode_instruction(&bytes, 0).unwrap();
    let mut lines = BTreeMap::new();
    lines.insert(0, jump);
    lines.insert(5, Instruction::Simple(Operation::Nop));
    let targets: BTreeSet<usize> = vec![6].into_iter().collect();
    assert_eq!(list_lines(&lines, &targets, bytes.len()), vec!["jmp @end", "nop", "@end"]);
  }

  #[test]
  fn reports_bad_input() {
    assert_eq!(disassemble(&[0x00, 0x40]), Err(DisassemblyError::InvalidOpcode { offset: 1 }));
    assert_eq!(disassemble(&[0x1d, 0x1e, 0x01]), Err(DisassemblyError::UnexpectedEof { offset: 1 }));
    assert_eq!(disassemble(&[]).unwrap(), "");
  }
}
