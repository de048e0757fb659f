/*!
  The human readable textual form of bytecode is called assembly. Each line holds at most one
  statement: an instruction, a label declaration, or nothing. A `;` starts a comment that runs to
  the end of the line.

  ```text
  @loop
    in    R1        ; read a byte
    out   R1
    jmp   @loop
  ```

  Assembly is a two pass process. The first pass records label offsets, writing a placeholder
  for any label it has not seen yet. Every operand has a fixed width, so the second pass lays
  out exactly the same bytes with every label resolved.
*/

use std::convert::TryFrom;
use std::str::FromStr;

use nom::{
  bytes::complete::is_not,
  character::complete::{char as one_char, digit1, multispace0},
  combinator::{all_consuming, opt, recognize, rest},
  multi::many0,
  sequence::{pair, preceded, terminated, tuple},
  IResult
};

use super::{encode_instruction, Instruction, Operation, OperandKind, Word};
use crate::error::{AssemblyError, AssemblyErrorKind};
use crate::register::Register;
use crate::symboltable::SymbolTable;

/// Every label, in declarations and in references, begins with this character.
pub const LABEL_SIGIL: char = '@';

/// Splits a line into whitespace separated tokens, dropping a trailing comment.
fn pstatement(line: &str) -> IResult<&str, Vec<&str>> {
  all_consuming(
    terminated(
      many0(preceded(multispace0, is_not(" \t\r\n;"))),
      tuple((multispace0, opt(preceded(one_char(';'), rest))))
    )
  )(line)
}

/// An optional minus sign followed by decimal digits, and nothing else.
fn pnumber(text: &str) -> IResult<&str, &str> {
  all_consuming(recognize(pair(opt(one_char('-')), digit1)))(text)
}

fn parse_register(text: &str) -> Result<Register, AssemblyErrorKind> {
  Register::from_str(text).map_err(|_| AssemblyErrorKind::InvalidRegister(text.to_string()))
}

/// Numbers are read as 64 bit signed values and truncated to a word.
fn parse_number(text: &str) -> Result<Word, AssemblyErrorKind> {
  let invalid = || AssemblyErrorKind::InvalidNumber(text.to_string());
  let (_, digits) = pnumber(text).map_err(|_| invalid())?;
  let value = digits.parse::<i64>().map_err(|_| invalid())?;
  Ok(value as Word)
}

/**
  A label reference or a numeric immediate. On a pass that is not final, a label that has not
  been declared yet resolves to zero.
*/
fn parse_value(text: &str, labels: &SymbolTable, final_pass: bool)
  -> Result<Word, AssemblyErrorKind>
{
  match text.starts_with(LABEL_SIGIL) {
    true => {
      match (labels.get_offset(text), final_pass) {
        (Some(offset), _) => Ok(offset),
        (None, false)     => Ok(0),
        (None, true)      => Err(AssemblyErrorKind::UndeclaredLabel(text.to_string()))
      }
    }
    false => parse_number(text)
  }
}

/// Builds the instruction for a line whose first token is the mnemonic.
fn parse_instruction(tokens: &[&str], labels: &SymbolTable, final_pass: bool)
  -> Result<Instruction, AssemblyErrorKind>
{
  let opcode = Operation::from_str(tokens[0])
    .map_err(|_| AssemblyErrorKind::InvalidOperation(tokens[0].to_string()))?;
  let operands = &tokens[1..];
  let kind = opcode.kind();

  if operands.len() != kind.operand_count() {
    return Err(AssemblyErrorKind::WrongOperandCount {
      operation : opcode,
      expected  : kind.operand_count(),
      found     : operands.len()
    });
  }

  let instruction =
    match kind {

      OperandKind::Simple => Instruction::Simple(opcode),

      OperandKind::Reg => Instruction::Reg {
        opcode,
        register: parse_register(operands[0])?
      },

      OperandKind::RegReg => Instruction::RegReg {
        opcode,
        first  : parse_register(operands[0])?,
        second : parse_register(operands[1])?
      },

      OperandKind::RegVal => Instruction::RegVal {
        opcode,
        register : parse_register(operands[0])?,
        value    : parse_value(operands[1], labels, final_pass)?
      },

      OperandKind::Label => Instruction::Label {
        opcode,
        target: parse_value(operands[0], labels, final_pass)?
      },

    };
  Ok(instruction)
}

/**
  Runs a single assembler pass over `text`, declaring labels in `labels` as they are met. Labels
  declared by an earlier pass over the same text are available from the first line. When
  `final_pass` is set, a reference to a label that was never declared is an error.
*/
pub fn assemble(text: &str, labels: &mut SymbolTable, final_pass: bool)
  -> Result<Vec<u8>, AssemblyError>
{
  let mut output: Vec<u8> = Vec::new();

  for (index, line) in text.lines().enumerate() {
    let line_number = index + 1;
    let error = |kind| AssemblyError { line: line_number, kind };

    let tokens =
      match pstatement(line) {
        Ok((_, tokens)) => tokens,
        Err(_) => {
          return Err(error(AssemblyErrorKind::InvalidOperation(line.trim().to_string())));
        }
      };

    if tokens.is_empty() {
      continue;
    }

    if tokens[0].starts_with(LABEL_SIGIL) {
      if tokens.len() > 1 {
        return Err(error(AssemblyErrorKind::InvalidLabelDeclaration));
      }
      let offset = Word::try_from(output.len())
        .map_err(|_| error(AssemblyErrorKind::InvalidLabelDeclaration))?;
      labels
        .insert(tokens[0], offset)
        .map_err(|_| error(AssemblyErrorKind::LabelRedeclared(tokens[0].to_string())))?;
      continue;
    }

    let instruction = parse_instruction(&tokens, labels, final_pass).map_err(error)?;
    encode_instruction(&instruction, &mut output);
  }

  #[cfg(feature = "trace_computation")]
  eprintln!("Assembled {} bytes ({} labels, final pass: {}).", output.len(), labels.len(), final_pass);

  Ok(output)
}

/// Assembles a complete program: a recording pass followed by a final pass.
pub fn assemble_program(text: &str) -> Result<Vec<u8>, AssemblyError> {
  let mut labels = SymbolTable::new();
  assemble(text, &mut labels, false)?;
  assemble(text, &mut labels, true)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokenizes_statements() {
    assert_eq!(pstatement("  add R1\tR2 ; sum").unwrap().1, vec!["add", "R1", "R2"]);
    assert_eq!(pstatement("; nothing here").unwrap().1, Vec::<&str>::new());
    assert_eq!(pstatement("").unwrap().1, Vec::<&str>::new());
    assert_eq!(pstatement("ret;").unwrap().1, vec!["ret"]);
  }

  #[test]
  fn assembles_set_and_out() {
    let bytes = assemble_program("set R1 5\nout R1\n").unwrap();
    assert_eq!(bytes, vec![0x02, 0x01, 0x05, 0x00, 0x00, 0x00, 0x04, 0x01]);
  }

  #[test]
  fn negative_immediates_truncate() {
    let bytes = assemble_program("set R0 -1").unwrap();
    assert_eq!(bytes, vec![0x02, 0x00, 0xff, 0xff, 0xff, 0xff]);
  }

  #[test]
  fn forward_labels_resolve_on_final_pass() {
    let text = "jmp @skip\nnop\n@skip\nret\n";
    let mut labels = SymbolTable::new();

    let first = assemble(text, &mut labels, false).unwrap();
    assert_eq!(first, vec![0x1e, 0, 0, 0, 0, 0x00, 0x1d]);
    assert_eq!(labels.get_offset("@skip"), Some(6));

    let second = assemble(text, &mut labels, true).unwrap();
    assert_eq!(second, vec![0x1e, 6, 0, 0, 0, 0x00, 0x1d]);
  }

  #[test]
  fn label_values_in_set() {
    let bytes = assemble_program("@here\nset RS @here").unwrap();
    assert_eq!(bytes, vec![0x02, 0xfe, 0, 0, 0, 0]);
  }

  #[test]
  fn reports_errors_with_line_numbers() {
    let error = assemble_program("nop\nfrob R1").unwrap_err();
    assert_eq!(error.line, 2);
    assert_eq!(error.kind, AssemblyErrorKind::InvalidOperation("frob".to_string()));
    assert_eq!(error.to_string(), "[Line 2] Invalid command: frob");

    let error = assemble_program("out R256").unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::InvalidRegister("R256".to_string()));

    let error = assemble_program("set R1 12x").unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::InvalidNumber("12x".to_string()));

    let error = assemble_program("\n\nadd R1").unwrap_err();
    assert_eq!(error.line, 3);
    assert_eq!(
      error.kind,
      AssemblyErrorKind::WrongOperandCount { operation: Operation::Add, expected: 2, found: 1 }
    );

    let error = assemble_program("@a nop").unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::InvalidLabelDeclaration);

    let error = assemble_program("@a\nnop\n@a").unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::LabelRedeclared("@a".to_string()));

    let error = assemble_program("call @nowhere").unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::UndeclaredLabel("@nowhere".to_string()));
  }
}
