//! Error types for each stage of the pipeline. Every error here is fatal to the stage that raised
//! it; callers decide whether to report and exit or to inspect the value.

use thiserror::Error;

use crate::bytecode::{Operation, Word};
use crate::functor::Functor;

/// A runtime fault raised by the virtual machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
  #[error("program of {program} bytes does not fit in {memory} bytes of memory")]
  ProgramTooLarge { program: usize, memory: usize },

  #[error("invalid opcode {opcode:#04x} at address {address}")]
  InvalidOpcode { opcode: u8, address: Word },

  #[error("truncated instruction at address {address}")]
  TruncatedInstruction { address: Word },

  #[error("out of bounds {width}-byte access at address {address}")]
  OutOfBounds { address: Word, width: usize },

  #[error("division by zero at address {address}")]
  DivisionByZero { address: Word },

  #[error("I/O failure at address {address}: {message}")]
  Io { address: Word, message: String },
}

pub type FaultResult<T = ()> = Result<T, Fault>;


#[derive(Debug, Clone, PartialEq, Error)]
#[error("[Line {line}] {kind}")]
pub struct AssemblyError {
  pub line : usize,
  pub kind : AssemblyErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyErrorKind {
  #[error("Invalid command: {0}")]
  InvalidOperation(String),

  #[error("Invalid register name: {0}")]
  InvalidRegister(String),

  #[error("Invalid number: {0}")]
  InvalidNumber(String),

  #[error("Syntax error: {operation} takes {expected} operand(s) but was given {found}")]
  WrongOperandCount { operation: Operation, expected: usize, found: usize },

  #[error("Invalid label declaration")]
  InvalidLabelDeclaration,

  #[error("Label redeclared: {0}")]
  LabelRedeclared(String),

  #[error("Label not declared: {0}")]
  UndeclaredLabel(String),
}


#[derive(Debug, Clone, PartialEq, Error)]
pub enum DisassemblyError {
  #[error("Invalid command at offset {offset}")]
  InvalidOpcode { offset: usize },

  #[error("Unexpected end of program at offset {offset}")]
  UnexpectedEof { offset: usize },
}


/// Failures of the Nascal front end and code generator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
  #[error("{kind}\nLine {line}, position {column}")]
  Parse { kind: ParseErrorKind, line: usize, column: usize },

  #[error("Function {function}: {kind}")]
  Semantic { function: String, kind: SemanticErrorKind },

  #[error("Function {caller} calls function {name} with {arguments} which is not defined",
          name = .callee.name, arguments = plural_arguments(.callee.arity))]
  UndefinedFunction { caller: String, callee: Functor },

  #[error("Function {0} is defined more than once")]
  DuplicateFunction(Functor),

  #[error("Function main with no arguments does not exist")]
  MissingMain,
}

impl CompileError {
  pub fn is_parse_error(&self) -> bool {
    matches!(self, CompileError::Parse { .. })
  }
}

fn plural_arguments(count: u32) -> String {
  match count {
    1 => "1 argument".to_string(),
    n => format!("{} arguments", n)
  }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
  #[error("Unexpected symbol: {0}")]
  UnexpectedSymbol(char),

  #[error("Invalid character literal")]
  InvalidCharacter,

  #[error("Integer literal out of range: {0}")]
  IntegerOutOfRange(String),

  #[error("Unexpected end of file")]
  UnexpectedEof,

  #[error("{0} expected")]
  Expected(&'static str),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticErrorKind {
  #[error("BREAK outside loop")]
  BreakOutsideLoop,

  #[error("CONTINUE outside loop")]
  ContinueOutsideLoop,

  #[error("Taking address of rvalue")]
  AddressOfRvalue,
}

pub type CompileResult<T = ()> = Result<T, CompileError>;
