/*!
  Splits Nascal source into tokens with one token of lookahead.

  Besides its position, the tokenizer carries a single piece of state: whether the previous
  token can end an operand. After an operand, `-` is subtraction; anywhere else it is negation.
*/

use std::str::FromStr;

use string_cache::DefaultAtom;
use strum_macros::{Display as StrumDisplay, EnumString};

use super::ast::{BinaryOperator, UnaryOperator};
use super::chariter::CharIter;
use crate::bytecode::Word;
use crate::error::{CompileError, CompileResult, ParseErrorKind};

#[derive(StrumDisplay, EnumString, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Keyword {
  #[strum(serialize = "END")]      End,
  #[strum(serialize = "RETURN")]   Return,
  #[strum(serialize = "DEF")]      Def,
  #[strum(serialize = "IF")]       If,
  #[strum(serialize = "THEN")]     Then,
  #[strum(serialize = "ELSE")]     Else,
  #[strum(serialize = "WHILE")]    While,
  #[strum(serialize = "DO")]       Do,
  #[strum(serialize = "BREAK")]    Break,
  #[strum(serialize = "CONTINUE")] Continue,
  #[strum(serialize = "FOR")]      For,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
  Int(Word),
  Name(DefaultAtom),
  Keyword(Keyword),
  UnaryOp(UnaryOperator),
  /// `+ - | ^`
  AddOp(BinaryOperator),
  /// `* / % &`
  MulOp(BinaryOperator),
  /// `= < >`
  CmpOp(BinaryOperator),
  Semicolon,
  LeftPar,
  RightPar,
  Comma,
  Assign,
  Eof,
}

impl TokenKind {
  /// Whether the token can end an operand, so that a following `-` is binary.
  fn ends_operand(&self) -> bool {
    matches!(self, TokenKind::Int(_) | TokenKind::Name(_) | TokenKind::RightPar)
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
  pub kind   : TokenKind,
  pub line   : usize,
  pub column : usize,
}

pub struct Tokenizer<'d> {
  chars               : CharIter<'d>,
  expecting_binary_op : bool,
  peeked              : Option<Token>,
  // Where the most recently produced token starts
  line                : usize,
  column              : usize,
}

impl<'d> Tokenizer<'d> {

  pub fn new(text: &'d str) -> Tokenizer<'d> {
    Tokenizer {
      chars               : CharIter::new(text),
      expecting_binary_op : false,
      peeked              : None,
      line                : 1,
      column              : 1,
    }
  }

  /// The kind of the next token, without consuming it.
  pub fn peek(&mut self) -> CompileResult<TokenKind> {
    if let Some(token) = &self.peeked {
      return Ok(token.kind.clone());
    }
    let token = self.read_token()?;
    let kind  = token.kind.clone();
    self.peeked = Some(token);
    Ok(kind)
  }

  pub fn next(&mut self) -> CompileResult<Token> {
    match self.peeked.take() {
      Some(token) => Ok(token),
      None        => self.read_token()
    }
  }

  /// A parse error located at the start of the most recently read token.
  pub fn error(&self, kind: ParseErrorKind) -> CompileError {
    CompileError::Parse { kind, line: self.line, column: self.column }
  }

  /// Skips whitespace and `#` comments.
  fn skip_whitespace(&mut self) {
    loop {
      self.chars.trim_left();
      match self.chars.peek() {
        Some('#') => self.chars.skip_line(),
        _         => break
      }
    }
  }

  fn read_token(&mut self) -> CompileResult<Token> {
    self.skip_whitespace();
    let (line, column) = self.chars.location();
    self.line   = line;
    self.column = column;

    let kind = self.read_token_kind()?;
    self.expecting_binary_op = kind.ends_operand();
    Ok(Token { kind, line, column })
  }

  fn read_token_kind(&mut self) -> CompileResult<TokenKind> {
    let c =
      match self.chars.peek() {
        Some(c) => c,
        None    => return Ok(TokenKind::Eof)
      };

    if c.is_ascii_digit() {
      let digits = self.chars.get_prefix_match(|c: char| c.is_ascii_digit()).unwrap_or_default();
      return Word::from_str(digits)
        .map(TokenKind::Int)
        .map_err(|_| self.error(ParseErrorKind::IntegerOutOfRange(digits.to_string())));
    }

    if c.is_ascii_alphabetic() || c == '_' {
      let word = self.chars
        .get_prefix_match(|c: char| c.is_ascii_alphanumeric() || c == '_')
        .unwrap_or_default();
      return Ok(
        match Keyword::from_str(word) {
          Ok(keyword) => TokenKind::Keyword(keyword),
          Err(_)      => TokenKind::Name(DefaultAtom::from(word))
        }
      );
    }

    self.chars.next();
    let kind =
      match c {

        '\'' => {
          let value = self.chars.next().ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof))?;
          match self.chars.next() {
            Some('\'') => TokenKind::Int(value as Word),
            Some(_)    => return Err(self.error(ParseErrorKind::InvalidCharacter)),
            None       => return Err(self.error(ParseErrorKind::UnexpectedEof))
          }
        }

        '-' if !self.expecting_binary_op => TokenKind::UnaryOp(UnaryOperator::Negate),
        '~' => TokenKind::UnaryOp(UnaryOperator::BitNot),
        '!' => TokenKind::UnaryOp(UnaryOperator::LogicalNot),
        '$' => TokenKind::UnaryOp(UnaryOperator::Dereference),
        '@' => TokenKind::UnaryOp(UnaryOperator::AddressOf),

        '+' => TokenKind::AddOp(BinaryOperator::Add),
        '-' => TokenKind::AddOp(BinaryOperator::Subtract),
        '|' => TokenKind::AddOp(BinaryOperator::BitOr),
        '^' => TokenKind::AddOp(BinaryOperator::BitXor),

        '*' => TokenKind::MulOp(BinaryOperator::Multiply),
        '/' => TokenKind::MulOp(BinaryOperator::Divide),
        '%' => TokenKind::MulOp(BinaryOperator::Remainder),
        '&' => TokenKind::MulOp(BinaryOperator::BitAnd),

        '=' => TokenKind::CmpOp(BinaryOperator::Equal),
        '<' => TokenKind::CmpOp(BinaryOperator::Less),
        '>' => TokenKind::CmpOp(BinaryOperator::Greater),

        ';' => TokenKind::Semicolon,
        '(' => TokenKind::LeftPar,
        ')' => TokenKind::RightPar,
        ',' => TokenKind::Comma,

        ':' if self.chars.peek() == Some('=') => {
          self.chars.next();
          TokenKind::Assign
        }

        other => return Err(self.error(ParseErrorKind::UnexpectedSymbol(other)))
      };
    Ok(kind)
  }
}
