/*!

This module parses Nascal source code.

The language is given by the following EBNF:
    ```
    <program>     ::=  <function>*
    <function>    ::=  'DEF' <name> '(' [<name> (',' <name>)*] ')' <statement>* 'END' ';'
    <statement>   ::=  'IF' <expr> 'THEN' <statement>* ['ELSE' <statement>*] 'END' ';'
                    |  'WHILE' <expr> 'DO' <statement>* 'END' ';'
                    |  'FOR' <expr> ':=' <expr> [',' <expr> [',' <expr>]] 'DO' <statement>* 'END' ';'
                    |  'RETURN' [<expr>] ';'
                    |  'BREAK' ';'
                    |  'CONTINUE' ';'
                    |  <expr> ':=' <expr> ';'
                    |  <expr> ';'
    <expr>        ::=  <add> [<cmp_op> <add>]
    <add>         ::=  <mul> (<add_op> <mul>)*
    <mul>         ::=  <atom> (<mul_op> <atom>)*
    <atom>        ::=  <unary_op> <atom> | <int> | '(' <expr> ')' | <name> | <call>
    <call>        ::=  <name> '(' [<expr> (',' <expr>)*] ')'
    ```

Comparisons do not chain: `a < b < c` is a syntax error. A `FOR` with a single expression after
`:=` takes it as the loop condition and starts the variable at zero. The step defaults to one.

Parsing stops at the first error.

*/

use string_cache::DefaultAtom;

use super::ast::{Expression, Function, Statement};
use super::token::{Keyword, TokenKind, Tokenizer};
use crate::error::{CompileResult, ParseErrorKind};
use crate::functor::{ArityType, Functor};

/// Parses text to produce the abstract syntax trees of the functions it defines.
pub fn parse(input: &str) -> CompileResult<Vec<Function>> {
  let mut parser = Parser::new(input);
  parser.parse()
}

/// Appends `item` unless it is already present, preserving first-appearance order.
fn insert_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
  if !items.contains(&item) {
    items.push(item);
  }
}

struct Parser<'a> {
  tokens : Tokenizer<'a>,
  // What the function being parsed refers to
  locals : Vec<DefaultAtom>,
  called : Vec<Functor>,
}

impl<'a> Parser<'a> {
  fn new(input: &'a str) -> Self {
    Parser {
      tokens : Tokenizer::new(input),
      locals : Vec::new(),
      called : Vec::new()
    }
  }

  fn parse(&mut self) -> CompileResult<Vec<Function>> {
    let mut functions = Vec::new();
    while self.tokens.peek()? != TokenKind::Eof {
      functions.push(self.parse_function()?);
    }
    Ok(functions)
  }

  /// Consumes the next token, which must be `kind`.
  fn expect(&mut self, kind: TokenKind, what: &'static str) -> CompileResult {
    match self.tokens.next()?.kind == kind {
      true  => Ok(()),
      false => Err(self.tokens.error(ParseErrorKind::Expected(what)))
    }
  }

  fn expect_keyword(&mut self, keyword: Keyword, what: &'static str) -> CompileResult {
    self.expect(TokenKind::Keyword(keyword), what)
  }

  // region Functions and statements

  fn parse_function(&mut self) -> CompileResult<Function> {
    self.locals.clear();
    self.called.clear();

    self.expect_keyword(Keyword::Def, "DEF")?;
    let name =
      match self.tokens.next()?.kind {
        TokenKind::Name(name) => name,
        _ => return Err(self.tokens.error(ParseErrorKind::Expected("Name")))
      };
    self.expect(TokenKind::LeftPar, "(")?;

    let mut parameters: Vec<DefaultAtom> = Vec::new();
    while let TokenKind::Name(parameter) = self.tokens.peek()? {
      self.tokens.next()?;
      parameters.push(parameter);
      match self.tokens.peek()? {
        TokenKind::Comma => { self.tokens.next()?; }
        _ => break
      }
    }
    self.expect(TokenKind::RightPar, "Name or )")?;

    let body = self.parse_block(&[Keyword::End])?;
    self.tokens.next()?;
    self.expect(TokenKind::Semicolon, ";")?;

    let mut locals = std::mem::take(&mut self.locals);
    locals.retain(|local| !parameters.contains(local));

    Ok(Function {
      functor : Functor { name, arity: parameters.len() as ArityType },
      parameters,
      locals,
      called  : std::mem::take(&mut self.called),
      body
    })
  }

  /// Parses statements up to, but not including, one of the `terminators`.
  fn parse_block(&mut self, terminators: &[Keyword]) -> CompileResult<Vec<Statement>> {
    let mut statements = Vec::new();
    loop {
      match self.tokens.peek()? {
        TokenKind::Keyword(keyword) if terminators.contains(&keyword) => return Ok(statements),
        TokenKind::Eof => return Err(self.tokens.error(ParseErrorKind::UnexpectedEof)),
        _ => statements.push(self.parse_statement()?)
      }
    }
  }

  /// Consumes the `END ;` closing a compound statement.
  fn parse_end(&mut self) -> CompileResult {
    self.expect_keyword(Keyword::End, "END")?;
    self.expect(TokenKind::Semicolon, ";")
  }

  fn parse_statement(&mut self) -> CompileResult<Statement> {
    match self.tokens.peek()? {

      TokenKind::Keyword(Keyword::While) => {
        self.tokens.next()?;
        let condition = self.parse_expression()?;
        self.expect_keyword(Keyword::Do, "DO")?;
        let body = self.parse_block(&[Keyword::End])?;
        self.parse_end()?;
        Ok(Statement::While { condition, body })
      }

      TokenKind::Keyword(Keyword::For) => {
        self.tokens.next()?;
        if !matches!(self.tokens.peek()?, TokenKind::Name(_)) {
          return Err(self.tokens.error(ParseErrorKind::Expected("Name")));
        }
        let variable = self.parse_expression()?;
        self.expect(TokenKind::Assign, ":=")?;

        let first = self.parse_expression()?;
        let (start, condition, step) =
          match self.tokens.peek()? {
            TokenKind::Comma => {
              self.tokens.next()?;
              let condition = self.parse_expression()?;
              let step =
                match self.tokens.peek()? {
                  TokenKind::Comma => {
                    self.tokens.next()?;
                    self.parse_expression()?
                  }
                  _ => Expression::Int(1)
                };
              (first, condition, step)
            }
            _ => (Expression::Int(0), first, Expression::Int(1))
          };

        self.expect_keyword(Keyword::Do, "DO")?;
        let body = self.parse_block(&[Keyword::End])?;
        self.parse_end()?;
        Ok(Statement::For { variable, start, condition, step, body })
      }

      TokenKind::Keyword(Keyword::If) => {
        self.tokens.next()?;
        let condition = self.parse_expression()?;
        self.expect_keyword(Keyword::Then, "THEN")?;
        let body = self.parse_block(&[Keyword::End, Keyword::Else])?;
        let else_body =
          match self.tokens.next()?.kind {
            TokenKind::Keyword(Keyword::Else) => {
              let else_body = self.parse_block(&[Keyword::End])?;
              self.tokens.next()?;
              else_body
            }
            _ => Vec::new()
          };
        self.expect(TokenKind::Semicolon, ";")?;
        Ok(Statement::If { condition, body, else_body })
      }

      TokenKind::Keyword(Keyword::Return) => {
        self.tokens.next()?;
        let value =
          match self.tokens.peek()? {
            TokenKind::Semicolon => None,
            _ => Some(self.parse_expression()?)
          };
        self.expect(TokenKind::Semicolon, ";")?;
        Ok(Statement::Return(value))
      }

      TokenKind::Keyword(Keyword::Break) => {
        self.tokens.next()?;
        self.expect(TokenKind::Semicolon, ";")?;
        Ok(Statement::Break)
      }

      TokenKind::Keyword(Keyword::Continue) => {
        self.tokens.next()?;
        self.expect(TokenKind::Semicolon, ";")?;
        Ok(Statement::Continue)
      }

      _ => {
        let expression = self.parse_expression()?;
        match self.tokens.peek()? {
          TokenKind::Assign => {
            self.tokens.next()?;
            let value = self.parse_expression()?;
            self.expect(TokenKind::Semicolon, ";")?;
            Ok(Statement::Assign { target: expression, value })
          }
          _ => {
            self.expect(TokenKind::Semicolon, ";")?;
            Ok(Statement::Exec(expression))
          }
        }
      }

    }
  }

  // endregion

  // region Expressions

  /// `<add> [<cmp_op> <add>]`
  fn parse_expression(&mut self) -> CompileResult<Expression> {
    let left = self.parse_additive()?;
    match self.tokens.peek()? {
      TokenKind::CmpOp(operator) => {
        self.tokens.next()?;
        let right = self.parse_additive()?;
        Ok(Expression::Binary { operator, left: Box::new(left), right: Box::new(right) })
      }
      _ => Ok(left)
    }
  }

  fn parse_additive(&mut self) -> CompileResult<Expression> {
    let mut expression = self.parse_multiplicative()?;
    while let TokenKind::AddOp(operator) = self.tokens.peek()? {
      self.tokens.next()?;
      let right = self.parse_multiplicative()?;
      expression = Expression::Binary { operator, left: Box::new(expression), right: Box::new(right) };
    }
    Ok(expression)
  }

  fn parse_multiplicative(&mut self) -> CompileResult<Expression> {
    let mut expression = self.parse_atom()?;
    while let TokenKind::MulOp(operator) = self.tokens.peek()? {
      self.tokens.next()?;
      let right = self.parse_atom()?;
      expression = Expression::Binary { operator, left: Box::new(expression), right: Box::new(right) };
    }
    Ok(expression)
  }

  fn parse_atom(&mut self) -> CompileResult<Expression> {
    match self.tokens.next()?.kind {

      TokenKind::UnaryOp(operator) => {
        let operand = self.parse_atom()?;
        Ok(Expression::Unary { operator, operand: Box::new(operand) })
      }

      TokenKind::Int(value) => Ok(Expression::Int(value)),

      TokenKind::LeftPar => {
        let expression = self.parse_expression()?;
        self.expect(TokenKind::RightPar, ")")?;
        Ok(expression)
      }

      TokenKind::Name(name) => {
        if self.tokens.peek()? != TokenKind::LeftPar {
          insert_unique(&mut self.locals, name.clone());
          return Ok(Expression::Name(name));
        }
        self.tokens.next()?;

        let mut arguments = Vec::new();
        while self.tokens.peek()? != TokenKind::RightPar {
          arguments.push(self.parse_expression()?);
          match self.tokens.peek()? {
            TokenKind::Comma    => { self.tokens.next()?; }
            TokenKind::RightPar => {}
            _ => {
              return Err(self.tokens.error(ParseErrorKind::Expected("Expression or )")));
            }
          }
        }
        self.tokens.next()?;

        let functor = Functor { name, arity: arguments.len() as ArityType };
        insert_unique(&mut self.called, functor.clone());
        Ok(Expression::Call { functor, arguments })
      }

      _ => Err(self.tokens.error(ParseErrorKind::Expected("Expression")))

    }
  }

  // endregion

}
