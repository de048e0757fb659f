//! The abstract syntax tree of a Nascal program: functions made of statements made of
//! expressions.

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::bytecode::Word;
use crate::functor::Functor;

// region Operators

#[derive(StrumDisplay, EnumString, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOperator {
  #[strum(serialize = "=")] Equal,
  #[strum(serialize = "<")] Less,
  #[strum(serialize = ">")] Greater,
  #[strum(serialize = "+")] Add,
  #[strum(serialize = "-")] Subtract,
  #[strum(serialize = "|")] BitOr,
  #[strum(serialize = "^")] BitXor,
  #[strum(serialize = "*")] Multiply,
  #[strum(serialize = "/")] Divide,
  #[strum(serialize = "%")] Remainder,
  #[strum(serialize = "&")] BitAnd,
}

#[derive(StrumDisplay, EnumString, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UnaryOperator {
  #[strum(serialize = "-")] Negate,
  #[strum(serialize = "~")] BitNot,
  #[strum(serialize = "!")] LogicalNot,
  /// Loads the word at an address.
  #[strum(serialize = "$")] Dereference,
  /// The address of an lvalue.
  #[strum(serialize = "@")] AddressOf,
}

// endregion

// region Syntax tree

/// Abstract Syntax Representation of expressions
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Expression {
  Int(Word),

  /// A local variable or a parameter.
  Name(DefaultAtom),

  Unary {
    operator : UnaryOperator,
    operand  : Box<Expression>
  },

  Binary {
    operator : BinaryOperator,
    left     : Box<Expression>,
    right    : Box<Expression>
  },

  /// The functor's arity is the number of arguments.
  Call {
    functor   : Functor,
    arguments : Vec<Expression>
  },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Statement {
  If {
    condition : Expression,
    body      : Vec<Statement>,
    else_body : Vec<Statement>
  },

  While {
    condition : Expression,
    body      : Vec<Statement>
  },

  /// `FOR variable := start, condition, step DO body END;`
  For {
    variable  : Expression,
    start     : Expression,
    condition : Expression,
    step      : Expression,
    body      : Vec<Statement>
  },

  Return(Option<Expression>),

  Break,

  Continue,

  Assign {
    target : Expression,
    value  : Expression
  },

  /// An expression evaluated for its side effects.
  Exec(Expression),
}

/**
  A function definition together with what its body refers to. `locals` holds every variable
  the body names that is not a parameter, and `called` every function the body calls. Both list
  each entry once, in order of first appearance.
*/
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Function {
  pub functor    : Functor,
  pub parameters : Vec<DefaultAtom>,
  pub locals     : Vec<DefaultAtom>,
  pub called     : Vec<Functor>,
  pub body       : Vec<Statement>,
}

// endregion

// region Tree display

/// Writes `children` beneath a node, drawing the branches of the tree.
fn fmt_tree_children<T, F>(buffer: &mut String, children: &[T], child_prefix: &str, fmt_child: F)
  where F: Fn(&T, &str, &str) -> String
{
  for (i, next) in children.iter().enumerate() {
    buffer.push('\n');
    match i != children.len() - 1 {

      true  => buffer.push_str(
        fmt_child(
          next,
          &format!("{}├── ", child_prefix),
          &format!("{}│   ", child_prefix)
        ).as_str()
      ),

      false => buffer.push_str(
        fmt_child(
          next,
          &format!("{}└── ", child_prefix),
          &format!("{}    ", child_prefix)
        ).as_str()
      ),

    }
  }
}

impl Expression {
  fn fmt_aux(&self, prefix: &str, child_prefix: &str) -> String {
    let fmt_child = |e: &Expression, p: &str, c: &str| e.fmt_aux(p, c);
    match self {

      Expression::Int(value) => format!("{}Int<{}>", prefix, value),

      Expression::Name(name) => format!("{}Name<{}>", prefix, name),

      Expression::Unary { operator, operand } => {
        let mut buffer = format!("{}Unary<{}>", prefix, operator);
        fmt_tree_children(&mut buffer, std::slice::from_ref(operand.as_ref()), child_prefix, fmt_child);
        buffer
      }

      Expression::Binary { operator, left, right } => {
        let mut buffer = format!("{}Binary<{}>", prefix, operator);
        let children: [&Expression; 2] = [left, right];
        fmt_tree_children(&mut buffer, &children, child_prefix, |e: &&Expression, p: &str, c: &str| e.fmt_aux(p, c));
        buffer
      }

      Expression::Call { functor, arguments } => {
        let mut buffer = format!("{}Call<{}>", prefix, functor);
        fmt_tree_children(&mut buffer, arguments, child_prefix, fmt_child);
        buffer
      }

    }
  }
}

impl Statement {
  fn fmt_block(buffer: &mut String, label: &str, body: &[Statement], prefix: &str, child_prefix: &str) {
    buffer.push('\n');
    buffer.push_str(&format!("{}{}", prefix, label));
    fmt_tree_children(buffer, body, child_prefix, |s: &Statement, p: &str, c: &str| s.fmt_aux(p, c));
  }

  fn fmt_aux(&self, prefix: &str, child_prefix: &str) -> String {
    // Blocks hang below the expressions of their statement.
    let expression_prefix = format!("{}├── ", child_prefix);
    let expression_child  = format!("{}│   ", child_prefix);
    let block_prefix      = format!("{}└── ", child_prefix);
    let block_child       = format!("{}    ", child_prefix);

    match self {

      Statement::If { condition, body, else_body } => {
        let mut buffer = format!("{}If", prefix);
        buffer.push('\n');
        buffer.push_str(&condition.fmt_aux(&expression_prefix, &expression_child));
        match else_body.is_empty() {
          true  => Statement::fmt_block(&mut buffer, "Then", body, &block_prefix, &block_child),
          false => {
            Statement::fmt_block(&mut buffer, "Then", body, &expression_prefix, &expression_child);
            Statement::fmt_block(&mut buffer, "Else", else_body, &block_prefix, &block_child);
          }
        }
        buffer
      }

      Statement::While { condition, body } => {
        let mut buffer = format!("{}While", prefix);
        buffer.push('\n');
        buffer.push_str(&condition.fmt_aux(&expression_prefix, &expression_child));
        Statement::fmt_block(&mut buffer, "Do", body, &block_prefix, &block_child);
        buffer
      }

      Statement::For { variable, start, condition, step, body } => {
        let mut buffer = format!("{}For", prefix);
        for expression in &[variable, start, condition, step] {
          buffer.push('\n');
          buffer.push_str(&expression.fmt_aux(&expression_prefix, &expression_child));
        }
        Statement::fmt_block(&mut buffer, "Do", body, &block_prefix, &block_child);
        buffer
      }

      Statement::Return(value) => {
        let mut buffer = format!("{}Return", prefix);
        if let Some(value) = value {
          buffer.push('\n');
          buffer.push_str(&value.fmt_aux(&block_prefix, &block_child));
        }
        buffer
      }

      Statement::Break => format!("{}Break", prefix),

      Statement::Continue => format!("{}Continue", prefix),

      Statement::Assign { target, value } => {
        let mut buffer = format!("{}Assign", prefix);
        buffer.push('\n');
        buffer.push_str(&target.fmt_aux(&expression_prefix, &expression_child));
        buffer.push('\n');
        buffer.push_str(&value.fmt_aux(&block_prefix, &block_child));
        buffer
      }

      Statement::Exec(expression) => {
        let mut buffer = format!("{}Exec", prefix);
        buffer.push('\n');
        buffer.push_str(&expression.fmt_aux(&block_prefix, &block_child));
        buffer
      }

    }
  }
}

impl Display for Expression {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.fmt_aux("", ""))
  }
}

impl Display for Statement {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.fmt_aux("", ""))
  }
}

impl Display for Function {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let parameters: Vec<String> = self.parameters.iter().map(|p| p.to_string()).collect();
    let mut buffer = format!("Function<{}({})>", self.functor.name, parameters.join(", "));
    fmt_tree_children(&mut buffer, &self.body, "", |s: &Statement, p: &str, c: &str| s.fmt_aux(p, c));
    write!(f, "{}", buffer)
  }
}

// endregion


#[cfg(test)]
mod tests {
  use super::*;
  use std::str::FromStr;

  #[test]
  fn operators_from_symbols() {
    assert_eq!(BinaryOperator::from_str("%"), Ok(BinaryOperator::Remainder));
    assert_eq!(UnaryOperator::from_str("@"), Ok(UnaryOperator::AddressOf));
    assert_eq!(BinaryOperator::Less.to_string(), "<");
    assert!(UnaryOperator::from_str("+").is_err());
  }

  #[test]
  fn expression_tree() {
    let expression = Expression::Binary {
      operator : BinaryOperator::Add,
      left     : Box::new(Expression::Int(2)),
      right    : Box::new(Expression::Unary {
        operator : UnaryOperator::Negate,
        operand  : Box::new(Expression::Name(DefaultAtom::from("x")))
      })
    };
    let expected = "\
Binary<+>
├── Int<2>
└── Unary<->
    └── Name<x>";
    assert_eq!(expression.to_string(), expected);
  }

  #[test]
  fn statement_tree() {
    let statement = Statement::While {
      condition : Expression::Name(DefaultAtom::from("n")),
      body      : vec![Statement::Break]
    };
    let expected = "\
While
├── Name<n>
└── Do
    └── Break";
    assert_eq!(statement.to_string(), expected);
  }
}
