/*!
  Lowers a parsed Nascal program to assembly text.

  The compilation pipeline is this:
  ```text
  text -> [`parser::parse`] -> `Function`s -> [`Compilation::compile`] -> assembly text
  ```

  Every expression is compiled into a destination register, or into no register when its value
  is discarded. A binary expression evaluates its right operand first, saves it on the stack,
  evaluates its left operand into the destination, and pops the right operand into the
  register adjacent to the destination. Any value that must survive a nested evaluation is kept
  on the stack rather than in a register, since every call clobbers every register.

  Calling convention: arguments are pushed left to right, `call` pushes the return address, the
  callee leaves its result in `R0`, and the caller pops the arguments.
*/

use string_cache::DefaultAtom;

use super::ast::{BinaryOperator, Expression, Function, Statement, UnaryOperator};
use super::parser::parse;
use super::variables::Frame;
use crate::bytecode::Operation;
use crate::error::{CompileError, CompileResult, SemanticErrorKind};
use crate::functor::{Functor, BUILTIN_FUNCTORS, MAIN_FUNCTOR, PRINTCHAR_FUNCTOR, READCHAR_FUNCTOR};
use crate::register::Register;

// Fixed scratch registers of the statements that need one
const IF_CONDITION    : Register = Register(1);
const WHILE_CONDITION : Register = Register(2);
const RETURN_VALUE    : Register = Register(3);
const ASSIGN_VALUE    : Register = Register(4);
const FRAME_SIZE      : Register = Register(5);
const FOR_ADDRESS     : Register = Register(7);
const FOR_VALUE       : Register = Register(8);
const FOR_SCRATCH     : Register = Register(9);

/// The label `jmp` targets once `main` returns. It marks the end of the program.
const END_LABEL: &str = "@end";

/// Where `CONTINUE` and `BREAK` jump inside the innermost loop.
#[derive(Clone, Debug)]
struct LoopLabels {
  next : String,
  exit : String,
}

/// A `Compilation` holds the emitted assembly, one line per element of `code`.
pub struct Compilation {
  pub code      : Vec<String>,
  label_counter : usize,
  // State of the function being compiled
  function_name : DefaultAtom,
  frame         : Frame,
  loop_labels   : Option<LoopLabels>,
}

/// Compiles Nascal source text to assembly text.
pub fn compile(text: &str) -> CompileResult<String> {
  Ok(Compilation::compile(text)?.assembly())
}

impl Compilation {

  fn new() -> Compilation {
    Compilation {
      code          : Vec::new(),
      label_counter : 0,
      function_name : DefaultAtom::from(""),
      frame         : Frame::default(),
      loop_labels   : None,
    }
  }

  /**
    Parses `text`, checks that every called function is defined exactly once and that `main`
    exists, then emits the program: an entry stub that calls `main` and jumps past the end, the
    built-in functions, and every function in source order.
  */
  pub fn compile(text: &str) -> CompileResult<Compilation> {
    let functions = parse(text)?;

    #[cfg(feature = "trace_computation")]
    for function in functions.iter() {
      eprintln!("{}\n", function);
    }

    let mut defined: Vec<Functor> = BUILTIN_FUNCTORS.to_vec();
    for function in functions.iter() {
      if defined.contains(&function.functor) {
        return Err(CompileError::DuplicateFunction(function.functor.clone()));
      }
      defined.push(function.functor.clone());
    }

    for function in functions.iter() {
      if let Some(callee) = function.called.iter().find(|callee| !defined.contains(callee)) {
        return Err(CompileError::UndefinedFunction {
          caller : function.functor.name.to_string(),
          callee : callee.clone()
        });
      }
    }

    if !defined.contains(&*MAIN_FUNCTOR) {
      return Err(CompileError::MissingMain);
    }

    let mut compilation = Compilation::new();
    compilation.compile_builtins();
    for function in functions.iter() {
      compilation.compile_function(function)?;
    }
    compilation.emit(END_LABEL);

    #[cfg(feature = "trace_computation")]
    eprintln!("# Compiled Assembly\n{}", compilation.assembly());

    Ok(compilation)
  }

  /// The emitted assembly, each line terminated by a newline.
  pub fn assembly(&self) -> String {
    let mut text = self.code.join("\n");
    text.push('\n');
    text
  }

  // region Emitting

  fn emit<S: Into<String>>(&mut self, line: S) {
    self.code.push(line.into());
  }

  fn emit_reg(&mut self, operation: Operation, register: Register) {
    self.emit(format!("{} {}", operation, register));
  }

  fn emit_reg_reg(&mut self, operation: Operation, first: Register, second: Register) {
    self.emit(format!("{} {} {}", operation, first, second));
  }

  fn emit_set(&mut self, register: Register, value: usize) {
    self.emit(format!("{} {} {}", Operation::Set, register, value));
  }

  fn emit_jump(&mut self, operation: Operation, label: &str) {
    self.emit(format!("{} {}", operation, label));
  }

  /// A fresh number for the labels of one construct.
  fn next_label_id(&mut self) -> usize {
    let id = self.label_counter;
    self.label_counter += 1;
    id
  }

  fn semantic_error(&self, kind: SemanticErrorKind) -> CompileError {
    CompileError::Semantic { function: self.function_name.to_string(), kind }
  }

  // endregion

  // region Functions

  fn compile_builtins(&mut self) {
    self.emit_jump(Operation::Call, &MAIN_FUNCTOR.label());
    self.emit_jump(Operation::Jmp, END_LABEL);

    // The argument is the word just above the return address.
    self.emit(PRINTCHAR_FUNCTOR.label());
    self.emit_set(Register::RETURN, 4);
    self.emit_reg_reg(Operation::Add, Register::RETURN, Register::STACK);
    self.emit_reg_reg(Operation::Load32, Register::RETURN, Register::RETURN);
    self.emit_reg(Operation::Out, Register::RETURN);
    self.emit(Operation::Ret.mnemonic());

    self.emit(READCHAR_FUNCTOR.label());
    self.emit_reg(Operation::In, Register::RETURN);
    self.emit(Operation::Ret.mnemonic());
  }

  fn compile_function(&mut self, function: &Function) -> CompileResult {
    self.function_name = function.functor.name.clone();
    self.frame         = Frame::new(function);
    self.loop_labels   = None;

    let frame_bytes = 4 * self.frame.local_count();

    self.emit("");
    self.emit(function.functor.label());
    if frame_bytes > 0 {
      self.emit_set(FRAME_SIZE, frame_bytes);
      self.emit_reg_reg(Operation::Sub, Register::STACK, FRAME_SIZE);
    }

    self.compile_block(&function.body)?;

    // Falling off the end returns without a value.
    if frame_bytes > 0 {
      self.emit_set(FRAME_SIZE, frame_bytes);
      self.emit_reg_reg(Operation::Add, Register::STACK, FRAME_SIZE);
    }
    self.emit(Operation::Ret.mnemonic());
    Ok(())
  }

  // endregion

  // region Statements

  fn compile_block(&mut self, statements: &[Statement]) -> CompileResult {
    for statement in statements {
      self.compile_statement(statement)?;
    }
    Ok(())
  }

  /// Compiles `body` with `labels` as the innermost loop.
  fn compile_loop_body(&mut self, body: &[Statement], labels: LoopLabels) -> CompileResult {
    let enclosing = self.loop_labels.replace(labels);
    let result = self.compile_block(body);
    self.loop_labels = enclosing;
    result
  }

  fn compile_statement(&mut self, statement: &Statement) -> CompileResult {
    match statement {

      Statement::If { condition, body, else_body } => {
        let id        = self.next_label_id();
        let end_label = format!("@endif{}", id);

        self.compile_expression(condition, Some(IF_CONDITION))?;
        self.emit_reg_reg(Operation::And, IF_CONDITION, IF_CONDITION);

        match else_body.is_empty() {
          true => {
            self.emit_jump(Operation::Jiz, &end_label);
            self.compile_block(body)?;
          }
          false => {
            let else_label = format!("@else{}", id);
            self.emit_jump(Operation::Jiz, &else_label);
            self.compile_block(body)?;
            self.emit_jump(Operation::Jmp, &end_label);
            self.emit(else_label);
            self.compile_block(else_body)?;
          }
        }
        self.emit(end_label);
      }

      Statement::While { condition, body } => {
        let id     = self.next_label_id();
        let labels = LoopLabels {
          next : format!("@loop{}", id),
          exit : format!("@endloop{}", id)
        };

        self.emit(labels.next.clone());
        self.compile_expression(condition, Some(WHILE_CONDITION))?;
        self.emit_reg_reg(Operation::And, WHILE_CONDITION, WHILE_CONDITION);
        self.emit_jump(Operation::Jiz, &labels.exit);
        self.compile_loop_body(body, labels.clone())?;
        self.emit_jump(Operation::Jmp, &labels.next);
        self.emit(labels.exit);
      }

      Statement::For { variable, start, condition, step, body } => {
        let id         = self.next_label_id();
        let test_label = format!("@for{}", id);
        let labels     = LoopLabels {
          next : format!("@incfor{}", id),
          exit : format!("@endfor{}", id)
        };

        // The variable's address stays on the stack for the whole loop.
        self.compile_address(variable, Some(FOR_ADDRESS))?;
        self.emit_reg(Operation::Push, FOR_ADDRESS);
        self.frame.push(1);

        self.compile_expression(start, Some(FOR_VALUE))?;
        self.emit_reg_reg(Operation::Load32, FOR_ADDRESS, Register::STACK);
        self.emit_reg_reg(Operation::Store32, FOR_ADDRESS, FOR_VALUE);

        self.emit(test_label.clone());
        self.compile_expression(condition, Some(FOR_VALUE))?;
        self.emit_reg_reg(Operation::And, FOR_VALUE, FOR_VALUE);
        self.emit_jump(Operation::Jiz, &labels.exit);
        self.compile_loop_body(body, labels.clone())?;

        self.emit(labels.next);
        self.compile_expression(step, Some(FOR_VALUE))?;
        self.emit_reg_reg(Operation::Load32, FOR_ADDRESS, Register::STACK);
        self.emit_reg_reg(Operation::Load32, FOR_SCRATCH, FOR_ADDRESS);
        self.emit_reg_reg(Operation::Add, FOR_SCRATCH, FOR_VALUE);
        self.emit_reg_reg(Operation::Store32, FOR_ADDRESS, FOR_SCRATCH);
        self.emit_jump(Operation::Jmp, &test_label);

        self.emit(labels.exit);
        self.emit_reg(Operation::Pop, Register::RETURN);
        self.frame.pop(1);
      }

      Statement::Return(value) => {
        if let Some(value) = value {
          self.compile_expression(value, Some(RETURN_VALUE))?;
        }
        let depth = self.frame.depth();
        if depth > 0 {
          self.emit_set(Register::RETURN, depth * 4);
          self.emit_reg_reg(Operation::Add, Register::STACK, Register::RETURN);
        }
        if value.is_some() {
          self.emit_reg_reg(Operation::Mov, Register::RETURN, RETURN_VALUE);
        }
        self.emit(Operation::Ret.mnemonic());
      }

      Statement::Break => {
        let label =
          match &self.loop_labels {
            Some(labels) => labels.exit.clone(),
            None => return Err(self.semantic_error(SemanticErrorKind::BreakOutsideLoop))
          };
        self.emit_jump(Operation::Jmp, &label);
      }

      Statement::Continue => {
        let label =
          match &self.loop_labels {
            Some(labels) => labels.next.clone(),
            None => return Err(self.semantic_error(SemanticErrorKind::ContinueOutsideLoop))
          };
        self.emit_jump(Operation::Jmp, &label);
      }

      Statement::Assign { target, value } => {
        self.compile_address(target, Some(ASSIGN_VALUE))?;
        self.emit_reg(Operation::Push, ASSIGN_VALUE);
        self.frame.push(1);
        self.compile_expression(value, Some(ASSIGN_VALUE))?;
        self.emit_reg(Operation::Pop, Register::RETURN);
        self.frame.pop(1);
        self.emit_reg_reg(Operation::Store32, Register::RETURN, ASSIGN_VALUE);
      }

      Statement::Exec(expression) => {
        self.compile_expression(expression, None)?;
      }

    }
    Ok(())
  }

  // endregion

  // region Expressions

  /// Puts the address of the word `name` occupies into `out`.
  fn compile_name_address(&mut self, name: &DefaultAtom, out: Register) {
    match self.frame.offset_of(name) {
      0 => self.emit_reg_reg(Operation::Mov, out, Register::STACK),
      offset => {
        self.emit_set(out, offset * 4);
        self.emit_reg_reg(Operation::Add, out, Register::STACK);
      }
    }
  }

  /// Compiles the address of an lvalue: a variable, or a dereferenced expression.
  fn compile_address(&mut self, expression: &Expression, out: Option<Register>) -> CompileResult {
    match expression {

      Expression::Name(name) => {
        if let Some(out) = out {
          self.compile_name_address(name, out);
        }
        Ok(())
      }

      Expression::Unary { operator: UnaryOperator::Dereference, operand } => {
        self.compile_expression(operand, out)
      }

      _ => Err(self.semantic_error(SemanticErrorKind::AddressOfRvalue))

    }
  }

  /// Emits `set out 1` and clears `out` unless the jump is taken.
  fn emit_flag_to_boolean(&mut self, jump: Operation, out: Register) {
    let label = format!("@l{}", self.next_label_id());
    self.emit_set(out, 1);
    self.emit_jump(jump, &label);
    self.emit_reg_reg(Operation::Xor, out, out);
    self.emit(label);
  }

  fn compile_expression(&mut self, expression: &Expression, out: Option<Register>) -> CompileResult {
    match expression {

      Expression::Int(value) => {
        if let Some(out) = out {
          self.emit(format!("{} {} {}", Operation::Set, out, value));
        }
      }

      Expression::Name(name) => {
        if let Some(out) = out {
          match self.frame.offset_of(name) {
            0 => self.emit_reg_reg(Operation::Load32, out, Register::STACK),
            _ => {
              self.compile_name_address(name, out);
              self.emit_reg_reg(Operation::Load32, out, out);
            }
          }
        }
      }

      Expression::Binary { operator, left, right } => {
        let out =
          match out {
            Some(out) => out,
            None => {
              self.compile_expression(right, None)?;
              return self.compile_expression(left, None);
            }
          };
        let other = out.adjacent();

        self.compile_expression(right, Some(out))?;
        self.emit_reg(Operation::Push, out);
        self.frame.push(1);
        self.compile_expression(left, Some(out))?;
        self.emit_reg(Operation::Pop, other);
        self.frame.pop(1);

        match operator {
          BinaryOperator::Equal => {
            self.emit_reg_reg(Operation::Xor, other, out);
            self.emit_flag_to_boolean(Operation::Jiz, out);
          }
          BinaryOperator::Less => {
            self.emit_reg_reg(Operation::Sub, out, other);
            self.emit_flag_to_boolean(Operation::Jis, out);
          }
          BinaryOperator::Greater => {
            self.emit_reg_reg(Operation::Sub, other, out);
            self.emit_flag_to_boolean(Operation::Jis, out);
          }
          BinaryOperator::Add       => self.emit_reg_reg(Operation::Add,  out, other),
          BinaryOperator::Subtract  => self.emit_reg_reg(Operation::Sub,  out, other),
          BinaryOperator::BitOr     => self.emit_reg_reg(Operation::Or,   out, other),
          BinaryOperator::BitXor    => self.emit_reg_reg(Operation::Xor,  out, other),
          BinaryOperator::Multiply  => self.emit_reg_reg(Operation::SMul, out, other),
          BinaryOperator::Divide    => self.emit_reg_reg(Operation::SDiv, out, other),
          BinaryOperator::Remainder => self.emit_reg_reg(Operation::SMod, out, other),
          BinaryOperator::BitAnd    => self.emit_reg_reg(Operation::And,  out, other),
        }
      }

      Expression::Unary { operator: UnaryOperator::AddressOf, operand } => {
        self.compile_address(operand, out)?;
      }

      Expression::Unary { operator, operand } => {
        self.compile_expression(operand, out)?;
        if let Some(out) = out {
          match operator {
            UnaryOperator::Negate      => self.emit_reg(Operation::Neg, out),
            UnaryOperator::BitNot      => self.emit_reg(Operation::Not, out),
            UnaryOperator::LogicalNot  => {
              self.emit_reg_reg(Operation::And, out, out);
              self.emit_flag_to_boolean(Operation::Jiz, out);
            }
            UnaryOperator::Dereference => self.emit_reg_reg(Operation::Load32, out, out),
            UnaryOperator::AddressOf   => unreachable!("address-of is compiled by compile_address"),
          }
        }
      }

      Expression::Call { functor, arguments } => {
        let scratch = out.unwrap_or(Register::RETURN).adjacent();
        for argument in arguments {
          self.compile_expression(argument, Some(scratch))?;
          self.emit_reg(Operation::Push, scratch);
          self.frame.push(1);
        }
        self.emit_jump(Operation::Call, &functor.label());
        if let Some(out) = out {
          self.emit_reg_reg(Operation::Mov, out, Register::RETURN);
        }
        if !arguments.is_empty() {
          self.emit_set(Register::RETURN, 4 * arguments.len());
          self.emit_reg_reg(Operation::Add, Register::STACK, Register::RETURN);
          self.frame.pop(arguments.len());
        }
      }

    }
    Ok(())
  }

  // endregion

}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::assemble_program;
  use crate::cpu::{BufferedIo, Cpu, DEFAULT_MEMORY_SIZE};

  fn run(source: &str, input: &str) -> (Cpu, BufferedIo) {
    let assembly = compile(source).unwrap();
    let program  = assemble_program(&assembly).unwrap();
    let mut cpu  = Cpu::new(DEFAULT_MEMORY_SIZE);
    cpu.install(&program).unwrap();
    let mut io = BufferedIo::from_text(input);
    cpu.run(&mut io).unwrap();
    (cpu, io)
  }

  fn result_of(source: &str) -> i32 {
    let (cpu, _) = run(source, "");
    cpu.register(Register::RETURN) as i32
  }

  #[test]
  fn emits_entry_stub_and_builtins() {
    let expected = "\
call @func_main_0
jmp @end
@func_printchar_1
set R0 4
add R0 RS
load32 R0 R0
out R0
ret
@func_readchar_0
in R0
ret

@func_main_0
ret
@end
";
    assert_eq!(compile("DEF main() END;").unwrap(), expected);
  }

  #[test]
  fn locals_get_a_frame() {
    let compilation = Compilation::compile("DEF main() x := 7; END;").unwrap();
    let body: Vec<&str> = compilation.code.iter().skip(12).map(String::as_str).collect();
    assert_eq!(
      body,
      vec![
        "@func_main_0",
        "set R5 4", "sub RS R5",
        "mov R4 RS", "push R4", "set R4 7", "pop R0", "store32 R0 R4",
        "set R5 4", "add RS R5",
        "ret",
        "@end"
      ]
    );
  }

  #[test]
  fn arithmetic_precedence() {
    assert_eq!(result_of("DEF main() RETURN 2+3*4; END;"), 14);
    assert_eq!(result_of("DEF main() RETURN (2+3)*4; END;"), 20);
    assert_eq!(result_of("DEF main() RETURN 17 / 5 + 17 % 5 - 1; END;"), 4);
    assert_eq!(result_of("DEF main() RETURN -5 * 3; END;"), -15);
    assert_eq!(result_of("DEF main() RETURN 12 & 10 | 1 ^ 3; END;"), 10);
  }

  #[test]
  fn comparisons_and_logic() {
    assert_eq!(result_of("DEF main() RETURN 3 = 3; END;"), 1);
    assert_eq!(result_of("DEF main() RETURN 3 = 4; END;"), 0);
    assert_eq!(result_of("DEF main() RETURN -3 < 2; END;"), 1);
    assert_eq!(result_of("DEF main() RETURN 2 < -3; END;"), 0);
    assert_eq!(result_of("DEF main() RETURN 5 > 2; END;"), 1);
    assert_eq!(result_of("DEF main() RETURN 2 > 2; END;"), 0);
    assert_eq!(result_of("DEF main() RETURN !0 + !7; END;"), 1);
    assert_eq!(result_of("DEF main() RETURN ~0; END;"), -1);
  }

  #[test]
  fn printchar_writes_bytes() {
    let (_, io) = run("DEF main() printchar('h'); printchar(105); END;", "");
    assert_eq!(io.output_text(), "hi");
  }

  #[test]
  fn while_loop_with_locals() {
    let source = "\
DEF main()
  i := 0;
  WHILE i < 5 DO
    printchar('0' + i);
    i := i + 1;
  END;
END;";
    let (_, io) = run(source, "");
    assert_eq!(io.output_text(), "01234");
  }

  #[test]
  fn for_loop_with_break_and_continue() {
    let source = "\
DEF main()
  FOR i := 0, i < 10 DO
    IF i = 2 THEN CONTINUE; END;
    IF i > 5 THEN BREAK; ELSE printchar('0' + i); END;
  END;
  FOR j := j < 3 DO
    printchar('a' + j);
  END;
END;";
    let (_, io) = run(source, "");
    assert_eq!(io.output_text(), "01345abc");
  }

  #[test]
  fn recursion_and_parameters() {
    let source = "\
DEF fib(n)
  IF n < 2 THEN RETURN n; END;
  RETURN fib(n - 1) + fib(n - 2);
END;

DEF sub3(a, b, c) RETURN a - b - c; END;

DEF main()
  x := fib(10);
  RETURN sub3(x, 20, 5);
END;";
    assert_eq!(result_of(source), 30);
  }

  #[test]
  fn return_from_inside_for() {
    let source = "\
DEF find(limit)
  FOR i := 1, 1, 1 DO
    IF i * i > limit THEN RETURN i; END;
  END;
END;

DEF main() RETURN find(50); END;";
    let (cpu, _) = run(source, "");
    assert_eq!(cpu.register(Register::RETURN), 8);
    // The stack is balanced once main has returned.
    assert_eq!(cpu.register(Register::STACK), cpu.program_offset());
  }

  #[test]
  fn pointers() {
    let source = "\
DEF store(p, v) $p := v; END;
DEF main()
  x := 1;
  store(@x, 42);
  RETURN x + $@x;
END;";
    assert_eq!(result_of(source), 84);
  }

  #[test]
  fn echo_input() {
    let source = "\
DEF main()
  c := readchar();
  WHILE ~c DO
    printchar(c);
    c := readchar();
  END;
END;";
    let (_, io) = run(source, "echo");
    assert_eq!(io.output_text(), "echo");
  }

  #[test]
  fn semantic_errors() {
    let error = compile("DEF main() BREAK; END;").unwrap_err();
    assert_eq!(
      error,
      CompileError::Semantic { function: "main".to_string(), kind: SemanticErrorKind::BreakOutsideLoop }
    );
    assert_eq!(error.to_string(), "Function main: BREAK outside loop");

    let error = compile("DEF helper() CONTINUE; END; DEF main() END;").unwrap_err();
    assert_eq!(error.to_string(), "Function helper: CONTINUE outside loop");

    let error = compile("DEF main() 5 := 1; END;").unwrap_err();
    assert_eq!(error.to_string(), "Function main: Taking address of rvalue");
  }

  #[test]
  fn function_table_errors() {
    let error = compile("DEF main() RETURN f(1, 2); END;").unwrap_err();
    assert_eq!(
      error.to_string(),
      "Function main calls function f with 2 arguments which is not defined"
    );

    let error = compile("DEF f(x) END; DEF main() f(); END;").unwrap_err();
    assert_eq!(
      error.to_string(),
      "Function main calls function f with 0 arguments which is not defined"
    );

    let error = compile("DEF main(argument) printchar(argument); END;").unwrap_err();
    assert_eq!(error, CompileError::MissingMain);

    let error = compile("DEF printchar(c) END; DEF main() END;").unwrap_err();
    assert_eq!(error, CompileError::DuplicateFunction(Functor::new("printchar", 1)));
    assert_eq!(error.to_string(), "Function printchar/1 is defined more than once");
  }

  #[test]
  fn disassembly_reassembles_compiled_program() {
    let assembly = compile("DEF main() WHILE 1 DO printchar(readchar()); END; END;").unwrap();
    let program  = assemble_program(&assembly).unwrap();
    let text     = crate::bytecode::disassemble(&program).unwrap();
    assert_eq!(assemble_program(&text).unwrap(), program);
  }

  #[test]
  fn parse_errors_propagate() {
    let error = compile("DEF main() RETURN 1 END;").unwrap_err();
    assert!(error.is_parse_error());
  }
}
