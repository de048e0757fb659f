/*!
  A toy 32-bit register machine and the tools around it: an assembler and a disassembler for its
  instruction set, the virtual machine that runs the assembled bytes, and a compiler from the
  Nascal language to assembly text.

  ```text
  nascal source -> compiler::compile -> assembly -> bytecode::assemble_program -> Cpu::run
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod register;
pub mod error;
pub mod bytecode;
pub mod symboltable;
pub mod functor;
pub mod cpu;
pub mod compiler;
