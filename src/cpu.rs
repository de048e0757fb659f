/*!
  The virtual machine: a flat byte-addressed memory, 256 word registers, and three flags.

  A program is installed at the tail of memory. The instruction pointer (`RI`) and the stack
  pointer (`RS`) both start at the first byte of the program, so the stack grows downward into
  the free memory below it. Label operands are program-relative and are offset by the program's
  start address at the moment a jump is taken. Execution halts when the instruction pointer
  reaches or passes the end of memory.

  The machine talks to the outside world only through the `Io` trait, one word at a time.
*/

use std::collections::VecDeque;
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::io::{self, Read, Write};

use prettytable::{format as TableFormat, Table};

use crate::bytecode::{try_decode_instruction, DecodeError, Instruction, Operation, Word, CPU_VERSION};
use crate::error::{Fault, FaultResult};
use crate::register::{Register, REGISTER_COUNT};

/// Memory given to programs by the runner.
pub const DEFAULT_MEMORY_SIZE: Word = 640 * 1024;

/// The word `in` yields once input is exhausted.
pub const END_OF_INPUT: Word = 0xFFFF_FFFF;

/// The host side of `in` and `out`.
pub trait Io {
  fn read_word(&mut self) -> io::Result<Word>;
  fn write_word(&mut self, value: Word) -> io::Result<()>;
}

/// An in-memory queue of input words and a record of every word written.
#[derive(Clone, Debug, Default)]
pub struct BufferedIo {
  input  : VecDeque<Word>,
  output : Vec<Word>,
}

impl BufferedIo {
  pub fn new<I: IntoIterator<Item = Word>>(input: I) -> BufferedIo {
    BufferedIo {
      input  : input.into_iter().collect(),
      output : Vec::new()
    }
  }

  /// One input word per byte of `text`.
  pub fn from_text(text: &str) -> BufferedIo {
    BufferedIo::new(text.bytes().map(Word::from))
  }

  pub fn output(&self) -> &[Word] {
    &self.output
  }

  /// The low byte of every word written, read as text.
  pub fn output_text(&self) -> String {
    let bytes: Vec<u8> = self.output.iter().map(|&word| word as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
  }
}

impl Io for BufferedIo {
  fn read_word(&mut self) -> io::Result<Word> {
    Ok(self.input.pop_front().unwrap_or(END_OF_INPUT))
  }

  fn write_word(&mut self, value: Word) -> io::Result<()> {
    self.output.push(value);
    Ok(())
  }
}

/**
  Byte-granular I/O over a reader and a writer: `in` reads a single byte and `out` writes the
  low byte of the word. The writer is flushed before every read so that prompts appear before
  the program blocks on input.
*/
pub struct ByteIo<R: Read, W: Write> {
  reader : R,
  writer : W,
}

impl<R: Read, W: Write> ByteIo<R, W> {
  pub fn new(reader: R, writer: W) -> ByteIo<R, W> {
    ByteIo { reader, writer }
  }

  pub fn flush(&mut self) -> io::Result<()> {
    self.writer.flush()
  }

  pub fn into_writer(self) -> W {
    self.writer
  }
}

impl<R: Read, W: Write> Io for ByteIo<R, W> {
  fn read_word(&mut self) -> io::Result<Word> {
    self.writer.flush()?;
    let mut byte = [0u8; 1];
    loop {
      match self.reader.read(&mut byte) {
        Ok(0) => return Ok(END_OF_INPUT),
        Ok(_) => return Ok(Word::from(byte[0])),
        Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
        Err(error) => return Err(error)
      }
    }
  }

  fn write_word(&mut self, value: Word) -> io::Result<()> {
    self.writer.write_all(&[value as u8])
  }
}


#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Flags {
  pub zero     : bool,
  pub sign     : bool,
  pub overflow : bool,
}

impl Flags {
  pub fn clear(&mut self) {
    *self = Flags::default();
  }

  /// Recomputes zero and sign. Overflow is left alone.
  pub fn set_from(&mut self, value: Word) {
    self.zero = value == 0;
    self.sign = (value as i32) < 0;
  }
}

impl Display for Flags {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let bit = |flag: bool| match flag { true => '1', false => '0' };
    write!(f, "Z={} S={} O={}", bit(self.zero), bit(self.sign), bit(self.overflow))
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
  Running,
  Halted,
}


pub struct Cpu {
  memory         : Vec<u8>,
  registers      : [Word; REGISTER_COUNT],
  flags          : Flags,
  // Address of the first byte of the installed program
  program_offset : Word,
  // Address of the next instruction; branches overwrite it before it is committed to RI
  cursor         : Word,
}

impl Cpu {

  // region Display methods

  fn make_register_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);

    for (i, value) in self.registers.iter().enumerate() {
      let register = Register(i as u8);
      let reserved = register == Register::STACK || register == Register::INSTRUCTION;
      if *value == 0 && !reserved {
        continue;
      }
      table.add_row(row![r->format!("{} =", register), format!("{} ({:#010x})", value, value)]);
    }
    table
  }

  fn make_status_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Field", ubl->"Value"]);
    table.add_row(row![r->"Flags =", self.flags.to_string()]);
    table.add_row(row![r->"Memory =", self.memory.len().to_string()]);
    table.add_row(row![r->"Program =", self.program_offset.to_string()]);
    table
  }

  // endregion

  // region Low-level utility methods

  pub fn new(memory_size: Word) -> Cpu {
    Cpu {
      memory         : vec![0; memory_size as usize],
      registers      : [0; REGISTER_COUNT],
      flags          : Flags::default(),
      program_offset : memory_size,
      cursor         : memory_size,
    }
  }

  pub fn register(&self, register: Register) -> Word {
    self.registers[register.idx()]
  }

  pub fn set_register(&mut self, register: Register, value: Word) {
    self.registers[register.idx()] = value;
  }

  pub fn flags(&self) -> Flags {
    self.flags
  }

  pub fn memory(&self) -> &[u8] {
    &self.memory
  }

  pub fn program_offset(&self) -> Word {
    self.program_offset
  }

  /// Returns the index of the first byte of a `width` byte access, or faults.
  fn check_access(&self, address: Word, width: usize) -> FaultResult<usize> {
    let start = address as usize;
    match start.checked_add(width) {
      Some(end) if end <= self.memory.len() => Ok(start),
      _ => Err(Fault::OutOfBounds { address, width })
    }
  }

  /// Reads a zero-extended little-endian value of `width` bytes.
  fn read_memory(&self, address: Word, width: usize) -> FaultResult<Word> {
    let start = self.check_access(address, width)?;
    let value =
      self.memory[start..start + width]
        .iter()
        .rev()
        .fold(0 as Word, |word, &byte| (word << 8) | Word::from(byte));
    Ok(value)
  }

  /// Writes the low `width` bytes of `value`, little-endian.
  fn write_memory(&mut self, address: Word, width: usize, value: Word) -> FaultResult {
    let start = self.check_access(address, width)?;
    self.memory[start..start + width].copy_from_slice(&value.to_le_bytes()[..width]);
    Ok(())
  }

  fn push(&mut self, value: Word) -> FaultResult {
    let stack = self.register(Register::STACK).wrapping_sub(4);
    self.set_register(Register::STACK, stack);
    self.write_memory(stack, 4, value)
  }

  fn pop(&mut self) -> FaultResult<Word> {
    let stack = self.register(Register::STACK);
    let value = self.read_memory(stack, 4)?;
    self.set_register(Register::STACK, stack.wrapping_add(4));
    Ok(value)
  }

  // endregion

  // region Execution

  /**
    Copies `program` to the tail of memory and resets the machine to run it. Everything else in
    memory and every register is zeroed.
  */
  pub fn install(&mut self, program: &[u8]) -> FaultResult {
    if program.len() > self.memory.len() {
      return Err(Fault::ProgramTooLarge { program: program.len(), memory: self.memory.len() });
    }
    let start = self.memory.len() - program.len();
    for byte in self.memory[..start].iter_mut() {
      *byte = 0;
    }
    self.memory[start..].copy_from_slice(program);

    self.registers = [0; REGISTER_COUNT];
    // `start` is at most the memory size, which was given as a `Word`.
    self.program_offset = start as Word;
    self.cursor = self.program_offset;
    self.set_register(Register::INSTRUCTION, self.program_offset);
    self.set_register(Register::STACK, self.program_offset);
    self.flags.clear();
    Ok(())
  }

  /// Executes the instruction at `RI`, or reports that the program has finished.
  pub fn step(&mut self, io: &mut dyn Io) -> FaultResult<Status> {
    let address = self.register(Register::INSTRUCTION);
    if address as usize >= self.memory.len() {
      return Ok(Status::Halted);
    }

    let (instruction, next) =
      try_decode_instruction(&self.memory, address as usize).map_err(|error| match error {
        DecodeError::InvalidOpcode(opcode) => Fault::InvalidOpcode { opcode, address },
        DecodeError::Truncated             => Fault::TruncatedInstruction { address },
      })?;
    // Decoding stays within memory, whose size fits in a `Word`.
    self.cursor = next as Word;

    #[cfg(feature = "trace_computation")]
    eprintln!("{:>8}: {}", address.wrapping_sub(self.program_offset), instruction);

    self.execute(&instruction, address, io)?;

    if instruction.opcode().sets_flags() {
      if let Some(register) = instruction.first_register() {
        self.flags.set_from(self.register(register));
      }
    }
    self.set_register(Register::INSTRUCTION, self.cursor);

    #[cfg(feature = "trace_computation")]
    eprintln!("{}", self);

    Ok(Status::Running)
  }

  /// Steps until the program halts or faults.
  pub fn run(&mut self, io: &mut dyn Io) -> FaultResult {
    loop {
      match self.step(io)? {
        Status::Running => continue,
        Status::Halted  => return Ok(())
      }
    }
  }

  fn jump_target(&self, target: Word) -> Word {
    target.wrapping_add(self.program_offset)
  }

  fn execute(&mut self, instruction: &Instruction, address: Word, io: &mut dyn Io) -> FaultResult {
    use Operation::*;

    let io_fault = |error: io::Error| Fault::Io { address, message: error.to_string() };
    let nonzero = |divisor: Word| match divisor {
      0 => Err(Fault::DivisionByZero { address }),
      _ => Ok(divisor)
    };

    match *instruction {

      Instruction::Simple(opcode) => {
        match opcode {
          Nop  => {}
          Stat => {
            self.registers[0] = CPU_VERSION;
            self.registers[1] = Word::try_from(self.memory.len()).unwrap_or(Word::MAX);
            self.registers[2] = self.program_offset;
          }
          Ret  => {
            self.cursor = self.pop()?;
          }
          _ => unreachable!("{} is not a simple operation", opcode)
        }
      }

      Instruction::Reg { opcode, register } => {
        let value = self.register(register);
        match opcode {
          In   => {
            let word = io.read_word().map_err(io_fault)?;
            self.set_register(register, word);
          }
          Out  => io.write_word(value).map_err(io_fault)?,
          Push => self.push(value)?,
          Pop  => {
            let word = self.pop()?;
            self.set_register(register, word);
          }
          Neg  => self.set_register(register, value.wrapping_neg()),
          Not  => self.set_register(register, !value),
          JmpR => self.cursor = self.jump_target(value),
          _ => unreachable!("{} does not take a single register", opcode)
        }
      }

      Instruction::RegReg { opcode, first, second } => {
        let a = self.register(first);
        let b = self.register(second);
        let result =
          match opcode {
            Store8  => { self.write_memory(a, 1, b)?; return Ok(()); }
            Store16 => { self.write_memory(a, 2, b)?; return Ok(()); }
            Store32 => { self.write_memory(a, 4, b)?; return Ok(()); }
            Load8   => self.read_memory(b, 1)?,
            Load16  => self.read_memory(b, 2)?,
            Load32  => self.read_memory(b, 4)?,
            Mov     => b,
            Add     => {
              let sum = a.wrapping_add(b);
              self.flags.overflow = sum < b;
              sum
            }
            Sub     => {
              self.flags.overflow = a < b;
              a.wrapping_sub(b)
            }
            SMul    => (a as i32).wrapping_mul(b as i32) as Word,
            UMul    => a.wrapping_mul(b),
            SDiv    => (a as i32).wrapping_div(nonzero(b)? as i32) as Word,
            UDiv    => a / nonzero(b)?,
            SMod    => (a as i32).wrapping_rem(nonzero(b)? as i32) as Word,
            UMod    => a % nonzero(b)?,
            And     => a & b,
            Or      => a | b,
            Xor     => a ^ b,
            Shift   => {
              let amount  = b as i32;
              let shifted =
                match amount >= 0 {
                  true  => a.checked_shl(amount as u32),
                  false => a.checked_shr(amount.unsigned_abs())
                };
              // Shifting out every bit leaves nothing.
              shifted.unwrap_or(0)
            }
            _ => unreachable!("{} does not take two registers", opcode)
          };
        self.set_register(first, result);
      }

      Instruction::RegVal { opcode, register, value } => {
        match opcode {
          Set => self.set_register(register, value),
          _ => unreachable!("{} does not take a register and a value", opcode)
        }
      }

      Instruction::Label { opcode, target } => {
        let taken =
          match opcode {
            Call => {
              self.push(self.cursor)?;
              true
            }
            Jmp => true,
            Jiz => self.flags.zero,
            Juz => !self.flags.zero,
            Jis => self.flags.sign,
            Jus => !self.flags.sign,
            Jio => self.flags.overflow,
            Juo => !self.flags.overflow,
            _ => unreachable!("{} does not take a label", opcode)
          };
        if taken {
          self.cursor = self.jump_target(target);
        }
      }

    }
    Ok(())
  }

  // endregion

}


lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Cpu {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let status_table   = self.make_status_table();
    let register_table = self.make_register_table();

    let mut combined_table = table!([status_table, register_table]);

    combined_table.set_titles(row![ub->"Machine", ub->"Registers"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "{}", combined_table)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::assemble_program;

  fn run_program(source: &str, input: &str) -> (Cpu, BufferedIo, FaultResult) {
    let program = assemble_program(source).unwrap();
    let mut cpu = Cpu::new(4096);
    cpu.install(&program).unwrap();
    let mut io = BufferedIo::from_text(input);
    let result = cpu.run(&mut io);
    (cpu, io, result)
  }

  #[test]
  fn install_places_program_at_tail() {
    let mut cpu = Cpu::new(64);
    cpu.install(&[0x00, 0x1d]).unwrap();
    assert_eq!(cpu.program_offset(), 62);
    assert_eq!(cpu.register(Register::INSTRUCTION), 62);
    assert_eq!(cpu.register(Register::STACK), 62);
    assert_eq!(&cpu.memory()[62..], &[0x00, 0x1d]);

    assert_eq!(
      cpu.install(&[0u8; 65]),
      Err(Fault::ProgramTooLarge { program: 65, memory: 64 })
    );
  }

  #[test]
  fn add_sets_register_and_flags() {
    let (cpu, _, result) = run_program("set R1 5\nset R2 3\nadd R1 R2", "");
    assert_eq!(result, Ok(()));
    assert_eq!(cpu.register(Register(1)), 8);
    assert_eq!(cpu.flags(), Flags { zero: false, sign: false, overflow: false });
  }

  #[test]
  fn add_and_sub_report_overflow() {
    let (cpu, _, _) = run_program("set R1 -1\nset R2 1\nadd R1 R2", "");
    assert_eq!(cpu.register(Register(1)), 0);
    assert_eq!(cpu.flags(), Flags { zero: true, sign: false, overflow: true });

    let (cpu, _, _) = run_program("set R1 1\nset R2 2\nsub R1 R2", "");
    assert_eq!(cpu.register(Register(1)), 0xFFFF_FFFF);
    assert_eq!(cpu.flags(), Flags { zero: false, sign: true, overflow: true });
  }

  #[test]
  fn division_by_zero_faults() {
    for operation in &["udiv", "sdiv", "umod", "smod"] {
      for dividend in &[0, 7, -7] {
        let source = format!("set R1 {}\nset R2 0\n{} R1 R2", dividend, operation);
        let (_, _, result) = run_program(&source, "");
        assert!(
          matches!(result, Err(Fault::DivisionByZero { .. })),
          "{} of {} did not fault", operation, dividend
        );
      }
    }
  }

  #[test]
  fn signed_arithmetic_wraps() {
    let (cpu, _, _) = run_program("set R1 -7\nset R2 2\nsdiv R1 R2\nset R3 -7\nsmod R3 R2", "");
    assert_eq!(cpu.register(Register(1)) as i32, -3);
    assert_eq!(cpu.register(Register(3)) as i32, -1);

    let (cpu, _, result) = run_program("set R1 -2147483648\nset R2 -1\nsdiv R1 R2", "");
    assert_eq!(result, Ok(()));
    assert_eq!(cpu.register(Register(1)), 0x8000_0000);
  }

  #[test]
  fn shift_direction_follows_sign() {
    let (cpu, _, _) = run_program("set R1 1\nset R2 4\nshift R1 R2", "");
    assert_eq!(cpu.register(Register(1)), 16);

    let (cpu, _, _) = run_program("set R1 256\nset R2 -4\nshift R1 R2", "");
    assert_eq!(cpu.register(Register(1)), 16);

    let (cpu, _, _) = run_program("set R1 1\nset R2 40\nshift R1 R2", "");
    assert_eq!(cpu.register(Register(1)), 0);
    assert!(cpu.flags().zero);
  }

  #[test]
  fn memory_access_is_bounds_checked() {
    let (_, _, result) = run_program("set R1 4094\nstore32 R1 R1", "");
    assert_eq!(result, Err(Fault::OutOfBounds { address: 4094, width: 4 }));

    let (cpu, _, result) = run_program("set R1 4000\nset R2 -1\nstore16 R1 R2\nload32 R3 R1", "");
    assert_eq!(result, Ok(()));
    assert_eq!(cpu.register(Register(3)), 0xFFFF);
  }

  #[test]
  fn invalid_and_truncated_instructions_fault() {
    let mut cpu = Cpu::new(16);
    cpu.install(&[0x00, 0x40]).unwrap();
    let mut io = BufferedIo::default();
    assert_eq!(cpu.step(&mut io), Ok(Status::Running));
    assert_eq!(cpu.step(&mut io), Err(Fault::InvalidOpcode { opcode: 0x40, address: 15 }));

    cpu.install(&[0x02, 0x01, 0x05]).unwrap();
    assert_eq!(cpu.run(&mut io), Err(Fault::TruncatedInstruction { address: 13 }));
  }

  #[test]
  fn call_and_return() {
    let source = "\
call @double
jmp @end
@double
set R1 21
add R1 R1
ret
@end
";
    let (cpu, _, result) = run_program(source, "");
    assert_eq!(result, Ok(()));
    assert_eq!(cpu.register(Register(1)), 42);
    assert_eq!(cpu.register(Register::STACK), cpu.program_offset());
  }

  #[test]
  fn stat_reports_machine() {
    let (cpu, _, _) = run_program("stat", "");
    assert_eq!(cpu.register(Register(0)), CPU_VERSION);
    assert_eq!(cpu.register(Register(1)), 4096);
    assert_eq!(cpu.register(Register(2)), 4095);
  }

  #[test]
  fn echo_until_end_of_input() {
    let source = "\
@loop
in R1
not R1
jiz @done
not R1
out R1
jmp @loop
@done
";
    let (_, io, result) = run_program(source, "hi");
    assert_eq!(result, Ok(()));
    assert_eq!(io.output_text(), "hi");
  }

  #[test]
  fn byte_io_flushes_and_signals_end_of_input() {
    let mut io = ByteIo::new(&b"A"[..], Vec::new());
    io.write_word(0x142).unwrap();
    assert_eq!(io.read_word().unwrap(), 65);
    assert_eq!(io.read_word().unwrap(), END_OF_INPUT);
    assert_eq!(io.into_writer(), vec![0x42]);
  }

  #[test]
  fn display_lists_reserved_registers() {
    let (cpu, _, _) = run_program("set R7 9", "");
    let text = cpu.to_string();
    assert!(text.contains("R7 ="));
    assert!(text.contains("RS ="));
    assert!(text.contains("RI ="));
    assert!(!text.contains("R8 ="));
  }

  #[test]
  fn display_after_fault() {
    let (cpu, _, result) = run_program("set R1 1\nset R2 0\nudiv R1 R2", "");
    assert!(matches!(result, Err(Fault::DivisionByZero { .. })));
    let text = cpu.to_string();
    assert!(text.contains("Machine"));
    assert!(text.contains("R1 ="));
    assert!(text.contains("Z=0 S=0 O=0"));
  }
}
