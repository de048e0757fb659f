//! Disassembles a program file and writes the assembly text to standard output.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use nascal::bytecode::disassemble;

#[derive(StructOpt)]
#[structopt(name = "disasm", about = "Disassembles a register machine program.")]
struct Options {
  /// The assembled program.
  #[structopt(parse(from_os_str))]
  source: PathBuf,
}

fn main() {
  if let Err(e) = run() {
    eprintln!("Error: {}", e);
    process::exit(1);
  }
}

fn run() -> Result<(), Box<dyn Error>> {
  let options = Options::from_args();

  let program = fs::read(&options.source)?;
  print!("{}", disassemble(&program)?);
  Ok(())
}
