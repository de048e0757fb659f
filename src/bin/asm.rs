//! Assembles a source file and writes the program bytes to standard output.

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use nascal::bytecode::assemble_program;

#[derive(StructOpt)]
#[structopt(name = "asm", about = "Assembles a program for the register machine.")]
struct Options {
  /// The assembly source file.
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

  let text    = fs::read_to_string(&options.source)?;
  let program = assemble_program(&text)?;

  let stdout     = io::stdout();
  let mut output = stdout.lock();
  output.write_all(&program)?;
  output.flush()?;
  Ok(())
}
