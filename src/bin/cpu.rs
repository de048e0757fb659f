/*!
  Runs an assembled program. Standard input and standard output are the program's `in` and `out`,
  one byte per word. On a fault the machine state is printed to standard error.
*/

use std::error::Error;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use nascal::cpu::{ByteIo, Cpu, DEFAULT_MEMORY_SIZE};

#[derive(StructOpt)]
#[structopt(name = "cpu", about = "Runs a register machine program.")]
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
  let mut cpu = Cpu::new(DEFAULT_MEMORY_SIZE);
  cpu.install(&program)?;

  let stdin  = io::stdin();
  let stdout = io::stdout();
  let mut io = ByteIo::new(stdin.lock(), stdout.lock());

  let result = cpu.run(&mut io);
  io.flush()?;
  if let Err(fault) = result {
    eprintln!("{}\n{}", fault, cpu);
    process::exit(1);
  }
  Ok(())
}
