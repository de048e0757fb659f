//! Compiles a Nascal source file and writes the assembly text to standard output.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use nascal::compiler::compile;

#[derive(StructOpt)]
#[structopt(name = "nascal", about = "Compiles Nascal to register machine assembly.")]
struct Options {
  /// The Nascal source file.
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

  let source = fs::read_to_string(&options.source)?;
  match compile(&source) {
    Ok(assembly) => print!("{}", assembly),
    Err(error) => {
      match error.is_parse_error() {
        true  => eprintln!("PARSE ERROR\n{}", error),
        false => eprintln!("COMPILE ERROR\n{}", error),
      }
      process::exit(1);
    }
  }
  Ok(())
}
