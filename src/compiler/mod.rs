//! The Nascal compiler: source text to assembly text.

mod chariter;
mod token;
mod parser;
mod variables;
mod compile;

pub mod ast;

pub use compile::{compile, Compilation};
pub use parser::parse;
