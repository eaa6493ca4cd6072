//! Cloze span parsing

pub mod parser;

pub use parser::{ClozeParser, ClozeSpan};
