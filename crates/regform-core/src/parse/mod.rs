//! Per-document parse result assembly.

mod assembly;
mod parser;

pub use assembly::assemble;
pub use parser::DocumentParser;
