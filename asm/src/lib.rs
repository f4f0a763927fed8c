pub mod assembler;
mod directives;
pub mod error;
pub mod lexer;
pub mod listing;
pub mod macros;
pub mod matcher;
pub mod symbols;
pub mod template;

pub use assembler::{AssembledProgram, Assembler, AssemblerOptions};
pub use error::{AsmError, ErrorList, ErrorMessage};
