pub mod bits;
pub mod directive;
pub mod error;
pub mod inst;
pub mod machine;
pub mod memory;
pub mod reg;
pub mod regfile;
pub mod statement;
pub mod syscall;
pub mod token;
