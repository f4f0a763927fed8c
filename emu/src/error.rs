use std::fmt;

use arch::bits::to_hex_string;
use arch::error::SimError;
use arch::statement::SourceLine;
use mipsasm::AsmError;
use thiserror::Error;

/// A runtime exception no handler took, with where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub error: SimError,
    /// Address of the faulting instruction.
    pub pc: u32,
    pub source: Option<SourceLine>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Runtime exception at {}: {}", to_hex_string(self.pc as i32), self.error)?;
        if let Some(source) = &self.source {
            write!(f, " ({} line {})", source.file, source.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

#[derive(Error, Debug)]
pub enum EmuError {
    #[error(transparent)]
    Assembly(#[from] AsmError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("failed to access {0}")]
    Io(String, #[source] std::io::Error),

    #[error("invalid settings in {0}")]
    Settings(String, #[source] serde_yaml::Error),

    #[error("invalid dump range: {0}")]
    DumpRange(String),

    #[error(transparent)]
    Memory(#[from] SimError),
}

#[test]
fn test() {
    let err = RuntimeError {
        error: SimError::AddressLoad(0x1001_0001),
        pc: 0x0040_0008,
        source: Some(SourceLine {
            file: "main.s".into(),
            line: 3,
            text: "lw $t0, 1($gp)".to_string(),
        }),
    };
    assert_eq!(
        err.to_string(),
        "Runtime exception at 0x00400008: address out of range or unaligned on load: 0x10010001 (main.s line 3)"
    );
}
