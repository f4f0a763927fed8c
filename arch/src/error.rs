use thiserror::Error;

use crate::bits::to_hex_string;

/// Exception codes written to the Cause register.
pub mod cause {
    pub const INTERRUPT: u32 = 0;
    pub const ADDRESS_LOAD: u32 = 4;
    pub const ADDRESS_STORE: u32 = 5;
    pub const SYSCALL: u32 = 8;
    pub const BREAKPOINT: u32 = 9;
    pub const RESERVED_INSTRUCTION: u32 = 10;
    pub const OVERFLOW: u32 = 12;
    pub const TRAP: u32 = 13;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("address out of range or unaligned on instruction fetch: {}", to_hex_string(*.0 as i32))]
    AddressFetch(u32),

    #[error("address out of range or unaligned on load: {}", to_hex_string(*.0 as i32))]
    AddressLoad(u32),

    #[error("address out of range or unaligned on store: {}", to_hex_string(*.0 as i32))]
    AddressStore(u32),

    #[error("cannot write directly to text segment: {}", to_hex_string(*.0 as i32))]
    TextWrite(u32),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("trap")]
    Trap,

    #[error("break instruction executed; code = {0}")]
    Break(i32),

    #[error("reserved instruction: {}", to_hex_string(*.0 as i32))]
    ReservedInstruction(u32),

    #[error("invalid or unimplemented syscall service: {0}")]
    UnknownSyscall(i32),

    #[error("invalid register access: {0}")]
    InvalidRegister(String),

    #[error("syscall failed: {0}")]
    Syscall(String),

    /// Not a fault: raised by the exit services to unwind the current step.
    #[error("program exited with code {0}")]
    Exit(i32),
}

impl SimError {
    /// MIPS exception code, or `None` for conditions that never reach the
    /// kernel handler.
    pub fn cause(&self) -> Option<u32> {
        match self {
            SimError::AddressFetch(_) | SimError::AddressLoad(_) => Some(cause::ADDRESS_LOAD),
            SimError::AddressStore(_) | SimError::TextWrite(_) => Some(cause::ADDRESS_STORE),
            SimError::Overflow => Some(cause::OVERFLOW),
            SimError::Trap => Some(cause::TRAP),
            SimError::Break(_) => Some(cause::BREAKPOINT),
            SimError::ReservedInstruction(_) => Some(cause::RESERVED_INSTRUCTION),
            SimError::InvalidRegister(_) => Some(cause::RESERVED_INSTRUCTION),
            SimError::UnknownSyscall(_) | SimError::Syscall(_) | SimError::Exit(_) => None,
        }
    }

    /// Faulting address for address errors, destined for BadVAddr.
    pub fn bad_address(&self) -> Option<u32> {
        match self {
            SimError::AddressFetch(addr)
            | SimError::AddressLoad(addr)
            | SimError::AddressStore(addr)
            | SimError::TextWrite(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Syscall(err.to_string())
    }
}

#[test]
fn test() {
    assert_eq!(SimError::AddressLoad(0x1040_0000).cause(), Some(4));
    assert_eq!(SimError::AddressStore(3).bad_address(), Some(3));
    assert_eq!(SimError::Exit(0).cause(), None);
    assert_eq!(
        SimError::AddressStore(0x1040_0000).to_string(),
        "address out of range or unaligned on store: 0x10400000"
    );
}
