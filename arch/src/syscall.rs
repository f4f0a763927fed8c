//! Boundary between the machine and its system services.
//!
//! The machine only knows how to look a service up by number and call it;
//! the services themselves, and the console they talk to, are supplied by
//! whoever drives the simulation.

use std::fmt;
use std::io;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::SimError;
use crate::machine::Machine;

pub trait Syscall: Send + Sync {
    /// Default service number, as loaded into `$v0`.
    fn number(&self) -> i32;
    fn name(&self) -> &str;
    fn call(&self, machine: &mut Machine) -> Result<(), SimError>;
}

/// Service number to handler.
#[derive(Default, Clone)]
pub struct SyscallTable {
    services: IndexMap<i32, Arc<dyn Syscall>>,
}

impl fmt::Debug for SyscallTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.services.iter().map(|(n, s)| (n, s.name())))
            .finish()
    }
}

impl SyscallTable {
    /// Registers `service` under its own number, replacing any previous one.
    pub fn register(&mut self, service: Arc<dyn Syscall>) -> Option<Arc<dyn Syscall>> {
        self.services.insert(service.number(), service)
    }

    /// Registers `service` under a different number.
    pub fn register_as(&mut self, number: i32, service: Arc<dyn Syscall>) -> Option<Arc<dyn Syscall>> {
        self.services.insert(number, service)
    }

    /// Moves an existing service to a new number.
    pub fn renumber(&mut self, from: i32, to: i32) -> bool {
        match self.services.shift_remove(&from) {
            Some(service) => {
                self.services.insert(to, service);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, number: i32) -> Option<Arc<dyn Syscall>> {
        self.services.get(&number).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &Arc<dyn Syscall>)> {
        self.services.iter().map(|(n, s)| (*n, s))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Text input and output of the running program.
pub trait Console: Send {
    fn print(&mut self, text: &str);
    /// One line without its terminator; an empty string at end of input.
    fn read_line(&mut self) -> io::Result<String>;
    fn read_char(&mut self) -> io::Result<Option<char>>;
}

/// Discards output and reads nothing.
#[derive(Debug, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn print(&mut self, _text: &str) {}

    fn read_line(&mut self) -> io::Result<String> {
        Ok(String::new())
    }

    fn read_char(&mut self) -> io::Result<Option<char>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Memory, MemoryConfiguration};
    use crate::reg::Reg;

    struct Double;

    impl Syscall for Double {
        fn number(&self) -> i32 {
            100
        }

        fn name(&self) -> &str {
            "Double"
        }

        fn call(&self, m: &mut Machine) -> Result<(), SimError> {
            let a0 = m.regs.get(Reg::A0);
            m.regs.set(Reg::V0, a0 * 2);
            Ok(())
        }
    }

    #[test]
    fn dispatch_by_number() {
        let mut m = Machine::new(Memory::new(MemoryConfiguration::default()));
        m.syscalls.register(Arc::new(Double));
        m.regs.set(Reg::V0, 100);
        m.regs.set(Reg::A0, 21);
        m.syscall().unwrap();
        assert_eq!(m.regs.get(Reg::V0), 42);

        assert!(m.syscalls.renumber(100, 101));
        m.regs.set(Reg::V0, 100);
        assert_eq!(m.syscall(), Err(SimError::UnknownSyscall(100)));
        assert_eq!(m.syscalls.get(101).map(|s| s.name().to_string()).as_deref(), Some("Double"));
    }
}
